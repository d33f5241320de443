//! File comparison, merging and content-addressed backups

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::fileops::{
    DEFAULT_COMPARE_WIDTH, MAX_DIFF_OUTPUT_LINES, MIN_COMPARE_WIDTH,
};
use crate::error::CoreError;
use crate::paths;

use super::looks_binary;

/// Sidecar metadata written next to each `.bak` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackupMeta {
    pub backup_id: String,
    pub source_path: String,
    pub backup_path: String,
    /// ISO-8601 creation time
    pub created_at: String,
    pub size_bytes: u64,
}

fn read_lines_no_eol(path: &Path) -> Result<Vec<String>, CoreError> {
    let blob =
        fs::read(path).map_err(|e| CoreError::Input(format!("failed to read file: {}", e)))?;
    let txt = String::from_utf8_lossy(&blob).replace("\r\n", "\n");
    let txt = txt.strip_suffix('\n').unwrap_or(&txt);
    if txt.is_empty() {
        return Ok(Vec::new());
    }
    Ok(txt.split('\n').map(str::to_string).collect())
}

fn common_prefix_lines(a: &[String], b: &[String]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn common_suffix_lines(a: &[String], b: &[String], prefix: usize) -> usize {
    let mut i = a.len();
    let mut j = b.len();
    let mut count = 0;
    while i > prefix && j > prefix && a[i - 1] == b[j - 1] {
        count += 1;
        i -= 1;
        j -= 1;
    }
    count
}

/// Single-hunk unified diff over the minimal differing window after
/// common-prefix/suffix stripping.
pub fn build_simple_unified_diff(
    from_label: &str,
    to_label: &str,
    from_lines: &[String],
    to_lines: &[String],
) -> String {
    let prefix = common_prefix_lines(from_lines, to_lines);
    let suffix = common_suffix_lines(from_lines, to_lines, prefix);

    let from_start = prefix;
    let to_start = prefix;
    let from_end = from_lines.len().saturating_sub(suffix).max(from_start);
    let to_end = to_lines.len().saturating_sub(suffix).max(to_start);

    let mut out = String::new();
    out.push_str(&format!("--- {}\n", from_label));
    out.push_str(&format!("+++ {}\n", to_label));
    out.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        from_start + 1,
        from_end - from_start,
        to_start + 1,
        to_end - to_start
    ));

    let mut written = 0usize;
    for line in &from_lines[from_start..from_end] {
        out.push('-');
        out.push_str(line);
        out.push('\n');
        written += 1;
        if written >= MAX_DIFF_OUTPUT_LINES {
            out.push_str("... [DIFF TRUNCATED] ...\n");
            return out.trim_end_matches('\n').to_string();
        }
    }
    for line in &to_lines[to_start..to_end] {
        out.push('+');
        out.push_str(line);
        out.push('\n');
        written += 1;
        if written >= MAX_DIFF_OUTPUT_LINES {
            out.push_str("... [DIFF TRUNCATED] ...\n");
            return out.trim_end_matches('\n').to_string();
        }
    }

    if from_start == from_end && to_start == to_end {
        out.push_str("(No differences)\n");
    }
    out.trim_end_matches('\n').to_string()
}

fn backup_path_id(source: &str) -> String {
    paths::sha256_hex(source)[..10].to_string()
}

fn sanitize_file_name(s: &str) -> String {
    let s = s.trim();
    if s.is_empty() {
        return "file".to_string();
    }
    let cleaned: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | ' ' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let chars: Vec<char> = cleaned.chars().collect();
    if chars.len() > 80 {
        chars[chars.len() - 80..].iter().collect()
    } else {
        cleaned
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

fn backups_root() -> Result<PathBuf, CoreError> {
    let root = paths::backups_root();
    fs::create_dir_all(&root)
        .map_err(|e| CoreError::Input(format!("failed to create backup directory: {}", e)))?;
    Ok(root)
}

/// Copy one file into the backup store under
/// `<basename>__<hash10(sourcepath)>__<unix-nanos>.bak` with a JSON sidecar.
pub fn create_file_backup(path: &str) -> Result<String, CoreError> {
    let clean = path.trim();
    if clean.is_empty() {
        return Err(CoreError::input("path is required"));
    }
    let abs = absolutize(clean)?;
    let blob = fs::read(&abs)
        .map_err(|e| CoreError::Input(format!("failed to read source file: {}", e)))?;

    let root = backups_root()?;
    let base = sanitize_file_name(
        &abs.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    let id = format!(
        "{}__{}__{}",
        base,
        backup_path_id(&abs.to_string_lossy()),
        unix_nanos()
    );
    let backup_path = root.join(format!("{}.bak", id));
    let meta_path = root.join(format!("{}.meta.json", id));

    fs::write(&backup_path, &blob)
        .map_err(|e| CoreError::Input(format!("failed to write backup: {}", e)))?;
    let meta = FileBackupMeta {
        backup_id: id.clone(),
        source_path: abs.to_string_lossy().into_owned(),
        backup_path: backup_path.to_string_lossy().into_owned(),
        created_at: Utc::now().to_rfc3339(),
        size_bytes: blob.len() as u64,
    };
    if let Ok(meta_blob) = serde_json::to_string_pretty(&meta) {
        let _ = fs::write(&meta_path, meta_blob);
    }
    Ok(format!(
        "Backup created. backup_id={}\nbackup_file={}",
        id,
        backup_path.display()
    ))
}

fn resolve_backup_by_id(backup_id: &str) -> Result<FileBackupMeta, CoreError> {
    let id = backup_id.trim();
    if id.is_empty() {
        return Err(CoreError::input("backup_id is required"));
    }
    let root = backups_root()?;

    let meta_path = root.join(format!("{}.meta.json", id));
    if let Ok(meta_blob) = fs::read_to_string(&meta_path) {
        if let Ok(meta) = serde_json::from_str::<FileBackupMeta>(&meta_blob) {
            if !meta.backup_path.trim().is_empty() {
                return Ok(meta);
            }
        }
    }

    // Sidecar missing or unreadable; fall back to the .bak file itself.
    let backup_path = root.join(format!("{}.bak", id));
    if backup_path.exists() {
        return Ok(FileBackupMeta {
            backup_id: id.to_string(),
            source_path: String::new(),
            backup_path: backup_path.to_string_lossy().into_owned(),
            created_at: String::new(),
            size_bytes: 0,
        });
    }
    Err(CoreError::Input(format!("backup id not found: {}", id)))
}

pub fn restore_file_backup(path: &str, backup_id: &str) -> Result<String, CoreError> {
    let clean = path.trim();
    if clean.is_empty() {
        return Err(CoreError::input("path is required"));
    }
    let abs = absolutize(clean)?;
    let meta = resolve_backup_by_id(backup_id)?;
    let blob = fs::read(&meta.backup_path)
        .map_err(|e| CoreError::Input(format!("failed to read backup file: {}", e)))?;
    fs::write(&abs, blob)
        .map_err(|e| CoreError::Input(format!("failed to restore backup: {}", e)))?;
    Ok(format!(
        "Restored {} from backup_id={}",
        abs.display(),
        meta.backup_id
    ))
}

/// Diff a file against another path or one of its backups.
pub fn show_file_diff(
    path: &str,
    compare_path: &str,
    backup_id: &str,
) -> Result<String, CoreError> {
    let clean = path.trim();
    if clean.is_empty() {
        return Err(CoreError::input("path is required"));
    }
    let abs = absolutize(clean)?;
    let lhs = read_lines_no_eol(&abs)?;

    let (rhs, to_label) = if !backup_id.trim().is_empty() {
        let meta = resolve_backup_by_id(backup_id)?;
        let rhs = read_lines_no_eol(Path::new(&meta.backup_path))?;
        (rhs, meta.backup_path)
    } else {
        let other = compare_path.trim();
        if other.is_empty() {
            return Err(CoreError::input("compare_path or backup_id is required"));
        }
        let abs_other = absolutize(other)?;
        let rhs = read_lines_no_eol(&abs_other)?;
        (rhs, abs_other.to_string_lossy().into_owned())
    };

    Ok(build_simple_unified_diff(
        &abs.to_string_lossy(),
        &to_label,
        &lhs,
        &rhs,
    ))
}

fn truncate_chars(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    if max <= 1 {
        return chars[..max].iter().collect();
    }
    let mut out: String = chars[..max - 1].iter().collect();
    out.push('…');
    out
}

fn pad_right(s: &str, width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() >= width {
        return chars[..width].iter().collect();
    }
    let mut out = s.to_string();
    out.push_str(&" ".repeat(width - chars.len()));
    out
}

/// Two files side by side, `|` marking differing rows.
pub fn compare_files_side_by_side(
    left_path: &str,
    right_path: &str,
    width: usize,
) -> Result<String, CoreError> {
    let left_abs = absolutize(left_path.trim())?;
    let right_abs = absolutize(right_path.trim())?;
    let left = read_lines_no_eol(&left_abs)?;
    let right = read_lines_no_eol(&right_abs)?;

    let width = if width == 0 { DEFAULT_COMPARE_WIDTH } else { width };
    let width = width.max(MIN_COMPARE_WIDTH);
    let col_width = ((width - 7) / 2).max(20);

    let mut out = String::new();
    out.push_str(&format!(
        "LEFT: {}\nRIGHT: {}\n",
        left_abs.display(),
        right_abs.display()
    ));
    out.push_str(&"-".repeat(col_width * 2 + 7));
    out.push('\n');

    let rows = left.len().max(right.len());
    for i in 0..rows {
        let l = left.get(i).map(String::as_str).unwrap_or("");
        let r = right.get(i).map(String::as_str).unwrap_or("");
        let marker = if l != r { "|" } else { " " };
        out.push_str(&format!(
            "{:4} {} {} {}\n",
            i + 1,
            pad_right(&truncate_chars(l, col_width), col_width),
            marker,
            pad_right(&truncate_chars(r, col_width), col_width)
        ));
        if i + 1 >= MAX_DIFF_OUTPUT_LINES {
            out.push_str("... [COMPARISON TRUNCATED] ...\n");
            break;
        }
    }
    Ok(out.trim_end_matches('\n').to_string())
}

/// Line-wise three-way merge. When both sides changed the same line a
/// conflict block is emitted with LEFT/BASE/RIGHT markers.
pub fn merge_files(
    base_path: &str,
    left_path: &str,
    right_path: &str,
    output_path: &str,
) -> Result<String, CoreError> {
    let base_abs = absolutize(base_path.trim())?;
    let left_abs = absolutize(left_path.trim())?;
    let right_abs = absolutize(right_path.trim())?;

    let base = read_lines_no_eol(&base_abs)?;
    let left = read_lines_no_eol(&left_abs)?;
    let right = read_lines_no_eol(&right_abs)?;

    let rows = base.len().max(left.len()).max(right.len());
    let pick = |lines: &[String], idx: usize| -> String {
        lines.get(idx).cloned().unwrap_or_default()
    };

    let mut merged: Vec<String> = Vec::with_capacity(rows);
    let mut conflicts = 0usize;
    for i in 0..rows {
        let b = pick(&base, i);
        let l = pick(&left, i);
        let r = pick(&right, i);
        if l == r {
            merged.push(l);
        } else if l == b {
            merged.push(r);
        } else if r == b {
            merged.push(l);
        } else {
            conflicts += 1;
            merged.push("<<<<<<< LEFT".to_string());
            merged.push(l);
            merged.push("||||||| BASE".to_string());
            merged.push(b);
            merged.push("=======".to_string());
            merged.push(r);
            merged.push(">>>>>>> RIGHT".to_string());
        }
    }

    let out = output_path.trim();
    let out_abs = if out.is_empty() {
        PathBuf::from(format!("{}.merged", base_abs.display()))
    } else {
        absolutize(out)?
    };

    let mut content = merged.join("\n");
    if !merged.is_empty() {
        content.push('\n');
    }
    fs::write(&out_abs, content)
        .map_err(|e| CoreError::Input(format!("failed to write merge output: {}", e)))?;
    Ok(format!(
        "Merge completed. output={} conflicts={}",
        out_abs.display(),
        conflicts
    ))
}

/// Describe a file: size, extension, binary/encoding guess, newline style.
pub fn detect_file_type(path: &str) -> Result<String, CoreError> {
    let clean = path.trim();
    if clean.is_empty() {
        return Err(CoreError::input("path is required"));
    }
    let abs = absolutize(clean)?;
    let blob =
        fs::read(&abs).map_err(|e| CoreError::Input(format!("failed to read file: {}", e)))?;

    let is_binary = looks_binary(&blob);
    let encoding = if is_binary {
        "binary"
    } else if std::str::from_utf8(&blob).is_err() {
        "non-utf8-text"
    } else {
        "utf-8"
    };

    let s = String::from_utf8_lossy(&blob);
    let newline = if s.contains("\r\n") {
        "crlf"
    } else if s.contains('\n') {
        "lf"
    } else {
        "none"
    };

    let extension = abs
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    // Keys sorted for stable output.
    let mut out = String::new();
    out.push_str(&format!("encoding: {}\n", encoding));
    out.push_str(&format!("extension: {}\n", extension));
    out.push_str(&format!("is_binary: {}\n", is_binary));
    out.push_str(&format!("newline_style: {}\n", newline));
    out.push_str(&format!("path: {}\n", abs.display()));
    out.push_str(&format!("size_bytes: {}", blob.len()));
    Ok(out)
}

fn absolutize(path: &str) -> Result<PathBuf, CoreError> {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| CoreError::Input(format!("failed to resolve path: {}", e)))?;
    Ok(cwd.join(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_strips_common_prefix_and_suffix() {
        let from = lines(&["a", "b", "c", "d"]);
        let to = lines(&["a", "X", "c", "d"]);
        let diff = build_simple_unified_diff("L", "R", &from, &to);
        assert!(diff.contains("@@ -2,1 +2,1 @@"));
        assert!(diff.contains("-b"));
        assert!(diff.contains("+X"));
        assert!(!diff.contains("-a"));
        assert!(!diff.contains("-d"));
    }

    #[test]
    fn diff_of_identical_inputs_reports_none() {
        let same = lines(&["x", "y"]);
        let diff = build_simple_unified_diff("L", "R", &same, &same);
        assert!(diff.contains("(No differences)"));
    }

    #[test]
    fn merge_applies_one_sided_changes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        let left = dir.path().join("left");
        let right = dir.path().join("right");
        std::fs::write(&base, "a\nb\nc\n").unwrap();
        std::fs::write(&left, "A\nb\nc\n").unwrap();
        std::fs::write(&right, "a\nb\nC\n").unwrap();
        let out = merge_files(
            base.to_str().unwrap(),
            left.to_str().unwrap(),
            right.to_str().unwrap(),
            "",
        )
        .unwrap();
        assert!(out.contains("conflicts=0"));
        let merged = std::fs::read_to_string(format!("{}.merged", base.display())).unwrap();
        assert_eq!(merged, "A\nb\nC\n");
    }

    #[test]
    fn merge_marks_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        let left = dir.path().join("left");
        let right = dir.path().join("right");
        let outp = dir.path().join("out");
        std::fs::write(&base, "same\n").unwrap();
        std::fs::write(&left, "left version\n").unwrap();
        std::fs::write(&right, "right version\n").unwrap();
        let out = merge_files(
            base.to_str().unwrap(),
            left.to_str().unwrap(),
            right.to_str().unwrap(),
            outp.to_str().unwrap(),
        )
        .unwrap();
        assert!(out.contains("conflicts=1"));
        let merged = std::fs::read_to_string(&outp).unwrap();
        assert!(merged.contains("<<<<<<< LEFT"));
        assert!(merged.contains("||||||| BASE"));
        assert!(merged.contains(">>>>>>> RIGHT"));
    }

    #[test]
    fn side_by_side_marks_differing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let l = dir.path().join("l");
        let r = dir.path().join("r");
        std::fs::write(&l, "same\ndiff-l\n").unwrap();
        std::fs::write(&r, "same\ndiff-r\n").unwrap();
        let out =
            compare_files_side_by_side(l.to_str().unwrap(), r.to_str().unwrap(), 80).unwrap();
        let rows: Vec<&str> = out.lines().collect();
        assert!(rows[3].contains(" | "));
        assert!(!rows[2].contains(" | "));
    }

    #[test]
    fn backup_and_restore_round_trip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"original contents\n").unwrap();
        let path = f.path().to_str().unwrap().to_string();

        let out = create_file_backup(&path).unwrap();
        let id = out
            .lines()
            .next()
            .unwrap()
            .strip_prefix("Backup created. backup_id=")
            .unwrap()
            .to_string();

        std::fs::write(&path, "clobbered\n").unwrap();
        restore_file_backup(&path, &id).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original contents\n");
    }

    #[test]
    fn backup_id_shape() {
        let id = backup_path_id("/tmp/some/file.rs");
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn detect_file_type_reports_newline_style() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"a\r\nb\r\n").unwrap();
        let out = detect_file_type(f.path().to_str().unwrap()).unwrap();
        assert!(out.contains("newline_style: crlf"));
        assert!(out.contains("is_binary: false"));
        assert!(out.contains("encoding: utf-8"));
    }
}
