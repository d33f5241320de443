//! Text-file operations
//!
//! Shared reading/writing helpers plus the line-editing and file-management
//! families built on them. All mutations preserve whether the file ended
//! with a trailing newline.

pub mod file_tools;
pub mod line_tools;

use std::fs;
use std::path::Path;

use crate::constants::fileops::{
    BINARY_SAMPLE_BYTES, MAX_READ_CHARS, MAX_READ_LINES,
};
use crate::error::CoreError;

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// Parse `"N-M"` or `"N"`. Zero-based and reversed ranges are rejected.
pub fn parse_range_spec(spec: &str) -> Result<LineRange, CoreError> {
    let s = spec.trim();
    if s.is_empty() {
        return Err(CoreError::input("empty range"));
    }
    if let Some((lhs, rhs)) = s.split_once('-') {
        let start: usize = lhs
            .trim()
            .parse()
            .map_err(|_| CoreError::Input(format!("invalid range values: {}", spec)))?;
        let end: usize = rhs
            .trim()
            .parse()
            .map_err(|_| CoreError::Input(format!("invalid range values: {}", spec)))?;
        if start < 1 || end < start {
            return Err(CoreError::Input(format!("invalid range values: {}", spec)));
        }
        return Ok(LineRange { start, end });
    }
    let line: usize = s
        .parse()
        .map_err(|_| CoreError::Input(format!("invalid line number: {}", spec)))?;
    if line < 1 {
        return Err(CoreError::Input(format!("invalid line number: {}", spec)));
    }
    Ok(LineRange {
        start: line,
        end: line,
    })
}

/// Parse a list of range specs separated by commas, semicolons or newlines.
pub fn parse_line_ranges(raw: &str) -> Result<Vec<LineRange>, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CoreError::input("ranges cannot be empty"));
    }
    let mut out = Vec::new();
    for item in raw
        .split(|c| c == ',' || c == ';' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        out.push(parse_range_spec(item)?);
    }
    out.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    Ok(out)
}

/// Clamp a range against the file length. `start` past the end is an error;
/// `end` past the end is clamped.
pub fn normalize_range(start: usize, end: usize, max: usize) -> Result<(usize, usize), CoreError> {
    if start < 1 || end < start {
        return Err(CoreError::Input(format!("invalid line range {}-{}", start, end)));
    }
    if max == 0 {
        return Err(CoreError::input("target file is empty"));
    }
    if start > max {
        return Err(CoreError::Input(format!(
            "range start {} exceeds file length {}",
            start, max
        )));
    }
    Ok((start, end.min(max)))
}

/// Heuristic over the first ≤8 KiB: any NUL byte means binary, otherwise a
/// control-byte density above 10%.
pub fn looks_binary(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    let sample = &data[..data.len().min(BINARY_SAMPLE_BYTES)];
    let mut control = 0usize;
    for &b in sample {
        if b == 0 {
            return true;
        }
        if b < 0x09 || (b > 0x0D && b < 0x20) {
            control += 1;
        }
    }
    control as f64 / sample.len() as f64 > 0.10
}

/// Read a file as lines, remembering its trailing-newline style.
pub fn read_text_lines(path: &Path) -> Result<(Vec<String>, bool), CoreError> {
    let blob = fs::read(path)
        .map_err(|e| CoreError::Input(format!("failed to read file: {}", e)))?;
    let text = String::from_utf8_lossy(&blob);
    let had_trailing_newline = text.ends_with('\n');
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if lines.last().map(|s| s.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    Ok((lines, had_trailing_newline))
}

/// Write lines back, restoring the recorded trailing-newline style.
pub fn write_text_lines(
    path: &Path,
    lines: &[String],
    had_trailing_newline: bool,
) -> Result<(), CoreError> {
    let mut out = lines.join("\n");
    if had_trailing_newline || !lines.is_empty() {
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| CoreError::Input(format!("failed to write file: {}", e)))
}

/// Read a file formatted as `"<lineno> | <text>"` lines, refusing binary
/// content and truncating at the configured line/char limits with a visible
/// footer naming which limit fired.
pub fn read_file_with_lines(path: &str, line_range: &str) -> Result<String, CoreError> {
    let blob = fs::read(path)
        .map_err(|e| CoreError::Input(format!("failed to open file: {}", e)))?;
    if looks_binary(&blob) {
        return Ok(format!(
            "Refused to read {}: detected binary/non-text content. Use tools like 'file', 'strings', or targeted commands.",
            path
        ));
    }

    let (start, end) = if line_range.trim().is_empty() {
        (1, usize::MAX)
    } else {
        let r = parse_range_spec(line_range)?;
        (r.start, r.end)
    };

    let text = String::from_utf8_lossy(&blob);
    let mut all: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        all.pop();
    }

    let mut out = String::new();
    let mut total_chars = 0usize;
    let mut emitted = 0usize;
    let mut line_limited = false;
    let mut char_limited = false;
    let mut last_line = 0usize;

    for (idx, raw) in all.iter().enumerate() {
        let lineno = idx + 1;
        if lineno < start {
            continue;
        }
        if lineno > end {
            break;
        }
        if emitted >= MAX_READ_LINES {
            line_limited = true;
            break;
        }
        let mut line = raw.trim_end_matches('\r').to_string();
        let line_chars = line.chars().count();
        if total_chars + line_chars > MAX_READ_CHARS {
            let remaining = MAX_READ_CHARS.saturating_sub(total_chars);
            if remaining > 0 {
                line = line.chars().take(remaining).collect();
                out.push_str(&format!("{} | {}\n", lineno, line));
                total_chars += line.chars().count();
                emitted += 1;
                last_line = lineno;
            }
            char_limited = true;
            break;
        }
        out.push_str(&format!("{} | {}\n", lineno, line));
        total_chars += line_chars;
        emitted += 1;
        last_line = lineno;
    }

    if line_limited || char_limited {
        out.push_str(&truncation_notice(
            path,
            last_line,
            total_chars,
            line_limited,
            char_limited,
        ));
    }

    if out.trim().is_empty() {
        return Ok("(Empty text file)".to_string());
    }
    Ok(out)
}

fn truncation_notice(
    path: &str,
    total_lines: usize,
    total_chars: usize,
    line_limited: bool,
    char_limited: bool,
) -> String {
    let mut reasons = Vec::new();
    if line_limited {
        reasons.push(format!("line limit ({})", MAX_READ_LINES));
    }
    if char_limited {
        reasons.push(format!("char limit ({})", MAX_READ_CHARS));
    }
    format!(
        "\n... [READ TRUNCATED: {} | file={} | read_lines={} read_chars={}] ...\n",
        reasons.join(", "),
        path,
        total_lines,
        total_chars
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatchOp {
    Delete,
    Replace(Vec<String>),
    InsertBefore(Vec<String>),
    InsertAfter(Vec<String>),
}

/// Apply the line-addressed patch syntax:
///
/// - `N--` delete line N
/// - `N++ text` replace line N (multi-line via `\n`, literal or real)
/// - `N<< text` insert before N, `N>> text` insert after N
/// - `0++` / `0<<` prepend, `00++` / `00>>` append
///
/// All addresses refer to the file as it was before the call; offsets from
/// earlier operations are handled here, never by the caller.
pub fn apply_file_patch(path: &str, patch_content: &str) -> Result<String, CoreError> {
    let p = Path::new(path);
    let (original_lines, _) = read_text_lines(p)?;

    let op_re = regex::Regex::new(r"^(\d+|00)(\+\+|--|<<|>>)\s?(.*)$").expect("static regex");

    let mut ops: std::collections::HashMap<String, PatchOp> = std::collections::HashMap::new();
    let mut last_target: Option<String> = None;

    for line in patch_content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = op_re.captures(line) else {
            // Continuation of the previous operation's text (real newlines).
            if let Some(target) = &last_target {
                if let Some(op) = ops.get_mut(target) {
                    match op {
                        PatchOp::Replace(lines)
                        | PatchOp::InsertBefore(lines)
                        | PatchOp::InsertAfter(lines) => lines.push(line.to_string()),
                        PatchOp::Delete => {}
                    }
                }
            }
            continue;
        };

        let target = caps[1].to_string();
        let operator = &caps[2];
        let text = caps[3].replace("\\n", "\n");
        let lines: Vec<String> = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').map(str::to_string).collect()
        };

        let op = match operator {
            "--" => PatchOp::Delete,
            "++" => match target.as_str() {
                "0" => PatchOp::InsertBefore(lines),
                "00" => PatchOp::InsertAfter(lines),
                _ => PatchOp::Replace(lines),
            },
            "<<" => PatchOp::InsertBefore(lines),
            ">>" => PatchOp::InsertAfter(lines),
            _ => unreachable!("regex admits four operators"),
        };
        ops.insert(target.clone(), op);
        last_target = Some(target);
    }

    let mut new_lines: Vec<String> = Vec::with_capacity(original_lines.len());

    if let Some(PatchOp::InsertBefore(lines)) = ops.get("0") {
        new_lines.extend(lines.iter().cloned());
    }

    for (i, line) in original_lines.iter().enumerate() {
        let key = (i + 1).to_string();
        match ops.get(&key) {
            Some(PatchOp::Delete) => continue,
            Some(PatchOp::Replace(lines)) => new_lines.extend(lines.iter().cloned()),
            Some(PatchOp::InsertBefore(lines)) => {
                new_lines.extend(lines.iter().cloned());
                new_lines.push(line.clone());
            }
            Some(PatchOp::InsertAfter(lines)) => {
                new_lines.push(line.clone());
                new_lines.extend(lines.iter().cloned());
            }
            None => new_lines.push(line.clone()),
        }
    }

    if let Some(PatchOp::InsertAfter(lines)) = ops.get("00") {
        new_lines.extend(lines.iter().cloned());
    }

    let mut final_content = new_lines.join("\n");
    if !final_content.ends_with('\n') {
        final_content.push('\n');
    }
    fs::write(p, final_content)
        .map_err(|e| CoreError::Input(format!("failed to save file: {}", e)))?;

    Ok(format!(
        "Successfully patched {}. Check content to verify.",
        path
    ))
}
