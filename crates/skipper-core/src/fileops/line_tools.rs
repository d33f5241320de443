//! Range, pattern and batch mutations on text files
//!
//! Every operation reads the file once, applies its edits in memory, and
//! writes back with the original trailing-newline style.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;

use super::{normalize_range, read_text_lines, write_text_lines, LineRange};

/// One step of `batch_line_operations`, applied in order against the file
/// state left by the previous step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchLineOperation {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub end_line: usize,
    #[serde(default)]
    pub text: String,
}

pub fn remove_line_ranges(path: &str, ranges: &[LineRange]) -> Result<String, CoreError> {
    if ranges.is_empty() {
        return Err(CoreError::input("at least one range is required"));
    }
    let p = Path::new(path);
    let (lines, had_newline) = read_text_lines(p)?;
    if lines.is_empty() {
        return Ok("No changes. File is empty.".to_string());
    }

    let mut doomed: HashSet<usize> = HashSet::new();
    for r in ranges {
        let (start, end) = normalize_range(r.start, r.end, lines.len())?;
        doomed.extend(start - 1..end);
    }

    let kept: Vec<String> = lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !doomed.contains(i))
        .map(|(_, l)| l)
        .collect();

    write_text_lines(p, &kept, had_newline)?;
    Ok(format!("Removed {} line(s) in {}.", doomed.len(), path))
}

pub fn replace_line_range(
    path: &str,
    start: usize,
    end: usize,
    replacement: &str,
) -> Result<String, CoreError> {
    let p = Path::new(path);
    let (lines, had_newline) = read_text_lines(p)?;
    let (start, end) = normalize_range(start, end, lines.len())?;

    let block: Vec<String> = if replacement.is_empty() {
        Vec::new()
    } else {
        replacement
            .replace("\r\n", "\n")
            .split('\n')
            .map(str::to_string)
            .collect()
    };

    let mut out: Vec<String> = Vec::with_capacity(lines.len() - (end - start + 1) + block.len());
    out.extend(lines[..start - 1].iter().cloned());
    out.extend(block);
    out.extend(lines[end..].iter().cloned());

    write_text_lines(p, &out, had_newline)?;
    Ok(format!("Replaced lines {}-{} in {}.", start, end, path))
}

pub fn apply_batch_line_operations(
    path: &str,
    ops: &[BatchLineOperation],
) -> Result<String, CoreError> {
    if ops.is_empty() {
        return Err(CoreError::input("operations cannot be empty"));
    }
    let p = Path::new(path);
    let (mut lines, had_newline) = read_text_lines(p)?;

    for (i, op) in ops.iter().enumerate() {
        let step = |e: CoreError| CoreError::Input(format!("operation {}: {}", i + 1, e));
        match op.op.trim().to_lowercase().as_str() {
            "delete" => {
                let end = if op.end_line == 0 { op.line } else { op.end_line };
                let (start, end) = normalize_range(op.line, end, lines.len()).map_err(step)?;
                lines.drain(start - 1..end);
            }
            "replace" => {
                let end = if op.end_line == 0 { op.line } else { op.end_line };
                let (start, end) = normalize_range(op.line, end, lines.len()).map_err(step)?;
                let block = split_text_block(&op.text);
                lines.drain(start - 1..end);
                for (offset, item) in block.into_iter().enumerate() {
                    lines.insert(start - 1 + offset, item);
                }
            }
            "insert_before" => insert_at(&mut lines, true, op.line, &op.text).map_err(step)?,
            "insert_after" => insert_at(&mut lines, false, op.line, &op.text).map_err(step)?,
            other => {
                return Err(CoreError::Input(format!(
                    "operation {}: unsupported op {:?}",
                    i + 1,
                    other
                )))
            }
        }
    }

    write_text_lines(p, &lines, had_newline)?;
    Ok(format!("Applied {} batch operation(s) to {}.", ops.len(), path))
}

fn split_text_block(text: &str) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.replace("\r\n", "\n")
            .split('\n')
            .map(str::to_string)
            .collect()
    }
}

fn insert_at(
    lines: &mut Vec<String>,
    before: bool,
    line: usize,
    text: &str,
) -> Result<(), CoreError> {
    if line < 1 || line > lines.len() {
        return Err(CoreError::Input(format!(
            "invalid insert line {} for file length {}",
            line,
            lines.len()
        )));
    }
    let block = split_text_block(text);
    if block.is_empty() {
        return Ok(());
    }
    let idx = if before { line - 1 } else { line };
    if idx >= lines.len() {
        lines.extend(block);
    } else {
        for (offset, item) in block.into_iter().enumerate() {
            lines.insert(idx + offset, item);
        }
    }
    Ok(())
}

pub fn delete_lines_by_pattern(
    path: &str,
    pattern: &str,
    case_sensitive: bool,
) -> Result<String, CoreError> {
    if pattern.trim().is_empty() {
        return Err(CoreError::input("pattern is required"));
    }
    let p = Path::new(path);
    let (lines, had_newline) = read_text_lines(p)?;

    let effective = if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){}", pattern)
    };
    let re = regex::Regex::new(&effective)
        .map_err(|e| CoreError::Input(format!("invalid regex pattern: {}", e)))?;

    let before = lines.len();
    let kept: Vec<String> = lines.into_iter().filter(|l| !re.is_match(l)).collect();
    let removed = before - kept.len();

    write_text_lines(p, &kept, had_newline)?;
    Ok(format!(
        "Removed {} line(s) matching pattern in {}.",
        removed, path
    ))
}

pub fn extract_line_range(path: &str, start: usize, end: usize) -> Result<String, CoreError> {
    let (lines, _) = read_text_lines(Path::new(path))?;
    let (start, end) = normalize_range(start, end, lines.len())?;
    let mut out = String::new();
    for i in start..=end {
        out.push_str(&format!("{} | {}\n", i, lines[i - 1]));
    }
    if out.is_empty() {
        return Ok("(No lines extracted)".to_string());
    }
    Ok(out.trim_end_matches('\n').to_string())
}

pub fn reorder_line_range(
    path: &str,
    start: usize,
    end: usize,
    target_line: usize,
) -> Result<String, CoreError> {
    let p = Path::new(path);
    let (lines, had_newline) = read_text_lines(p)?;
    let (start, end) = normalize_range(start, end, lines.len())?;
    if target_line < 1 || target_line > lines.len() + 1 {
        return Err(CoreError::Input(format!(
            "target_line {} is out of range 1..{}",
            target_line,
            lines.len() + 1
        )));
    }
    if target_line >= start && target_line <= end + 1 {
        return Ok("No changes. target_line already points inside the selected range.".to_string());
    }

    let block: Vec<String> = lines[start - 1..end].to_vec();
    let mut rest: Vec<String> = Vec::with_capacity(lines.len() - block.len());
    rest.extend(lines[..start - 1].iter().cloned());
    rest.extend(lines[end..].iter().cloned());

    let mut insert_idx = target_line - 1;
    if target_line > end {
        insert_idx -= end - start + 1;
    }
    let insert_idx = insert_idx.min(rest.len());

    let mut reordered: Vec<String> = Vec::with_capacity(lines.len());
    reordered.extend(rest[..insert_idx].iter().cloned());
    reordered.extend(block);
    reordered.extend(rest[insert_idx..].iter().cloned());

    write_text_lines(p, &reordered, had_newline)?;
    Ok(format!(
        "Moved lines {}-{} to before line {} in {}.",
        start, end, target_line, path
    ))
}

pub fn remove_duplicate_lines(
    path: &str,
    case_sensitive: bool,
    ignore_blank: bool,
) -> Result<String, CoreError> {
    let p = Path::new(path);
    let (lines, had_newline) = read_text_lines(p)?;

    let mut seen: HashSet<String> = HashSet::with_capacity(lines.len());
    let mut removed = 0usize;
    let mut result: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if ignore_blank && line.trim().is_empty() {
            result.push(line);
            continue;
        }
        let key = if case_sensitive {
            line.clone()
        } else {
            line.to_lowercase()
        };
        if !seen.insert(key) {
            removed += 1;
            continue;
        }
        result.push(line);
    }

    write_text_lines(p, &result, had_newline)?;
    Ok(format!(
        "Removed {} duplicate line(s) from {}.",
        removed, path
    ))
}
