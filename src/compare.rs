use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use difference::{Changeset, Difference};

use crate::transform::Pipeline;

/// Differing lines shown for one mismatch.
const MAX_DIFF_LINES: usize = 5;

/// Outcome of one golden/actual check. `detail` is for humans only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub matched: bool,
    pub detail: Option<String>,
}

impl ComparisonResult {
    pub fn matched() -> Self {
        Self {
            matched: true,
            detail: None,
        }
    }

    pub fn mismatch(detail: impl Into<String>) -> Self {
        Self {
            matched: false,
            detail: Some(detail.into()),
        }
    }
}

/// Compare `actual` against `golden` after applying `transforms` to both.
///
/// A missing file on either side is a mismatch, not an error. Other read
/// failures are returned to the caller.
pub fn compare(golden: &Path, actual: &Path, transforms: &Pipeline) -> Result<ComparisonResult> {
    let Some(golden_bytes) = read_optional(golden)? else {
        return Ok(ComparisonResult::mismatch(format!(
            "golden file missing: {}",
            golden.display()
        )));
    };
    let Some(actual_bytes) = read_optional(actual)? else {
        return Ok(ComparisonResult::mismatch(format!(
            "actual file missing: {}",
            actual.display()
        )));
    };
    Ok(compare_bytes(&golden_bytes, &actual_bytes, transforms))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {path:?}")),
    }
}

pub fn compare_bytes(golden: &[u8], actual: &[u8], transforms: &Pipeline) -> ComparisonResult {
    match (std::str::from_utf8(golden), std::str::from_utf8(actual)) {
        (Ok(golden), Ok(actual)) => compare_text(golden, actual, transforms),
        _ if transforms.is_empty() => compare_binary(golden, actual),
        _ => compare_raw(golden, actual, transforms),
    }
}

/// Transformed comparison of content that is not valid UTF-8. The bytes
/// decide the match; the diff is only rendered lossily.
fn compare_raw(golden: &[u8], actual: &[u8], transforms: &Pipeline) -> ComparisonResult {
    let golden = transforms.apply_bytes(golden);
    let actual = transforms.apply_bytes(actual);
    let golden_lines = normalized_byte_lines(&golden);
    let actual_lines = normalized_byte_lines(&actual);
    if golden_lines == actual_lines {
        return ComparisonResult::matched();
    }
    let golden = golden_lines.join(&b'\n');
    let actual = actual_lines.join(&b'\n');
    let detail = render_diff(
        &String::from_utf8_lossy(&golden),
        &String::from_utf8_lossy(&actual),
    );
    if detail.is_empty() {
        // Only the undecodable bytes differ.
        return compare_binary(&golden, &actual);
    }
    ComparisonResult::mismatch(detail)
}

fn compare_binary(golden: &[u8], actual: &[u8]) -> ComparisonResult {
    if golden == actual {
        return ComparisonResult::matched();
    }
    let offset = golden
        .iter()
        .zip(actual)
        .position(|(g, a)| g != a)
        .unwrap_or(golden.len().min(actual.len()));
    ComparisonResult::mismatch(format!(
        "binary content differs at byte {offset} (golden {}B vs actual {}B)",
        golden.len(),
        actual.len()
    ))
}

pub fn compare_text(golden: &str, actual: &str, transforms: &Pipeline) -> ComparisonResult {
    let golden = transforms.apply(golden);
    let actual = transforms.apply(actual);
    let golden_lines = normalized_lines(&golden);
    let actual_lines = normalized_lines(&actual);
    if golden_lines == actual_lines {
        return ComparisonResult::matched();
    }
    ComparisonResult::mismatch(render_diff(
        &golden_lines.join("\n"),
        &actual_lines.join("\n"),
    ))
}

/// Lines with `\r\n` endings, trailing whitespace and trailing blank lines
/// removed.
fn normalized_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

fn normalized_byte_lines(text: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = text
        .split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii_end)
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

fn render_diff(golden: &str, actual: &str) -> String {
    let changeset = Changeset::new(golden, actual, "\n");
    let mut shown = Vec::new();
    let mut hidden = 0usize;
    for diff in &changeset.diffs {
        let (marker, chunk) = match diff {
            Difference::Same(_) => continue,
            Difference::Rem(chunk) => ('-', chunk),
            Difference::Add(chunk) => ('+', chunk),
        };
        if chunk.is_empty() {
            continue;
        }
        for line in chunk.split('\n') {
            if shown.len() < MAX_DIFF_LINES {
                shown.push(format!("{marker}{line}"));
            } else {
                hidden += 1;
            }
        }
    }
    if hidden > 0 {
        shown.push(format!("... {hidden} more differing lines"));
    }
    shown.join("\n")
}
