//! Fenced code block extraction.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static YAML_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```yaml\s*\n(.*?)\n```").expect("valid regex"));

static SQL_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)```sql\s*\n(.*?)\n```").expect("valid regex"));

static ANY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

/// A fenced block located in its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Block contents between the fence lines.
    pub body: &'a str,
    /// Byte range of the whole block, fences included.
    pub span: Range<usize>,
}

/// First ```yaml block, with its position.
pub fn first_yaml_block(text: &str) -> Option<FencedBlock<'_>> {
    let caps = YAML_BLOCK_RE.captures(text)?;
    let whole = caps.get(0)?;
    let body = caps.get(1)?;
    Some(FencedBlock {
        body: body.as_str(),
        span: whole.range(),
    })
}

/// Bodies of every ```yaml block.
pub fn yaml_blocks(text: &str) -> Vec<&str> {
    YAML_BLOCK_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Bodies of every ```sql block (fence tag is case-insensitive).
pub fn sql_blocks(text: &str) -> Vec<&str> {
    SQL_BLOCK_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Remove every triple-backtick fenced block.
pub fn strip_fenced_code(text: &str) -> String {
    ANY_FENCE_RE.replace_all(text, "").into_owned()
}

/// Split text into alternating prose and fenced segments, in order.
///
/// Each item is `(is_code, segment)`; concatenating the segments yields the input.
pub fn split_fenced(text: &str) -> Vec<(bool, &str)> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in ANY_FENCE_RE.find_iter(text) {
        if m.start() > last {
            segments.push((false, &text[last..m.start()]));
        }
        segments.push((true, m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        segments.push((false, &text[last..]));
    }
    segments
}
