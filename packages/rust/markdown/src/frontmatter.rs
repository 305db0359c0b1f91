//! Minimal YAML-ish frontmatter reader.
//!
//! Docs pages only use flat `key: value` pairs plus a `tags` list, so this
//! is a line scanner rather than a YAML parser.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n?").expect("valid regex"));

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_]+):\s*(.*)$").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+(.+)$").expect("valid regex"));

/// Parsed frontmatter fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    /// Scalar fields with wrapping quotes removed.
    pub fields: BTreeMap<String, String>,
    /// `tags`, from an inline list, comma list, single value, or `- item` lines.
    pub tags: Vec<String>,
}

impl Frontmatter {
    /// Field value, `None` when missing or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title")
    }

    pub fn description(&self) -> Option<&str> {
        self.get("description")
    }

    pub fn icon(&self) -> Option<&str> {
        self.get("icon")
    }
}

/// Split `text` into frontmatter and body.
///
/// Returns `None` when the text has no well-formed leading `---` block.
pub fn parse_frontmatter(text: &str) -> Option<(Frontmatter, &str)> {
    if !text.starts_with("---") {
        return None;
    }
    let caps = BLOCK_RE.captures(text)?;
    let raw = caps.get(1).map_or("", |m| m.as_str());
    let end = caps.get(0).map_or(0, |m| m.end());
    Some((parse_fields(raw), &text[end..]))
}

/// Like [`parse_frontmatter`], falling back to empty frontmatter and the whole text.
pub fn split_frontmatter(text: &str) -> (Frontmatter, &str) {
    parse_frontmatter(text).unwrap_or_else(|| (Frontmatter::default(), text))
}

fn parse_fields(raw: &str) -> Frontmatter {
    let mut fm = Frontmatter::default();
    let lines: Vec<&str> = raw.lines().collect();
    let mut idx = 0;

    while idx < lines.len() {
        let Some(caps) = KEY_RE.captures(lines[idx]) else {
            idx += 1;
            continue;
        };
        let key = caps[1].trim().to_string();
        let value = caps[2].trim();

        if key == "tags" {
            let mut tags = parse_inline_tags(value);
            let mut next = idx + 1;
            while let Some(item) = lines.get(next).and_then(|l| LIST_ITEM_RE.captures(l)) {
                let tag = strip_wrapping_quotes(&item[1]);
                if !tag.is_empty() {
                    tags.push(tag.to_string());
                }
                next += 1;
            }
            fm.tags = tags;
            idx = next;
            continue;
        }

        fm.fields.insert(key, strip_wrapping_quotes(value).to_string());
        idx += 1;
    }

    fm
}

/// Remove one pair of matching `"` or `'` around a value.
pub fn strip_wrapping_quotes(value: &str) -> &str {
    let raw = value.trim();
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    if quoted {
        raw[1..raw.len() - 1].trim()
    } else {
        raw
    }
}

fn parse_inline_tags(raw: &str) -> Vec<String> {
    let value = strip_wrapping_quotes(raw);
    if value.is_empty() {
        return Vec::new();
    }

    let list = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .map(str::trim);

    match list {
        Some(inside) => split_tag_list(inside),
        None if value.contains(',') => split_tag_list(value),
        None => vec![value.to_string()],
    }
}

fn split_tag_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(strip_wrapping_quotes)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_fields() {
        let text = "---\ntitle: \"Billing FAQ\"\ndescription: 'How billing works'\nicon: credit-card\n---\nBody text\n";
        let (fm, body) = parse_frontmatter(text).unwrap();
        assert_eq!(fm.title(), Some("Billing FAQ"));
        assert_eq!(fm.description(), Some("How billing works"));
        assert_eq!(fm.icon(), Some("credit-card"));
        assert_eq!(body, "Body text\n");
    }

    #[test]
    fn parses_tag_forms() {
        let inline = "---\ntags: [alpha, \"beta\", ]\n---\n";
        assert_eq!(split_frontmatter(inline).0.tags, vec!["alpha", "beta"]);

        let comma = "---\ntags: one, two\n---\n";
        assert_eq!(split_frontmatter(comma).0.tags, vec!["one", "two"]);

        let single = "---\ntags: solo\n---\n";
        assert_eq!(split_frontmatter(single).0.tags, vec!["solo"]);

        let block = "---\ntags:\n  - first\n  - 'second'\ntitle: After\n---\n";
        let (fm, _) = split_frontmatter(block);
        assert_eq!(fm.tags, vec!["first", "second"]);
        assert_eq!(fm.title(), Some("After"));
    }

    #[test]
    fn unterminated_block_is_not_frontmatter() {
        let text = "---\ntitle: Oops\nno closing fence";
        assert!(parse_frontmatter(text).is_none());
        let (fm, body) = split_frontmatter(text);
        assert_eq!(fm, Frontmatter::default());
        assert_eq!(body, text);
    }

    #[test]
    fn no_leading_fence() {
        assert!(parse_frontmatter("# Title\n").is_none());
    }

    #[test]
    fn blank_values_read_as_missing() {
        let (fm, _) = split_frontmatter("---\ntitle: ''\ndescription:\n---\n");
        assert_eq!(fm.title(), None);
        assert_eq!(fm.description(), None);
    }
}
