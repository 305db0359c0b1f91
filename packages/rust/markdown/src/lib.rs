//! Markdown/MDX reading and retrieval-text normalization.
//!
//! - [`frontmatter`]: leading `---` key/value block
//! - [`blocks`]: fenced ```yaml / ```sql block extraction
//! - [`normalize_doc`]: the deterministic text sent to the retrieval service

pub mod blocks;
pub mod frontmatter;
mod normalize;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

pub use blocks::{
    FencedBlock, first_yaml_block, split_fenced, sql_blocks, strip_fenced_code, yaml_blocks,
};
pub use frontmatter::{Frontmatter, parse_frontmatter, split_frontmatter, strip_wrapping_quotes};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of normalizing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDoc {
    /// Retrieval text: `# title`, description, body; ends with one newline.
    pub content: String,
    pub title: String,
    /// Empty when the page has none.
    pub description: String,
    /// Raw frontmatter tags.
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Normalize page text for retrieval.
///
/// The title comes from frontmatter, else `fallback_title`. A body that
/// already opens with `# {title}` does not get a second heading, so feeding
/// the output back in with the same title yields the same text.
#[instrument(skip_all, fields(fallback_title = %fallback_title))]
pub fn normalize_doc(raw: &str, fallback_title: &str) -> NormalizedDoc {
    let (fm, body) = split_frontmatter(raw);
    let body = normalize::normalize_body(body);

    let title = fm
        .title()
        .map(clean_inline)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.to_string());
    let body = strip_heading(&body, &title).unwrap_or(&body);

    let description = fm
        .description()
        .map(|d| normalize::collapse_whitespace(&normalize::clean_prose(d)))
        .unwrap_or_default();

    let heading = format!("# {title}");
    let content = [heading.as_str(), description.as_str(), body]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let content = format!("{}\n", content.trim());

    debug!(len = content.len(), "normalized document");

    NormalizedDoc {
        content,
        title,
        description,
        tags: fm.tags,
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Title derived from a ref: last segment, `-` as spaces, title-cased.
pub fn fallback_title_from_ref(doc_ref: &str) -> String {
    let segment = doc_ref.rsplit('/').next().unwrap_or(doc_ref);
    let spaced = segment.replace('-', " ");
    let titled = title_case(spaced.trim());
    if titled.is_empty() {
        doc_ref.to_string()
    } else {
        titled
    }
}

/// Uppercase the first letter of each alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Inline cleanup applied to titles so they survive a second pass unchanged.
fn clean_inline(text: &str) -> String {
    normalize::collapse_whitespace(&normalize::strip_inline_markup(text)).replace('\n', " ")
}

/// Body without a leading `# {title}` line, if it has one.
fn strip_heading<'a>(body: &'a str, title: &str) -> Option<&'a str> {
    let first = body.lines().next()?;
    if first.strip_prefix("# ")?.trim() != title {
        return None;
    }
    Some(body[first.len()..].trim_start_matches('\n'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
