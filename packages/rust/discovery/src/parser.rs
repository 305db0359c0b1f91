//! Navigation config (`docs.json`) parser.
//!
//! Only the navigation structure is traversed so titles, descriptions and
//! other free-form strings never leak into the ref set:
//! - Objects: descend into `tabs`, `pages`, `navigation`, `groups`
//! - Arrays: descend into every item
//! - Strings: a page ref unless it is an external URL or an anchor

use std::collections::BTreeSet;

use docsync_shared::{DocsyncError, Result};
use serde_json::Value;

use crate::normalize_route;

/// Keys whose values hold navigation entries.
const NAV_KEYS: [&str; 4] = ["tabs", "pages", "navigation", "groups"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed view of the navigation config.
#[derive(Debug, Clone, Default)]
pub struct NavDocument {
    /// Published page refs (no leading slash, no extension).
    pub refs: BTreeSet<String>,
    /// Normalized redirect source routes (leading slash, no trailing slash).
    pub redirect_sources: BTreeSet<String>,
    /// Whether the config has a top-level `navigation` or `tabs` key at all.
    pub has_navigation: bool,
}

impl NavDocument {
    /// Whether `doc_ref` is referenced from the navigation.
    pub fn contains(&self, doc_ref: &str) -> bool {
        self.refs.contains(doc_ref)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a navigation JSON string.
pub(crate) fn parse_nav(content: &str) -> Result<NavDocument> {
    let raw: Value = serde_json::from_str(content)
        .map_err(|e| DocsyncError::parse(format!("invalid navigation JSON: {e}")))?;
    Ok(nav_from_value(&raw))
}

/// Build a [`NavDocument`] from an already-parsed JSON value.
pub fn nav_from_value(raw: &Value) -> NavDocument {
    let mut refs = BTreeSet::new();
    collect_page_refs(raw, &mut refs);

    let redirect_sources = raw
        .get("redirects")
        .and_then(Value::as_array)
        .map(|redirects| {
            redirects
                .iter()
                .filter_map(|r| r.get("source").and_then(Value::as_str))
                .map(normalize_route)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let has_navigation = raw.get("navigation").is_some() || raw.get("tabs").is_some();

    NavDocument {
        refs,
        redirect_sources,
        has_navigation,
    }
}

/// Recursively collect page refs from the navigation structure.
fn collect_page_refs(value: &Value, refs: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if s.starts_with("http") || s.starts_with('#') {
                return;
            }
            let page = s.trim_start_matches('/');
            if !page.is_empty() {
                refs.insert(page.to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_page_refs(item, refs);
            }
        }
        Value::Object(map) => {
            for key in NAV_KEYS {
                if let Some(child) = map.get(key) {
                    collect_page_refs(child, refs);
                }
            }
        }
        _ => {}
    }
}
