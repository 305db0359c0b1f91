//! Core domain types shared across the docsync crates.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// A single metadata value as stored by the retrieval service.
///
/// `Null` only appears in metadata patches, where it unsets a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<String>),
}

impl MetadataValue {
    /// Borrow the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Document metadata keyed by field name (ordered for stable output).
pub type Metadata = BTreeMap<String, MetadataValue>;

// ---------------------------------------------------------------------------
// LocalDoc
// ---------------------------------------------------------------------------

/// A document built from an on-disk page for the current run. Never persisted.
#[derive(Debug, Clone)]
pub struct LocalDoc {
    /// Docs ref (route path without extension), e.g. `help-center/faq/billing`.
    pub doc_ref: String,
    /// Source file on disk.
    pub path: PathBuf,
    /// Display name sent on create.
    pub name: String,
    /// Stable key matching this doc to its remote counterpart.
    pub external_id: String,
    /// Normalized retrieval text.
    pub content: String,
    /// SHA-256 hex digest of `content`.
    pub content_hash: String,
    /// Desired metadata for the remote document.
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// RemoteDoc
// ---------------------------------------------------------------------------

/// A document record as returned by the retrieval service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteDoc {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "deserialize_errors")]
    pub errors: Vec<String>,
}

impl RemoteDoc {
    /// Trimmed external id, or `None` when missing or blank.
    pub fn external_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// String metadata field, or `None`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_str)
    }

    /// Sort key for "most recent update wins" duplicate resolution.
    ///
    /// Parsed RFC 3339 timestamps compare chronologically; unparseable values
    /// fall back to raw string order; missing values sort oldest.
    pub fn recency_key(&self) -> (Option<DateTime<Utc>>, &str) {
        let raw = self.updated_at.as_deref().unwrap_or("");
        let parsed = DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        (parsed, raw)
    }
}

/// Remote metadata that is not an object (or has odd values) is treated as empty
/// rather than failing the whole listing.
fn deserialize_metadata<'de, D>(deserializer: D) -> std::result::Result<Metadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Object(map) = value else {
        return Ok(Metadata::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| serde_json::from_value::<MetadataValue>(v).ok().map(|v| (k, v)))
        .collect())
}

fn deserialize_errors<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        serde_json::Value::String(s) => vec![s],
        other => vec![other.to_string()],
    })
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// A single local validation finding, reported in aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Issue {
    /// Path relative to the docs root.
    pub path: PathBuf,
    /// 1-based line number, when the check is line-oriented.
    pub line: Option<usize>,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.to_string_lossy().replace('\\', "/");
        match self.line {
            Some(line) => write!(f, "{path}:{line}: {}", self.message),
            None => write!(f, "{path}: {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_doc_tolerates_odd_shapes() {
        let json = r#"{
            "id": "doc_1",
            "external_id": "  ",
            "metadata": {"title": "Intro", "surfaces": ["bigquery"], "nested": {"a": 1}},
            "errors": "boom"
        }"#;
        let doc: RemoteDoc = serde_json::from_str(json).expect("deserialize");
        assert_eq!(doc.id, "doc_1");
        assert_eq!(doc.external_id(), None);
        assert_eq!(doc.metadata_str("title"), Some("Intro"));
        assert_eq!(
            doc.metadata.get("surfaces"),
            Some(&MetadataValue::List(vec!["bigquery".into()]))
        );
        assert!(!doc.metadata.contains_key("nested"));
        assert_eq!(doc.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn remote_doc_null_metadata_is_empty() {
        let doc: RemoteDoc =
            serde_json::from_str(r#"{"id": "x", "metadata": null}"#).expect("deserialize");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn recency_key_orders_by_timestamp() {
        let older = RemoteDoc {
            updated_at: Some("2024-05-01T10:00:00+02:00".into()),
            ..Default::default()
        };
        let newer = RemoteDoc {
            updated_at: Some("2024-05-01T09:30:00Z".into()),
            ..Default::default()
        };
        let missing = RemoteDoc::default();
        assert!(newer.recency_key() > older.recency_key());
        assert!(older.recency_key() > missing.recency_key());
    }

    #[test]
    fn metadata_null_serializes_as_json_null() {
        let mut patch = Metadata::new();
        patch.insert("commit_sha".into(), MetadataValue::Null);
        let json = serde_json::to_string(&patch).expect("serialize");
        assert_eq!(json, r#"{"commit_sha":null}"#);
    }

    #[test]
    fn issue_display() {
        let issue = Issue::at_line("guides/intro.mdx", 12, "todo");
        assert_eq!(issue.to_string(), "guides/intro.mdx:12: todo");
        let issue = Issue::new("guides/intro.mdx", "missing icon");
        assert_eq!(issue.to_string(), "guides/intro.mdx: missing icon");
    }
}
