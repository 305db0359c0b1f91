//! Request and response payloads for the retrieval API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docsync_shared::{Metadata, RemoteDoc};

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl Pagination {
    /// Next cursor, treating an empty string as the last page.
    pub fn next(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DocumentsPage {
    pub documents: Vec<RemoteDoc>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PartitionsPage {
    pub partitions: Vec<Partition>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// One page of entities extracted from a document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntitiesPage {
    #[serde(default)]
    pub entities: Vec<Value>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Body of `POST /documents/raw`.
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument<'a> {
    pub name: &'a str,
    pub external_id: &'a str,
    pub partition: &'a str,
    pub metadata: &'a Metadata,
    pub data: &'a str,
}

// ---------------------------------------------------------------------------
// Partitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Partition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_aware: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_schema: Option<Value>,
}

/// Body of `POST /partitions`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPartition<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_schema: Option<&'a Value>,
}

/// Body of `PATCH /partitions/{id}`; unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_aware: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_schema: Option<Value>,
}

impl PartitionPatch {
    pub fn is_empty(&self) -> bool {
        self.context_aware.is_none() && self.description.is_none() && self.metadata_schema.is_none()
    }

    /// Names of the fields this patch sets, sorted.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.context_aware.is_some() {
            keys.push("context_aware");
        }
        if self.description.is_some() {
            keys.push("description");
        }
        if self.metadata_schema.is_some() {
            keys.push("metadata_schema");
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// An entity-extraction instruction. Only `active` can be changed after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub entity_schema: Value,
    #[serde(default)]
    pub filter: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
}
