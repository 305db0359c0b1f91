//! Partition and entity-instruction provisioning.
//!
//! Both operations are idempotent: they read the current remote state first
//! and only write what differs. Dry runs log the writes they would make.

use std::fmt;

use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use docsync_discovery::TENANT_PARTITION_PREFIX;
use docsync_remote::{Instruction, NewPartition, PartitionPatch, RemoteClient};
use docsync_shared::Result;

use crate::taxonomy::{CONTENT_TYPES, SURFACES};

pub const ENTITY_INSTRUCTION_PROMPT: &str = "Extract analytics support entities from this \
SourceMedium documentation page. Return a JSON object with: surfaces (subset of allowed \
surfaces), keywords (short lowercase topic tags), table_names (BigQuery tables like \
obt_orders), column_names (notable field names), dashboard_modules (dashboard/module names), \
integration_platforms (platform/vendor names). Use empty arrays when unavailable.";

// ---------------------------------------------------------------------------
// Schemas and defaults
// ---------------------------------------------------------------------------

/// JSON schema describing the metadata this tool writes to documents.
pub fn partition_metadata_schema() -> Value {
    let string = |description: &str| json!({"type": "string", "description": description});
    let string_array = |description: &str| {
        json!({
            "type": "array",
            "description": description,
            "items": {"type": "string"},
            "uniqueItems": true,
        })
    };

    json!({
        "type": "object",
        "additionalProperties": true,
        "properties": {
            "source": string("Source marker for managed docs in this repository."),
            "repo": string("Repository identifier for managed docs."),
            "docs_ref": string("Canonical docs route/path without extension."),
            "title": string("Document title from frontmatter."),
            "description": string("Short document summary from frontmatter."),
            "visibility": {
                "type": "string",
                "description": "Whether the doc is in a shared or tenant partition.",
                "enum": ["shared", "tenant"],
            },
            "tenant_id": string("Tenant identifier for tenant partitions."),
            "content_type": {
                "type": "string",
                "description": "High-level document class derived from docs path.",
                "enum": CONTENT_TYPES,
            },
            "primary_surface": {
                "type": "string",
                "description": "Primary analytics surface for the doc.",
                "enum": SURFACES,
            },
            "surfaces": {
                "type": "array",
                "description": "All relevant analytics surfaces for the doc.",
                "items": {"type": "string", "enum": SURFACES},
                "uniqueItems": true,
            },
            "topic_tags": string_array("Normalized topic tags used for retrieval filtering."),
            "frontmatter_tags": string_array("Optional frontmatter tags from markdown."),
        },
    })
}

/// JSON schema for entities extracted by the instruction.
pub fn entity_schema() -> Value {
    let string_set = json!({"type": "array", "items": {"type": "string"}, "uniqueItems": true});
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "surfaces": {
                "type": "array",
                "items": {"type": "string", "enum": SURFACES},
                "uniqueItems": true,
            },
            "keywords": string_set,
            "table_names": string_set,
            "column_names": string_set,
            "dashboard_modules": string_set,
            "integration_platforms": string_set,
        },
        "required": [
            "surfaces",
            "keywords",
            "table_names",
            "column_names",
            "dashboard_modules",
            "integration_platforms",
        ],
    })
}

pub fn default_partition_description(partition: &str, shared_partition: &str) -> String {
    if partition == shared_partition {
        return "SourceMedium public documentation covering onboarding, integrations, data \
transformations, managed BI/Looker Studio dashboards, BigQuery table references, SQL query \
snippets, and help-center FAQs."
            .to_string();
    }
    let tenant_id = partition
        .strip_prefix(TENANT_PARTITION_PREFIX)
        .unwrap_or(partition);
    format!(
        "SourceMedium tenant documentation partition for '{tenant_id}'. Contains tenant-scoped \
docs and the same core product documentation categories used for support retrieval."
    )
}

pub fn default_instruction_name(partition: &str) -> String {
    format!("docsync-doc-entities-v1-{partition}")
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Make `partition` exist with context-aware retrieval, `description`, and
/// `metadata_schema`.
///
/// The service rejects `context_aware` alongside other fields, so it is
/// applied in its own PATCH after description/schema.
#[instrument(skip_all, fields(partition = %partition))]
pub async fn ensure_partition(
    client: &RemoteClient,
    partition: &str,
    description: &str,
    metadata_schema: &Value,
    dry_run: bool,
) -> Result<()> {
    let exists = client
        .list_partitions()
        .await?
        .iter()
        .any(|p| p.name == partition);

    if !exists {
        if dry_run {
            info!("[dry-run] create partition");
            info!(keys = "context_aware,description,metadata_schema", "[dry-run] patch partition");
            return Ok(());
        }
        client
            .create_partition(&NewPartition {
                name: partition,
                description: Some(description).filter(|d| !d.is_empty()),
                metadata_schema: Some(metadata_schema),
            })
            .await?;
        info!("partition created");
    }

    let current = client.get_partition(partition).await?;
    let mut patch = PartitionPatch::default();
    if current.context_aware != Some(true) {
        patch.context_aware = Some(true);
    }
    if !description.is_empty() && current.description.as_deref().unwrap_or("") != description {
        patch.description = Some(description.to_string());
    }
    if current.metadata_schema.as_ref() != Some(metadata_schema) {
        patch.metadata_schema = Some(metadata_schema.clone());
    }

    if patch.is_empty() {
        info!("partition already configured for context-aware retrieval");
        return Ok(());
    }
    if dry_run {
        info!(keys = %patch.keys().join(","), "[dry-run] patch partition");
        return Ok(());
    }

    let fields = PartitionPatch {
        context_aware: None,
        ..patch.clone()
    };
    if !fields.is_empty() {
        client.update_partition(partition, &fields).await?;
        info!(keys = %fields.keys().join(","), "partition patched");
    }
    if patch.context_aware.is_some() {
        let context = PartitionPatch {
            context_aware: Some(true),
            ..PartitionPatch::default()
        };
        client.update_partition(partition, &context).await?;
        info!(keys = "context_aware", "partition patched");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entity instruction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstructionScope {
    #[default]
    Document,
    Chunk,
}

impl InstructionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Chunk => "chunk",
        }
    }
}

impl fmt::Display for InstructionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired entity-extraction instruction for a partition.
#[derive(Debug, Clone)]
pub struct InstructionSpec<'a> {
    pub name: &'a str,
    pub partition: &'a str,
    pub scope: InstructionScope,
    pub source: &'a str,
    pub repo: &'a str,
}

impl InstructionSpec<'_> {
    pub fn to_instruction(&self) -> Instruction {
        Instruction {
            id: String::new(),
            name: self.name.to_string(),
            active: true,
            scope: self.scope.as_str().to_string(),
            prompt: ENTITY_INSTRUCTION_PROMPT.to_string(),
            entity_schema: entity_schema(),
            filter: json!({
                "source": {"$eq": self.source},
                "repo": {"$eq": self.repo},
            }),
            partition: Some(self.partition.to_string()),
        }
    }
}

/// Fields of `current` that differ from `expected` and cannot be updated in place.
pub fn instruction_drift(current: &Instruction, expected: &Instruction) -> Vec<&'static str> {
    let mut drift = Vec::new();
    if current.entity_schema != expected.entity_schema {
        drift.push("entity_schema");
    }
    if current.filter != expected.filter {
        drift.push("filter");
    }
    if current.partition.as_deref().unwrap_or("") != expected.partition.as_deref().unwrap_or("") {
        drift.push("partition");
    }
    if current.prompt != expected.prompt {
        drift.push("prompt");
    }
    if current.scope != expected.scope {
        drift.push("scope");
    }
    drift
}

/// Create or activate the instruction. Returns `true` when it was created.
///
/// Existing instructions only support toggling `active`, so any other
/// drift is reported as a warning.
#[instrument(skip_all, fields(name = %spec.name, partition = %spec.partition))]
pub async fn ensure_entity_instruction(
    client: &RemoteClient,
    spec: &InstructionSpec<'_>,
    dry_run: bool,
) -> Result<bool> {
    let expected = spec.to_instruction();
    let matches: Vec<Instruction> = client
        .list_instructions()
        .await?
        .into_iter()
        .filter(|i| i.name == spec.name)
        .collect();

    let Some(current) = matches.first() else {
        if dry_run {
            info!("[dry-run] create instruction");
            return Ok(false);
        }
        let created = client.create_instruction(&expected).await?;
        info!(id = %created.id, "instruction created");
        return Ok(true);
    };
    if matches.len() > 1 {
        warn!(count = matches.len(), "multiple instructions share this name, using the first listed");
    }

    if !current.active {
        if dry_run {
            info!(id = %current.id, "[dry-run] activate instruction");
        } else if !current.id.is_empty() {
            client.set_instruction_active(&current.id, true).await?;
            info!(id = %current.id, "instruction activated");
        }
    }

    let drift = instruction_drift(current, &expected);
    if drift.is_empty() {
        info!("instruction already configured");
    } else {
        warn!(
            fields = %drift.join(","),
            "instruction config drift detected; only the active flag can be updated, delete and recreate the instruction to apply changes"
        );
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_shared::RemoteConfig;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RemoteClient {
        let config = RemoteConfig {
            base_url: server.uri(),
            max_retries: 0,
            ..RemoteConfig::default()
        };
        RemoteClient::new(&config, "k").unwrap()
    }

    fn spec() -> InstructionSpec<'static> {
        InstructionSpec {
            name: "docsync-doc-entities-v1-shared_docs",
            partition: "shared_docs",
            scope: InstructionScope::Document,
            source: "sourcemedium-docs",
            repo: "sourcemedium-docs",
        }
    }

    #[test]
    fn default_descriptions() {
        assert!(default_partition_description("shared_docs", "shared_docs").starts_with("SourceMedium public"));
        assert!(default_partition_description("tenant_acme", "shared_docs").contains("'acme'"));
        assert_eq!(
            default_instruction_name("tenant_acme"),
            "docsync-doc-entities-v1-tenant_acme"
        );
    }

    #[test]
    fn schemas_carry_enums() {
        let schema = partition_metadata_schema();
        assert_eq!(schema["properties"]["content_type"]["enum"].as_array().unwrap().len(), 13);
        assert_eq!(schema["properties"]["surfaces"]["items"]["enum"][0], "query_snippets");
        let entities = entity_schema();
        assert_eq!(entities["required"].as_array().unwrap().len(), 6);
        assert_eq!(entities["additionalProperties"], false);
    }

    #[test]
    fn drift_lists_sorted_fields() {
        let expected = spec().to_instruction();
        let mut current = expected.clone();
        assert!(instruction_drift(&current, &expected).is_empty());
        current.scope = "chunk".into();
        current.partition = None;
        assert_eq!(instruction_drift(&current, &expected), vec!["partition", "scope"]);
    }

    #[tokio::test]
    async fn existing_partition_gets_two_patches() {
        let server = MockServer::start().await;
        let schema = partition_metadata_schema();

        Mock::given(method("GET"))
            .and(path("/partitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "partitions": [{"name": "shared_docs"}],
                "pagination": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/partitions/shared_docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "shared_docs",
                "description": "old",
                "context_aware": false,
                "metadata_schema": schema,
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/partitions/shared_docs"))
            .and(body_json(json!({"description": "new"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "shared_docs"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/partitions/shared_docs"))
            .and(body_json(json!({"context_aware": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "shared_docs"})))
            .expect(1)
            .mount(&server)
            .await;

        ensure_partition(&client_for(&server), "shared_docs", "new", &schema, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dry_run_missing_partition_writes_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/partitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"partitions": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        ensure_partition(&client_for(&server), "tenant_acme", "d", &json!({}), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn creates_missing_instruction() {
        let server = MockServer::start().await;
        let expected = spec().to_instruction();

        Mock::given(method("GET"))
            .and(path("/instructions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "other", "name": "someone-else", "active": true}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/instructions"))
            .and(body_json(serde_json::to_value(&expected).unwrap()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "i-new", "name": expected.name})))
            .expect(1)
            .mount(&server)
            .await;

        let created = ensure_entity_instruction(&client_for(&server), &spec(), false)
            .await
            .unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn activates_inactive_instruction() {
        let server = MockServer::start().await;
        let mut existing = spec().to_instruction();
        existing.id = "i1".into();
        existing.active = false;

        Mock::given(method("GET"))
            .and(path("/instructions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/instructions/i1"))
            .and(body_json(json!({"active": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "i1", "active": true})))
            .expect(1)
            .mount(&server)
            .await;

        let created = ensure_entity_instruction(&client_for(&server), &spec(), false)
            .await
            .unwrap();
        assert!(!created);
    }
}
