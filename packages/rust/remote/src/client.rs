//! HTTP client for the retrieval service.
//!
//! Every call goes through [`RemoteClient::request`], which owns auth headers,
//! the optional `partition` header, retries with exponential backoff, and
//! turning error bodies into [`DocsyncError::Api`].

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use docsync_shared::{DocsyncError, Metadata, RemoteConfig, RemoteDoc, Result};

use crate::types::{
    DocumentsPage, EntitiesPage, Instruction, NewDocument, NewPartition, Partition,
    PartitionPatch, PartitionsPage,
};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("docsync/", env!("CARGO_PKG_VERSION"));

/// Page size for cursor-paginated listings.
const PAGE_SIZE: u32 = 100;

/// Statuses worth retrying: rate limiting and transient server failures.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

type Query<'a> = [(&'a str, Option<String>)];

// ---------------------------------------------------------------------------
// RemoteClient
// ---------------------------------------------------------------------------

/// Authenticated client for the retrieval API.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl RemoteClient {
    /// Build a client from the `[remote]` config section and an API key.
    pub fn new(config: &RemoteConfig, api_key: impl Into<String>) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            DocsyncError::config(format!("invalid remote base_url '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    fn url(&self, path: &str, query: &Query<'_>) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| DocsyncError::config(format!("invalid request url for {path}: {e}")))?;
        let pairs: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Send one API request, retrying retryable failures.
    ///
    /// Query params set to `None` are dropped. An empty success body decodes
    /// as `{}`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query<'_>,
        partition: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(path, query)?;
        let mut attempt: u32 = 0;

        loop {
            debug!(%method, path, attempt, "api request");
            let mut req = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.api_key)
                .header(ACCEPT, "application/json");
            if let Some(partition) = partition {
                req = req.header("partition", partition);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.max_retries {
                        warn!(%method, path, attempt, error = %e, "request failed, retrying");
                        self.backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(DocsyncError::Network(format!("{method} {path}: {e}")));
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| DocsyncError::Network(format!("{method} {path}: body read failed: {e}")))?;

            if status.is_success() {
                if text.trim().is_empty() {
                    return Ok(json!({}));
                }
                return serde_json::from_str(&text).map_err(|e| {
                    DocsyncError::parse(format!("{method} {path}: invalid JSON response: {e}"))
                });
            }

            if is_retryable(status) && attempt < self.max_retries {
                warn!(%method, path, status = status.as_u16(), attempt, "retryable status");
                self.backoff(attempt).await;
                attempt += 1;
                continue;
            }

            return Err(DocsyncError::Api {
                status: status.as_u16(),
                method: method.to_string(),
                path: path.to_string(),
                detail: error_detail(&text),
            });
        }
    }

    async fn backoff(&self, attempt: u32) {
        let factor = 2u32.saturating_pow(attempt);
        tokio::time::sleep(self.retry_base_delay.saturating_mul(factor)).await;
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &Query<'_>,
        partition: Option<&str>,
        body: Option<&Value>,
    ) -> Result<T> {
        let value = self
            .request(method.clone(), path, query, partition, body)
            .await?;
        decode(&method, path, value)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// All documents in `partition`, following pagination cursors.
    #[instrument(skip_all, fields(partition = %partition))]
    pub async fn list_documents(&self, partition: &str) -> Result<Vec<RemoteDoc>> {
        let mut docs = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let query = [
                ("page_size", Some(PAGE_SIZE.to_string())),
                ("cursor", cursor.clone()),
            ];
            let page: DocumentsPage = self
                .request_as(Method::GET, "/documents", &query, Some(partition), None)
                .await?;
            docs.extend(page.documents);

            let next = page
                .pagination
                .as_ref()
                .and_then(|p| p.next())
                .map(str::to_string);
            if next.is_none() || next == cursor {
                break;
            }
            cursor = next;
        }
        debug!(count = docs.len(), "listed remote documents");
        Ok(docs)
    }

    pub async fn create_document_raw(&self, doc: &NewDocument<'_>) -> Result<RemoteDoc> {
        let body = to_body(doc)?;
        self.request_as(Method::POST, "/documents/raw", &[], None, Some(&body))
            .await
    }

    pub async fn update_document_raw(&self, id: &str, partition: &str, data: &str) -> Result<()> {
        let path = format!("/documents/{id}/raw");
        let body = json!({ "data": data });
        self.request(Method::PUT, &path, &[], Some(partition), Some(&body))
            .await?;
        Ok(())
    }

    /// Merge `patch` into the document's metadata; `Null` values unset keys.
    pub async fn patch_document_metadata(
        &self,
        id: &str,
        partition: &str,
        patch: &Metadata,
    ) -> Result<()> {
        let path = format!("/documents/{id}/metadata");
        let body = json!({ "metadata": patch, "async": false });
        self.request(Method::PATCH, &path, &[], Some(partition), Some(&body))
            .await?;
        Ok(())
    }

    pub async fn get_document(&self, id: &str, partition: &str) -> Result<RemoteDoc> {
        let path = format!("/documents/{id}");
        self.request_as(Method::GET, &path, &[], Some(partition), None)
            .await
    }

    pub async fn delete_document(&self, id: &str, partition: &str, asynchronous: bool) -> Result<()> {
        let path = format!("/documents/{id}");
        let query = [("async", Some(asynchronous.to_string()))];
        self.request(Method::DELETE, &path, &query, Some(partition), None)
            .await?;
        Ok(())
    }

    /// All entities extracted from one document, following pagination cursors.
    #[instrument(skip_all, fields(id = %id, partition = %partition))]
    pub async fn list_entities_by_document(&self, id: &str, partition: &str) -> Result<Vec<Value>> {
        let path = format!("/documents/{id}/entities");
        let mut entities = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let query = [
                ("page_size", Some(PAGE_SIZE.to_string())),
                ("cursor", cursor.clone()),
            ];
            let page: EntitiesPage = self
                .request_as(Method::GET, &path, &query, Some(partition), None)
                .await?;
            entities.extend(page.entities);

            let next = page
                .pagination
                .as_ref()
                .and_then(|p| p.next())
                .map(str::to_string);
            if next.is_none() || next == cursor {
                break;
            }
            cursor = next;
        }
        Ok(entities)
    }

    // -----------------------------------------------------------------------
    // Partitions
    // -----------------------------------------------------------------------

    #[instrument(skip_all)]
    pub async fn list_partitions(&self) -> Result<Vec<Partition>> {
        let mut partitions = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let query = [
                ("page_size", Some(PAGE_SIZE.to_string())),
                ("cursor", cursor.clone()),
            ];
            let page: PartitionsPage = self
                .request_as(Method::GET, "/partitions", &query, None, None)
                .await?;
            partitions.extend(page.partitions);

            let next = page
                .pagination
                .as_ref()
                .and_then(|p| p.next())
                .map(str::to_string);
            if next.is_none() || next == cursor {
                break;
            }
            cursor = next;
        }
        Ok(partitions)
    }

    pub async fn create_partition(&self, partition: &NewPartition<'_>) -> Result<Partition> {
        let body = to_body(partition)?;
        self.request_as(Method::POST, "/partitions", &[], None, Some(&body))
            .await
    }

    pub async fn get_partition(&self, name: &str) -> Result<Partition> {
        let path = format!("/partitions/{name}");
        self.request_as(Method::GET, &path, &[], None, None).await
    }

    /// Apply `patch`; an empty patch just reads the partition back.
    pub async fn update_partition(&self, name: &str, patch: &PartitionPatch) -> Result<Partition> {
        if patch.is_empty() {
            return self.get_partition(name).await;
        }
        let path = format!("/partitions/{name}");
        let body = to_body(patch)?;
        self.request_as(Method::PATCH, &path, &[], None, Some(&body))
            .await
    }

    // -----------------------------------------------------------------------
    // Instructions
    // -----------------------------------------------------------------------

    pub async fn list_instructions(&self) -> Result<Vec<Instruction>> {
        let value = self
            .request(Method::GET, "/instructions", &[], None, None)
            .await?;
        // Accept both a bare list and an `{"instructions": [...]}` envelope.
        let list = match value {
            Value::Object(mut map) => map.remove("instructions").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        decode(&Method::GET, "/instructions", list)
    }

    pub async fn create_instruction(&self, instruction: &Instruction) -> Result<Instruction> {
        let body = to_body(instruction)?;
        self.request_as(Method::POST, "/instructions", &[], None, Some(&body))
            .await
    }

    pub async fn set_instruction_active(&self, id: &str, active: bool) -> Result<Instruction> {
        let path = format!("/instructions/{id}");
        let body = json!({ "active": active });
        self.request_as(Method::PUT, &path, &[], None, Some(&body))
            .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_retryable(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// The JSON `detail` field when present and non-empty, else the raw body.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned())
        .filter(|d| match d {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => true,
        });
    match detail {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| DocsyncError::parse(format!("failed to encode request body: {e}")))
}

fn decode<T: DeserializeOwned>(method: &Method, path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| DocsyncError::parse(format!("{method} {path}: unexpected response shape: {e}")))
}
