//! Wait for changed documents to finish indexing.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument};

use docsync_remote::RemoteClient;
use docsync_shared::{DocsyncError, Result};

const READY_STATUS: &str = "ready";
const INDEXED_STATUSES: [&str; 3] = ["indexed", "summary_indexed", "keyword_indexed"];
const FAILED_STATUS: &str = "failed";

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// Also accept partially indexed statuses as done.
    pub allow_indexed: bool,
}

impl PollOptions {
    fn is_success(&self, status: &str) -> bool {
        status == READY_STATUS || (self.allow_indexed && INDEXED_STATUSES.contains(&status))
    }
}

/// Poll each id until it reaches a success or failure status.
///
/// Errors when the deadline passes with ids still pending, or when any
/// document failed indexing.
#[instrument(skip_all, fields(partition = %partition, docs = ids.len()))]
pub async fn poll_until_indexed(
    client: &RemoteClient,
    partition: &str,
    ids: &[String],
    opts: &PollOptions,
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut pending: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    let mut failures: Vec<(String, Vec<String>)> = Vec::new();
    let deadline = Instant::now() + opts.timeout;

    while !pending.is_empty() && Instant::now() < deadline {
        let round: Vec<&str> = pending.iter().copied().collect();
        for id in round {
            let doc = client.get_document(id, partition).await?;
            let status = doc
                .status
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_lowercase();
            debug!(id, status = %status, "document status");
            if opts.is_success(&status) {
                pending.remove(id);
            } else if status == FAILED_STATUS {
                pending.remove(id);
                failures.push((id.to_string(), doc.errors));
            }
        }
        if !pending.is_empty() {
            tokio::time::sleep(opts.interval).await;
        }
    }

    if !pending.is_empty() {
        let waiting: Vec<&str> = pending.into_iter().collect();
        return Err(DocsyncError::sync(format!(
            "timed out waiting for documents to finish indexing in partition '{partition}': {}",
            waiting.join(", ")
        )));
    }

    if !failures.is_empty() {
        let details: Vec<String> = failures
            .iter()
            .map(|(id, errors)| {
                let errors = if errors.is_empty() {
                    "unknown error".to_string()
                } else {
                    errors.join(", ")
                };
                format!("{id}: {errors}")
            })
            .collect();
        return Err(DocsyncError::sync(format!(
            "one or more documents failed indexing: {}",
            details.join("; ")
        )));
    }

    info!("all changed documents indexed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_shared::RemoteConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RemoteClient {
        let config = RemoteConfig {
            base_url: server.uri(),
            max_retries: 0,
            ..RemoteConfig::default()
        };
        RemoteClient::new(&config, "k").unwrap()
    }

    fn opts(allow_indexed: bool) -> PollOptions {
        PollOptions {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(5),
            allow_indexed,
        }
    }

    async fn status(server: &MockServer, id: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/documents/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn waits_until_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "d1", "status": "pending"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        status(&server, "d1", json!({"id": "d1", "status": " READY "})).await;

        poll_until_indexed(&client_for(&server), "p", &["d1".into()], &opts(false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn indexed_counts_only_when_allowed() {
        let server = MockServer::start().await;
        status(&server, "d1", json!({"id": "d1", "status": "summary_indexed"})).await;

        poll_until_indexed(&client_for(&server), "p", &["d1".into()], &opts(true))
            .await
            .unwrap();

        let short = PollOptions {
            timeout: Duration::from_millis(30),
            ..opts(false)
        };
        let err = poll_until_indexed(&client_for(&server), "p", &["d1".into()], &short)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(err.to_string().ends_with("in partition 'p': d1"), "{err}");
    }

    #[tokio::test]
    async fn failures_are_collected() {
        let server = MockServer::start().await;
        status(&server, "d1", json!({"id": "d1", "status": "failed", "errors": ["bad pdf"]})).await;
        status(&server, "d2", json!({"id": "d2", "status": "failed"})).await;
        status(&server, "d3", json!({"id": "d3", "status": "ready"})).await;

        let ids = vec!["d1".to_string(), "d2".to_string(), "d3".to_string()];
        let err = poll_until_indexed(&client_for(&server), "p", &ids, &opts(false))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "sync error: one or more documents failed indexing: d1: bad pdf; d2: unknown error"
        );
    }
}
