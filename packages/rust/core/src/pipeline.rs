//! End-to-end `sync` pipeline: nav → local docs → plan → remote writes → poll.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use docsync_discovery::{load_nav, sanitize_partition, scope_refs_for_partition};
use docsync_remote::{NewDocument, RemoteClient};
use docsync_shared::{AppConfig, DocsyncError, LocalDoc, Result, resolve_api_key};

use crate::local::{LocalDocContext, build_local_docs};
use crate::poll::{PollOptions, poll_until_indexed};
use crate::provision::{
    InstructionScope, InstructionSpec, default_instruction_name, default_partition_description,
    ensure_entity_instruction, ensure_partition, partition_metadata_schema,
};
use crate::reconcile::{ReconcileScope, SyncPlan, plan_sync};

// ---------------------------------------------------------------------------
// Options & result
// ---------------------------------------------------------------------------

/// Requested sync mode. Both modes run the same diff-based reconciliation;
/// the value is recorded for run logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Incremental,
    Full,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        })
    }
}

/// Configuration for one `sync` run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Docs root (contains the nav file).
    pub root: PathBuf,
    /// Partition name as given; sanitized before use.
    pub partition: String,
    /// Restrict the run to these refs (partial sync).
    pub doc_refs: Vec<String>,
    pub mode: SyncMode,
    pub dry_run: bool,
    /// Stop after building local docs.
    pub skip_remote: bool,
    pub ensure_partition: bool,
    pub partition_description: Option<String>,
    pub ensure_entity_instruction: bool,
    pub entity_instruction_name: Option<String>,
    pub entity_instruction_scope: InstructionScope,
    pub allow_indexed: bool,
    pub commit_sha: Option<String>,
}

/// Outcome of a `sync` run.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub partition: String,
    pub local_docs: usize,
    pub created: usize,
    pub updated: usize,
    pub patched: usize,
    pub deleted: usize,
    /// Ids that were created or raw-updated, sorted and unique.
    pub changed_ids: Vec<String>,
    pub instruction_created: bool,
    pub dry_run: bool,
    pub remote_skipped: bool,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each remote write.
    fn action(&self, current: usize, total: usize, detail: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &SyncResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn action(&self, _current: usize, _total: usize, _detail: &str) {}
    fn done(&self, _result: &SyncResult) {}
}

// ---------------------------------------------------------------------------
// Local phase
// ---------------------------------------------------------------------------

/// Sanitized partition plus the local docs to sync into it.
#[derive(Debug)]
pub struct LocalSet {
    pub partition: String,
    pub docs: Vec<LocalDoc>,
    pub partial: bool,
}

/// Resolve, scope, and normalize the pages for `opts.partition`.
#[instrument(skip_all, fields(partition = %opts.partition))]
pub fn prepare_local_docs(config: &AppConfig, opts: &SyncOptions) -> Result<LocalSet> {
    let partition = sanitize_partition(&opts.partition)?;

    let nav = load_nav(&opts.root.join(&config.site.nav_file))?;
    let nav_refs: Vec<String> = nav.refs.into_iter().collect();
    let mut refs = scope_refs_for_partition(&opts.root, &nav_refs, &partition)?;

    let requested: BTreeSet<&str> = opts
        .doc_refs
        .iter()
        .map(|r| r.trim().trim_start_matches('/'))
        .filter(|r| !r.is_empty())
        .collect();
    let partial = !requested.is_empty();
    if partial {
        refs.retain(|r| requested.contains(r.as_str()));
        let missing: Vec<&str> = requested
            .iter()
            .copied()
            .filter(|r| !refs.iter().any(|have| have == r))
            .collect();
        if !missing.is_empty() {
            return Err(DocsyncError::validation(format!(
                "doc_ref(s) not available for partition '{partition}': {}",
                missing.join(", ")
            )));
        }
    }

    let ctx = LocalDocContext {
        root: &opts.root,
        partition: &partition,
        shared_partition: &config.remote.shared_partition,
        site: &config.site,
        commit_sha: opts.commit_sha.as_deref(),
    };
    let docs = build_local_docs(&refs, &ctx)?;
    if docs.is_empty() {
        return Err(DocsyncError::sync("no local docs discovered to sync"));
    }
    info!(count = docs.len(), "local docs discovered");

    Ok(LocalSet {
        partition,
        docs,
        partial,
    })
}

// ---------------------------------------------------------------------------
// Sync pipeline
// ---------------------------------------------------------------------------

/// Run the full `sync` pipeline.
///
/// 1. Build local docs for the partition
/// 2. Stop here with `skip_remote`
/// 3. Resolve the API key and hand off to [`sync_with_client`]
pub async fn run_sync(
    config: &AppConfig,
    opts: &SyncOptions,
    progress: &dyn ProgressReporter,
) -> Result<SyncResult> {
    if opts.skip_remote {
        let start = Instant::now();
        progress.phase("Building local docs");
        let local = prepare_local_docs(config, opts)?;
        info!("remote skipped, ending after local discovery");
        let result = SyncResult {
            partition: local.partition,
            local_docs: local.docs.len(),
            dry_run: opts.dry_run,
            remote_skipped: true,
            elapsed: start.elapsed(),
            ..SyncResult::default()
        };
        progress.done(&result);
        return Ok(result);
    }

    let api_key = resolve_api_key(&config.remote)?;
    let client = RemoteClient::new(&config.remote, api_key)?;
    sync_with_client(&client, config, opts, progress).await
}

/// Sync against an already-built client.
///
/// 1. Build local docs
/// 2. Ensure partition / entity instruction when requested
/// 3. List remote docs and build the plan
/// 4. Dry run: log the plan and stop
/// 5. Execute creates, raw updates, metadata patches, deletes
/// 6. Poll changed docs until indexed
#[instrument(skip_all, fields(partition = %opts.partition, mode = %opts.mode))]
pub async fn sync_with_client(
    client: &RemoteClient,
    config: &AppConfig,
    opts: &SyncOptions,
    progress: &dyn ProgressReporter,
) -> Result<SyncResult> {
    let start = Instant::now();

    // --- Local docs ---
    progress.phase("Building local docs");
    let local = prepare_local_docs(config, opts)?;
    let partition = local.partition.as_str();

    // --- Provisioning ---
    if opts.ensure_partition {
        progress.phase("Ensuring partition");
        let description = opts
            .partition_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                default_partition_description(partition, &config.remote.shared_partition)
            });
        ensure_partition(
            client,
            partition,
            &description,
            &partition_metadata_schema(),
            opts.dry_run,
        )
        .await?;
    }

    let mut instruction_created = false;
    if opts.ensure_entity_instruction {
        progress.phase("Ensuring entity instruction");
        let name = opts
            .entity_instruction_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_instruction_name(partition));
        let spec = InstructionSpec {
            name: &name,
            partition,
            scope: opts.entity_instruction_scope,
            source: &config.site.source,
            repo: &config.site.repo_name,
        };
        instruction_created = ensure_entity_instruction(client, &spec, opts.dry_run).await?;
    }

    // --- Plan ---
    progress.phase("Comparing with remote");
    let remote_docs = client.list_documents(partition).await?;
    let total_remote = remote_docs.len();
    let scope = ReconcileScope {
        source: &config.site.source,
        repo: &config.site.repo_name,
        partial: local.partial,
    };
    let plan = plan_sync(&local.docs, remote_docs, scope);
    info!(total = total_remote, "remote docs listed");
    plan.log_summary();
    if local.partial {
        info!("partial sync via doc refs, stale deletion disabled");
    }

    let mut result = SyncResult {
        partition: partition.to_string(),
        local_docs: local.docs.len(),
        instruction_created,
        dry_run: opts.dry_run,
        ..SyncResult::default()
    };

    if opts.dry_run {
        plan.log_preview();
        info!("dry run complete");
        result.elapsed = start.elapsed();
        progress.done(&result);
        return Ok(result);
    }

    // --- Execute ---
    progress.phase("Applying changes");
    let changed = execute_plan(client, partition, &plan, progress).await?;
    result.created = plan.create.len();
    result.updated = plan.update_raw.len();
    result.patched = plan.patch_metadata.len();
    result.deleted = plan.deletes();
    result.changed_ids = changed;

    // --- Poll ---
    progress.phase("Waiting for indexing");
    let poll = PollOptions {
        timeout: Duration::from_secs(config.remote.poll_timeout_secs),
        interval: Duration::from_millis(config.remote.poll_interval_ms),
        allow_indexed: opts.allow_indexed,
    };
    poll_until_indexed(client, partition, &result.changed_ids, &poll).await?;

    result.elapsed = start.elapsed();
    info!(
        created = result.created,
        updated = result.updated,
        patched = result.patched,
        deleted = result.deleted,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "sync complete"
    );
    if result.instruction_created && result.changed_ids.is_empty() {
        warn!(
            "entity instruction was created but no documents changed; run a full sync to backfill entities on existing docs"
        );
    }

    progress.done(&result);
    Ok(result)
}

/// Apply `plan` in order. Returns the sorted, unique ids of created and
/// raw-updated docs.
async fn execute_plan(
    client: &RemoteClient,
    partition: &str,
    plan: &SyncPlan<'_>,
    progress: &dyn ProgressReporter,
) -> Result<Vec<String>> {
    let total = plan.create.len() + plan.update_raw.len() + plan.patch_metadata.len() + plan.deletes();
    let mut done = 0;
    let mut changed: BTreeSet<String> = BTreeSet::new();

    for local in &plan.create {
        let created = client
            .create_document_raw(&NewDocument {
                name: &local.name,
                external_id: &local.external_id,
                partition,
                metadata: &local.metadata,
                data: &local.content,
            })
            .await?;
        if created.id.is_empty() {
            return Err(DocsyncError::sync(format!(
                "create returned no document id for {}",
                local.doc_ref
            )));
        }
        info!(doc_ref = %local.doc_ref, id = %created.id, "created");
        done += 1;
        progress.action(done, total, &local.doc_ref);
        changed.insert(created.id);
    }

    for update in &plan.update_raw {
        let id = &update.remote.id;
        if id.is_empty() {
            return Err(DocsyncError::sync(format!(
                "remote document missing id for update: {}",
                update.local.doc_ref
            )));
        }
        client
            .update_document_raw(id, partition, &update.local.content)
            .await?;
        info!(doc_ref = %update.local.doc_ref, %id, "raw content updated");
        done += 1;
        progress.action(done, total, &update.local.doc_ref);
        changed.insert(id.clone());
    }

    for patch in &plan.patch_metadata {
        let id = &patch.remote.id;
        if id.is_empty() {
            return Err(DocsyncError::sync(format!(
                "remote document missing id for metadata patch: {}",
                patch.local.doc_ref
            )));
        }
        client
            .patch_document_metadata(id, partition, &patch.patch)
            .await?;
        info!(doc_ref = %patch.local.doc_ref, %id, "metadata patched");
        done += 1;
        progress.action(done, total, &patch.local.doc_ref);
    }

    let deletes = [
        ("stale", &plan.delete_stale),
        ("duplicate", &plan.delete_duplicates),
        ("stale without external_id", &plan.delete_stale_no_external),
    ];
    for (kind, docs) in deletes {
        for doc in docs {
            done += 1;
            if doc.id.is_empty() {
                continue;
            }
            client.delete_document(&doc.id, partition, true).await?;
            info!(id = %doc.id, kind, "deleted");
            progress.action(done, total, &doc.id);
        }
    }

    Ok(changed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_shared::RemoteConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write(root: &std::path::Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn docs_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "docs.json",
            r#"{"navigation": {"tabs": [{"tab": "Guides", "pages": ["intro", "guides/setup", "tenants/acme/secret"]}]}}"#,
        );
        write(root, "intro.mdx", "---\ntitle: Intro\ndescription: Start here\n---\nWelcome.\n");
        write(root, "guides/setup.mdx", "---\ntitle: Setup\n---\nInstall it.\n");
        write(root, "tenants/acme/secret.mdx", "Tenant only.\n");
        dir
    }

    fn config_for(server: &MockServer) -> AppConfig {
        let mut config = AppConfig::default();
        config.remote = RemoteConfig {
            base_url: server.uri(),
            max_retries: 0,
            poll_interval_ms: 5,
            poll_timeout_secs: 5,
            ..RemoteConfig::default()
        };
        config
    }

    fn opts(root: &std::path::Path) -> SyncOptions {
        SyncOptions {
            root: root.to_path_buf(),
            partition: " Shared_Docs ".into(),
            ..SyncOptions::default()
        }
    }

    #[test]
    fn local_phase_scopes_and_filters_refs() {
        let dir = docs_tree();
        let config = AppConfig::default();

        let local = prepare_local_docs(&config, &opts(dir.path())).unwrap();
        assert_eq!(local.partition, "shared_docs");
        let refs: Vec<&str> = local.docs.iter().map(|d| d.doc_ref.as_str()).collect();
        assert_eq!(refs, vec!["guides/setup", "intro"]);
        assert!(!local.partial);

        let partial = SyncOptions {
            doc_refs: vec!["/intro".into()],
            ..opts(dir.path())
        };
        let local = prepare_local_docs(&config, &partial).unwrap();
        assert!(local.partial);
        assert_eq!(local.docs.len(), 1);

        let bad = SyncOptions {
            doc_refs: vec!["tenants/acme/secret".into(), "nope".into()],
            ..opts(dir.path())
        };
        let err = prepare_local_docs(&config, &bad).unwrap_err();
        assert!(
            err.to_string()
                .ends_with("not available for partition 'shared_docs': nope, tenants/acme/secret"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn skip_remote_needs_no_api_key() {
        let dir = docs_tree();
        let mut config = AppConfig::default();
        config.remote.api_key_env = "DOCSYNC_TEST_UNSET_KEY_98765".into();
        let opts = SyncOptions {
            skip_remote: true,
            ..opts(dir.path())
        };
        let result = run_sync(&config, &opts, &SilentProgress).await.unwrap();
        assert!(result.remote_skipped);
        assert_eq!(result.local_docs, 2);
    }

    #[tokio::test]
    async fn dry_run_lists_but_never_writes() {
        let dir = docs_tree();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"documents": []})))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let opts = SyncOptions {
            dry_run: true,
            ..opts(dir.path())
        };
        let client = RemoteClient::new(&config.remote, "k").unwrap();
        let result = sync_with_client(&client, &config, &opts, &SilentProgress)
            .await
            .unwrap();
        assert!(result.dry_run);
        assert_eq!(result.created, 0);
        // Only the listing was received.
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn executes_plan_and_polls() {
        let dir = docs_tree();
        let server = MockServer::start().await;
        let config = config_for(&server);

        // "intro" exists with a stale hash; "guides/setup" is new; one stale doc.
        let local = prepare_local_docs(&config, &opts(dir.path())).unwrap();
        let intro = local.docs.iter().find(|d| d.doc_ref == "intro").unwrap();
        let mut intro_meta = serde_json::to_value(&intro.metadata).unwrap();
        intro_meta["content_hash"] = json!("old");

        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [
                    {"id": "r-intro", "external_id": intro.external_id, "metadata": intro_meta},
                    {"id": "r-stale", "external_id": "repo:sourcemedium-docs|partition:shared_docs|ref:gone",
                     "metadata": {"source": "sourcemedium-docs", "repo": "sourcemedium-docs"}},
                    {"id": "r-foreign", "external_id": "x", "metadata": {"source": "elsewhere"}}
                ],
                "pagination": {"next_cursor": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/documents/raw"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "r-setup"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/documents/r-intro/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/documents/r-intro/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/documents/r-stale"))
            .and(query_param("async", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        for id in ["r-setup", "r-intro"] {
            Mock::given(method("GET"))
                .and(path(format!("/documents/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id, "status": "ready"})))
                .mount(&server)
                .await;
        }

        let client = RemoteClient::new(&config.remote, "k").unwrap();
        let result = sync_with_client(&client, &config, &opts(dir.path()), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.patched, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.changed_ids, vec!["r-intro", "r-setup"]);
    }

    #[tokio::test]
    async fn create_without_id_aborts() {
        let dir = docs_tree();
        let server = MockServer::start().await;
        let config = config_for(&server);

        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"documents": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/documents/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new(&config.remote, "k").unwrap();
        let err = sync_with_client(&client, &config, &opts(dir.path()), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "sync error: create returned no document id for guides/setup"
        );
    }
}
