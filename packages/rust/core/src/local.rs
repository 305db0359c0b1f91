//! Build [`LocalDoc`]s from on-disk pages for one partition.

use std::path::{Component, Path};

use tracing::{debug, instrument, warn};

use docsync_discovery::{TENANT_PARTITION_PREFIX, resolve_ref_path};
use docsync_markdown::{fallback_title_from_ref, normalize_doc, sha256_hex};
use docsync_shared::{DocsyncError, LocalDoc, Metadata, Result, SiteConfig};

use crate::taxonomy::Taxonomy;

/// Top-level directories whose pages are never synced.
const NON_SYNC_DIRS: [&str; 2] = ["snippets", "specs"];

/// Per-run inputs shared by every document in a partition.
#[derive(Debug, Clone)]
pub struct LocalDocContext<'a> {
    pub root: &'a Path,
    pub partition: &'a str,
    pub shared_partition: &'a str,
    pub site: &'a SiteConfig,
    /// Stamped into metadata when non-empty.
    pub commit_sha: Option<&'a str>,
}

impl LocalDocContext<'_> {
    fn visibility(&self) -> &'static str {
        if self.partition == self.shared_partition {
            "shared"
        } else {
            "tenant"
        }
    }

    fn tenant_id(&self) -> &str {
        self.partition
            .strip_prefix(TENANT_PARTITION_PREFIX)
            .unwrap_or(self.partition)
    }
}

/// `repo:{repo}|partition:{partition}|ref:{ref}`
pub fn external_id_for(repo: &str, partition: &str, doc_ref: &str) -> String {
    format!("repo:{repo}|partition:{partition}|ref:{doc_ref}")
}

/// Normalize each ref's page into a [`LocalDoc`].
///
/// Refs without a file are skipped with a warning; pages under `snippets/`
/// or `specs/` are skipped silently.
#[instrument(skip_all, fields(partition = %ctx.partition, refs = refs.len()))]
pub fn build_local_docs(refs: &[String], ctx: &LocalDocContext<'_>) -> Result<Vec<LocalDoc>> {
    let mut docs = Vec::with_capacity(refs.len());

    for doc_ref in refs {
        let Some(path) = resolve_ref_path(ctx.root, doc_ref) else {
            warn!(doc_ref = %doc_ref, "missing file for docs ref, skipping");
            continue;
        };
        if is_non_sync_path(ctx.root, &path) {
            debug!(doc_ref = %doc_ref, "skipping non-page ref");
            continue;
        }

        let bytes = std::fs::read(&path).map_err(|e| DocsyncError::io(&path, e))?;
        let raw = String::from_utf8_lossy(&bytes);
        let fallback_title = fallback_title_from_ref(doc_ref);
        let normalized = normalize_doc(&raw, &fallback_title);
        let content_hash = sha256_hex(&normalized.content);

        let url_path = format!("/{}", doc_ref.trim_start_matches('/'));
        let url_full = format!("{}{url_path}", ctx.site.base_url.trim_end_matches('/'));

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), ctx.site.source.as_str().into());
        metadata.insert("repo".into(), ctx.site.repo_name.as_str().into());
        metadata.insert("docs_ref".into(), doc_ref.as_str().into());
        metadata.insert("url_path".into(), url_path.into());
        metadata.insert("url_full".into(), url_full.into());
        metadata.insert("title".into(), normalized.title.as_str().into());
        metadata.insert("description".into(), normalized.description.as_str().into());
        metadata.insert("content_hash".into(), content_hash.as_str().into());
        metadata.insert("visibility".into(), ctx.visibility().into());
        metadata.insert("tenant_id".into(), ctx.tenant_id().into());
        Taxonomy::derive(
            doc_ref,
            &normalized.title,
            &normalized.description,
            &normalized.tags,
        )
        .apply_to(&mut metadata);
        if let Some(sha) = ctx.commit_sha.map(str::trim).filter(|s| !s.is_empty()) {
            metadata.insert("commit_sha".into(), sha.into());
        }

        docs.push(LocalDoc {
            doc_ref: doc_ref.clone(),
            path,
            name: doc_ref.clone(),
            external_id: external_id_for(&ctx.site.repo_name, ctx.partition, doc_ref),
            content: normalized.content,
            content_hash,
            metadata,
        });
    }

    Ok(docs)
}

fn is_non_sync_path(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    match rel.components().next() {
        Some(Component::Normal(first)) => NON_SYNC_DIRS.iter().any(|d| first == *d),
        _ => false,
    }
}
