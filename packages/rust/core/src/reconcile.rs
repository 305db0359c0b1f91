//! Diff local docs against the remote partition into a [`SyncPlan`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use docsync_shared::{LocalDoc, Metadata, MetadataValue, RemoteDoc};

/// Metadata keys owned by this tool. Keys outside this list are never touched.
pub const MANAGED_METADATA_KEYS: [&str; 20] = [
    "source",
    "repo",
    "docs_ref",
    "url_path",
    "url_full",
    "title",
    "description",
    "content_hash",
    "commit_sha",
    "visibility",
    "tenant_id",
    "taxonomy_version",
    "doc_domain",
    "doc_subdomain",
    "content_type",
    "primary_surface",
    "surfaces",
    "topic_tags",
    "frontmatter_tags",
    "taxonomy_source",
];

/// How many entries per action kind a dry run prints.
const DRY_RUN_PREVIEW: usize = 20;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// Which remote docs belong to this tool, and how much of the partition is in play.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileScope<'a> {
    pub source: &'a str,
    pub repo: &'a str,
    /// Restricted to explicit doc refs: stale deletion is disabled.
    pub partial: bool,
}

#[derive(Debug, Clone)]
pub struct RawUpdate<'a> {
    pub local: &'a LocalDoc,
    pub remote: RemoteDoc,
}

#[derive(Debug, Clone)]
pub struct MetadataPatch<'a> {
    pub local: &'a LocalDoc,
    pub remote: RemoteDoc,
    /// Keys to set; `Null` unsets.
    pub patch: Metadata,
}

/// Actions needed to make the partition match the local docs.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan<'a> {
    pub create: Vec<&'a LocalDoc>,
    pub update_raw: Vec<RawUpdate<'a>>,
    pub patch_metadata: Vec<MetadataPatch<'a>>,
    pub delete_stale: Vec<RemoteDoc>,
    pub delete_duplicates: Vec<RemoteDoc>,
    pub delete_stale_no_external: Vec<RemoteDoc>,
    /// Managed docs with no external id and no safe delete signal.
    pub kept_no_external: usize,
}

impl SyncPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_raw.is_empty()
            && self.patch_metadata.is_empty()
            && self.deletes() == 0
    }

    pub fn deletes(&self) -> usize {
        self.delete_stale.len() + self.delete_duplicates.len() + self.delete_stale_no_external.len()
    }

    pub fn log_summary(&self) {
        info!(
            create = self.create.len(),
            update_raw = self.update_raw.len(),
            patch_metadata = self.patch_metadata.len(),
            delete_stale = self.delete_stale.len(),
            delete_duplicates = self.delete_duplicates.len(),
            delete_stale_no_external = self.delete_stale_no_external.len(),
            "sync plan"
        );
        if self.kept_no_external > 0 {
            warn!(
                count = self.kept_no_external,
                "managed docs without external_id kept (no safe delete signal)"
            );
        }
    }

    /// Log up to 20 entries per action kind without touching the remote.
    pub fn log_preview(&self) {
        for doc in self.create.iter().take(DRY_RUN_PREVIEW) {
            info!(doc_ref = %doc.doc_ref, "[dry-run] create");
        }
        for u in self.update_raw.iter().take(DRY_RUN_PREVIEW) {
            info!(doc_ref = %u.local.doc_ref, doc_id = %u.remote.id, "[dry-run] update raw");
        }
        for p in self.patch_metadata.iter().take(DRY_RUN_PREVIEW) {
            let keys: Vec<&str> = p.patch.keys().map(String::as_str).collect();
            info!(
                doc_ref = %p.local.doc_ref,
                doc_id = %p.remote.id,
                keys = %keys.join(","),
                "[dry-run] patch metadata"
            );
        }
        for doc in self.delete_stale.iter().take(DRY_RUN_PREVIEW) {
            info!(external_id = doc.external_id().unwrap_or(""), doc_id = %doc.id, "[dry-run] delete stale");
        }
        for doc in self.delete_duplicates.iter().take(DRY_RUN_PREVIEW) {
            info!(external_id = doc.external_id().unwrap_or(""), doc_id = %doc.id, "[dry-run] delete duplicate");
        }
        for doc in self.delete_stale_no_external.iter().take(DRY_RUN_PREVIEW) {
            info!(
                docs_ref = doc.metadata_str("docs_ref").unwrap_or(""),
                doc_id = %doc.id,
                "[dry-run] delete stale without external_id"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Diff helpers
// ---------------------------------------------------------------------------

/// Whether `doc` was written by this tool for this repo.
pub fn is_managed(doc: &RemoteDoc, source: &str, repo: &str) -> bool {
    doc.metadata_str("source") == Some(source) && doc.metadata_str("repo") == Some(repo)
}

/// Tri-state patch over [`MANAGED_METADATA_KEYS`]: set keys whose desired
/// value differs, null keys the remote has but the desired metadata lacks.
pub fn compare_metadata_patch(remote: &Metadata, desired: &Metadata) -> Metadata {
    let mut patch = Metadata::new();
    for key in MANAGED_METADATA_KEYS {
        match (remote.get(key), desired.get(key)) {
            (current, Some(want)) if current != Some(want) => {
                patch.insert(key.to_string(), want.clone());
            }
            (Some(_), None) => {
                patch.insert(key.to_string(), MetadataValue::Null);
            }
            _ => {}
        }
    }
    patch
}

/// Most recently updated doc first; the rest are duplicates.
///
/// Order is parsed `updated_at`, then the raw `updated_at` string. Full ties
/// keep listing order; ids are not compared.
pub fn pick_latest(mut docs: Vec<RemoteDoc>) -> Option<(RemoteDoc, Vec<RemoteDoc>)> {
    docs.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
    let mut iter = docs.into_iter();
    let keep = iter.next()?;
    Some((keep, iter.collect()))
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Build the reconciliation plan for one partition.
pub fn plan_sync<'a>(
    local_docs: &'a [LocalDoc],
    remote_docs: Vec<RemoteDoc>,
    scope: ReconcileScope<'_>,
) -> SyncPlan<'a> {
    let local_by_external: BTreeMap<&str, &LocalDoc> = local_docs
        .iter()
        .map(|d| (d.external_id.as_str(), d))
        .collect();
    let local_refs: BTreeSet<&str> = local_docs.iter().map(|d| d.doc_ref.as_str()).collect();

    let mut grouped: BTreeMap<String, Vec<RemoteDoc>> = BTreeMap::new();
    let mut without_external: Vec<RemoteDoc> = Vec::new();
    for doc in remote_docs
        .into_iter()
        .filter(|d| is_managed(d, scope.source, scope.repo))
    {
        match doc.external_id().map(str::to_string) {
            Some(ext) => grouped.entry(ext).or_default().push(doc),
            None => without_external.push(doc),
        }
    }

    let mut plan = SyncPlan::default();
    let mut remote_by_external: BTreeMap<String, RemoteDoc> = BTreeMap::new();
    for (external_id, docs) in grouped {
        if let Some((keep, dups)) = pick_latest(docs) {
            if !dups.is_empty() {
                debug!(%external_id, count = dups.len(), "duplicate remote docs");
            }
            plan.delete_duplicates.extend(dups);
            remote_by_external.insert(external_id, keep);
        }
    }

    for (&external_id, &local) in &local_by_external {
        let Some(remote) = remote_by_external.get(external_id) else {
            plan.create.push(local);
            continue;
        };

        if remote.metadata_str("content_hash") != Some(local.content_hash.as_str()) {
            plan.update_raw.push(RawUpdate {
                local,
                remote: remote.clone(),
            });
        }

        let patch = compare_metadata_patch(&remote.metadata, &local.metadata);
        if !patch.is_empty() {
            plan.patch_metadata.push(MetadataPatch {
                local,
                remote: remote.clone(),
                patch,
            });
        }
    }

    if scope.partial {
        plan.delete_duplicates.retain(|d| {
            d.external_id()
                .is_some_and(|ext| local_by_external.contains_key(ext))
        });
        return plan;
    }

    // BTreeMap iteration keeps stale deletes sorted by external id.
    plan.delete_stale = remote_by_external
        .into_iter()
        .filter(|(ext, _)| !local_by_external.contains_key(ext.as_str()))
        .map(|(_, doc)| doc)
        .collect();

    for doc in without_external {
        let docs_ref = doc.metadata_str("docs_ref").map(str::trim).unwrap_or("");
        if !docs_ref.is_empty() && !local_refs.contains(docs_ref) {
            plan.delete_stale_no_external.push(doc);
        } else {
            plan.kept_no_external += 1;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SOURCE: &str = "docs";
    const REPO: &str = "acme-docs";

    fn scope(partial: bool) -> ReconcileScope<'static> {
        ReconcileScope {
            source: SOURCE,
            repo: REPO,
            partial,
        }
    }

    fn local(doc_ref: &str, hash: &str) -> LocalDoc {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), SOURCE.into());
        metadata.insert("repo".into(), REPO.into());
        metadata.insert("docs_ref".into(), doc_ref.into());
        metadata.insert("title".into(), "Title".into());
        metadata.insert("content_hash".into(), hash.into());
        LocalDoc {
            doc_ref: doc_ref.into(),
            path: PathBuf::from(format!("{doc_ref}.mdx")),
            name: doc_ref.into(),
            external_id: format!("ext:{doc_ref}"),
            content: String::new(),
            content_hash: hash.into(),
            metadata,
        }
    }

    fn remote_for(local: &LocalDoc, id: &str, updated_at: &str) -> RemoteDoc {
        RemoteDoc {
            id: id.into(),
            external_id: Some(local.external_id.clone()),
            metadata: local.metadata.clone(),
            updated_at: Some(updated_at.into()),
            ..RemoteDoc::default()
        }
    }

    fn ids(docs: &[RemoteDoc]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn metadata_patch_is_tri_state() {
        let mut remote = Metadata::new();
        remote.insert("title".into(), "Old".into());
        remote.insert("commit_sha".into(), "abc".into());
        remote.insert("repo".into(), REPO.into());
        remote.insert("custom".into(), "untouched".into());

        let mut desired = Metadata::new();
        desired.insert("title".into(), "New".into());
        desired.insert("repo".into(), REPO.into());
        desired.insert("docs_ref".into(), "a".into());

        let patch = compare_metadata_patch(&remote, &desired);
        let keys: Vec<&str> = patch.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["commit_sha", "docs_ref", "title"]);
        assert_eq!(patch["commit_sha"], MetadataValue::Null);
        assert_eq!(patch["title"].as_str(), Some("New"));
    }

    #[test]
    fn latest_update_wins() {
        let doc = |id: &str, at: Option<&str>| RemoteDoc {
            id: id.into(),
            updated_at: at.map(String::from),
            ..RemoteDoc::default()
        };
        let (keep, dups) = pick_latest(vec![
            doc("old", Some("2024-01-01T00:00:00Z")),
            doc("none", None),
            doc("new", Some("2024-01-01T05:00:00+02:00")),
        ])
        .unwrap();
        assert_eq!(keep.id, "new");
        assert_eq!(ids(&dups), vec!["old", "none"]);
        assert!(pick_latest(Vec::new()).is_none());
    }

    #[test]
    fn equal_timestamps_keep_listing_order() {
        let doc = |id: &str| RemoteDoc {
            id: id.into(),
            updated_at: Some("2024-03-01T00:00:00Z".into()),
            ..RemoteDoc::default()
        };
        let (keep, dups) = pick_latest(vec![doc("b"), doc("c"), doc("a")]).unwrap();
        assert_eq!(keep.id, "b");
        assert_eq!(ids(&dups), vec!["c", "a"]);
    }

    #[test]
    fn plans_creates_updates_and_patches() {
        let locals = vec![local("a", "h1"), local("b", "h2"), local("c", "h3")];

        let same = remote_for(&locals[0], "ra", "2024-01-01T00:00:00Z");
        let mut stale_hash = remote_for(&locals[1], "rb", "2024-01-01T00:00:00Z");
        stale_hash
            .metadata
            .insert("content_hash".into(), "old".into());
        stale_hash.metadata.insert("title".into(), "Stale".into());

        let plan = plan_sync(&locals, vec![same, stale_hash], scope(false));

        assert_eq!(plan.create.len(), 1);
        assert_eq!(plan.create[0].doc_ref, "c");
        assert_eq!(plan.update_raw.len(), 1);
        assert_eq!(plan.update_raw[0].remote.id, "rb");
        assert_eq!(plan.patch_metadata.len(), 1);
        let keys: Vec<&str> = plan.patch_metadata[0]
            .patch
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["content_hash", "title"]);
        assert_eq!(plan.deletes(), 0);
    }

    #[test]
    fn unmanaged_docs_are_ignored() {
        let locals = vec![local("a", "h1")];
        let mut foreign = remote_for(&locals[0], "x", "2024-01-01T00:00:00Z");
        foreign.metadata.insert("repo".into(), "other".into());

        let plan = plan_sync(&locals, vec![foreign], scope(false));
        assert_eq!(plan.create.len(), 1);
        assert!(plan.delete_stale.is_empty());
    }

    #[test]
    fn full_sync_deletes_stale_and_duplicates() {
        let locals = vec![local("a", "h1")];
        let keep = remote_for(&locals[0], "keep", "2024-02-01T00:00:00Z");
        let dup = remote_for(&locals[0], "dup", "2024-01-01T00:00:00Z");
        let gone_local = local("zz-gone", "h");
        let stale = remote_for(&gone_local, "stale", "2024-01-01T00:00:00Z");
        let gone_local_b = local("gone-b", "h");
        let stale_b = remote_for(&gone_local_b, "stale-b", "2024-01-01T00:00:00Z");

        let mut orphan = remote_for(&gone_local, "orphan", "2024-01-01T00:00:00Z");
        orphan.external_id = Some("  ".into());
        let mut unknown = orphan.clone();
        unknown.id = "unknown".into();
        unknown.metadata.remove("docs_ref");
        let mut still_local = remote_for(&locals[0], "still-local", "2024-01-01T00:00:00Z");
        still_local.external_id = None;

        let plan = plan_sync(
            &locals,
            vec![keep, dup, stale, stale_b, orphan, unknown, still_local],
            scope(false),
        );
        assert_eq!(ids(&plan.delete_duplicates), vec!["dup"]);
        assert_eq!(ids(&plan.delete_stale), vec!["stale-b", "stale"]);
        assert_eq!(ids(&plan.delete_stale_no_external), vec!["orphan"]);
        assert_eq!(plan.kept_no_external, 2);
        assert!(plan.create.is_empty());
        assert!(plan.update_raw.is_empty());
    }

    #[test]
    fn partial_sync_never_deletes_stale() {
        let locals = vec![local("a", "h1")];
        let keep = remote_for(&locals[0], "keep", "2024-02-01T00:00:00Z");
        let dup = remote_for(&locals[0], "dup", "2024-01-01T00:00:00Z");
        let other = local("b", "h2");
        let other_keep = remote_for(&other, "other-keep", "2024-02-01T00:00:00Z");
        let other_dup = remote_for(&other, "other-dup", "2024-01-01T00:00:00Z");

        let plan = plan_sync(
            &locals,
            vec![keep, dup, other_keep, other_dup],
            scope(true),
        );
        assert_eq!(ids(&plan.delete_duplicates), vec!["dup"]);
        assert!(plan.delete_stale.is_empty());
        assert!(plan.delete_stale_no_external.is_empty());
        assert!(!plan.is_empty());
    }
}
