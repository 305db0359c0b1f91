//! Partition naming rules and partition-scoped ref selection.
//!
//! Tenant partitions (`tenant_<slug>`) only ever receive docs from
//! `tenants/<slug>`; every other partition excludes `tenants/` entirely.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use docsync_shared::{DocsyncError, Result};

use crate::{PAGE_EXTENSIONS, ref_from_path};

/// Prefix marking a tenant-scoped partition.
pub const TENANT_PARTITION_PREFIX: &str = "tenant_";

/// Directory (relative to the docs root) holding tenant docs.
const TENANTS_DIR: &str = "tenants";

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("slug regex"));

/// Trim and lowercase a partition name, rejecting anything outside `[a-z0-9_-]`.
pub fn sanitize_partition(partition: &str) -> Result<String> {
    let value = partition.trim().to_lowercase();
    if !SLUG_RE.is_match(&value) {
        return Err(DocsyncError::validation(format!(
            "invalid partition '{partition}': must match ^[a-z0-9_-]+$"
        )));
    }
    Ok(value)
}

/// Tenant slug for a `tenant_<slug>` partition, `None` for other partitions.
pub fn tenant_slug_from_partition(partition: &str) -> Result<Option<String>> {
    let Some(rest) = partition.strip_prefix(TENANT_PARTITION_PREFIX) else {
        return Ok(None);
    };
    let slug = rest.trim().to_lowercase();
    if slug.is_empty() {
        return Ok(None);
    }
    if !SLUG_RE.is_match(&slug) {
        return Err(DocsyncError::validation(format!(
            "invalid tenant partition '{partition}': expected tenant_<slug> with slug matching ^[a-z0-9_-]+$"
        )));
    }
    Ok(Some(slug))
}

/// Tenant slug for a ref under `tenants/<slug>/...`, if any.
pub fn tenant_slug_from_ref(doc_ref: &str) -> Option<String> {
    let normalized = doc_ref.trim_start_matches('/');
    let rest = normalized.strip_prefix("tenants/")?;
    let slug = rest.split('/').next()?.trim().to_lowercase();
    SLUG_RE.is_match(&slug).then_some(slug)
}

/// All tenant docs on disk: `tenants/<slug>.md(x)` and everything under `tenants/<slug>/`.
pub fn discover_tenant_refs(root: &Path, slug: &str) -> Vec<String> {
    let mut refs = BTreeSet::new();
    let tenants = root.join(TENANTS_DIR);

    for ext in PAGE_EXTENSIONS {
        let candidate = tenants.join(format!("{slug}.{ext}"));
        if candidate.is_file() {
            if let Some(r) = ref_from_path(root, &candidate) {
                refs.insert(r);
            }
        }
    }

    let tenant_dir = tenants.join(slug);
    if tenant_dir.is_dir() {
        for entry in walkdir::WalkDir::new(&tenant_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let is_page = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| PAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if !is_page {
                continue;
            }
            if let Some(r) = ref_from_path(root, path) {
                refs.insert(r);
            }
        }
    }

    refs.into_iter().collect()
}

/// Select the refs that belong in `partition`.
///
/// Tenant partitions ignore `nav_refs` and use the tenant docs found on disk.
pub fn scope_refs_for_partition(
    root: &Path,
    nav_refs: &[String],
    partition: &str,
) -> Result<Vec<String>> {
    if let Some(slug) = tenant_slug_from_partition(partition)? {
        let tenant_refs = discover_tenant_refs(root, &slug);
        if tenant_refs.is_empty() {
            warn!(%slug, "no tenant docs found under tenants/");
        }
        return Ok(tenant_refs);
    }

    let scoped: Vec<String> = nav_refs
        .iter()
        .filter(|r| tenant_slug_from_ref(r).is_none())
        .cloned()
        .collect();
    let excluded = nav_refs.len() - scoped.len();
    if excluded > 0 {
        info!(partition, excluded, "excluded tenant docs from partition");
    }
    Ok(scoped)
}
