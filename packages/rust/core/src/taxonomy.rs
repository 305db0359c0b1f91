//! Retrieval taxonomy derived from a page's ref, title, and tags.
//!
//! The taxonomy is stamped into remote metadata so support tooling can filter
//! by content type and product surface without re-reading the page.

use std::collections::BTreeSet;

use docsync_shared::{Metadata, MetadataValue};

pub const TAXONOMY_VERSION: &str = "v1";
pub const TAXONOMY_SOURCE: &str = "derived+frontmatter";

const SQL_QUERY_LIBRARY_REF: &str = "data-activation/template-resources/sql-query-library";
const MANAGED_BI_MODULES_PREFIX: &str = "data-activation/managed-bi-v1/modules/";
const MANAGED_BI_PREFIX: &str = "data-activation/managed-bi-v1/";
const DATA_TABLES_PREFIX: &str = "data-activation/data-tables/";
const MANAGED_WAREHOUSE_PREFIX: &str = "data-activation/managed-data-warehouse/";

/// Surface names in primary-surface priority order.
pub const SURFACES: [&str; 8] = [
    "query_snippets",
    "looker_studio",
    "bigquery",
    "managed_warehouse",
    "dashboard",
    "mta",
    "configuration_sheet",
    "general",
];

/// `(ref prefix, content type)`, first match wins.
const CONTENT_TYPE_PREFIXES: [(&str, &str); 11] = [
    (DATA_TABLES_PREFIX, "data_table_reference"),
    ("data-activation/template-resources/", "template_resource"),
    (MANAGED_BI_MODULES_PREFIX, "dashboard_module_reference"),
    (MANAGED_BI_PREFIX, "managed_bi_guide"),
    (MANAGED_WAREHOUSE_PREFIX, "managed_warehouse_guide"),
    ("help-center/faq/", "faq"),
    ("help-center/core-concepts/", "core_concept"),
    ("onboarding/analytics-tools/", "analytics_tool_guide"),
    ("onboarding/getting-started/", "onboarding_guide"),
    ("data-inputs/platform-integration-instructions/", "integration_guide"),
    ("mta/", "mta_guide"),
];

/// Every content type the deriver can produce.
pub const CONTENT_TYPES: [&str; 13] = [
    "query_snippet_library",
    "data_table_reference",
    "template_resource",
    "dashboard_module_reference",
    "managed_bi_guide",
    "managed_warehouse_guide",
    "faq",
    "core_concept",
    "analytics_tool_guide",
    "onboarding_guide",
    "integration_guide",
    "mta_guide",
    "general_doc",
];

/// Derived classification for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    pub doc_domain: String,
    pub doc_subdomain: String,
    pub content_type: &'static str,
    pub primary_surface: &'static str,
    pub surfaces: BTreeSet<&'static str>,
    pub topic_tags: BTreeSet<String>,
    pub frontmatter_tags: BTreeSet<String>,
}

impl Taxonomy {
    /// Derive the taxonomy for a page.
    pub fn derive(doc_ref: &str, title: &str, description: &str, tags: &[String]) -> Self {
        let parts: Vec<&str> = doc_ref.split('/').collect();
        let doc_domain = parts[0].to_string();
        let doc_subdomain = if parts.len() >= 2 {
            parts[..2].join("/")
        } else {
            doc_domain.clone()
        };

        let ref_lower = doc_ref.to_lowercase();
        let text = format!("{doc_ref} {title} {description}").to_lowercase();
        let is_query_library = ref_lower == SQL_QUERY_LIBRARY_REF;

        let content_type = content_type_for(&ref_lower);
        let mut surfaces = surfaces_for(&ref_lower, &text);
        if is_query_library {
            surfaces.insert("query_snippets");
        }
        let primary_surface = SURFACES
            .into_iter()
            .find(|s| surfaces.contains(s))
            .unwrap_or("general");

        let frontmatter_tags: BTreeSet<String> = tags
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| normalize_tag(t))
            .collect();

        let mut topic_tags: BTreeSet<String> = [
            format!("domain:{doc_domain}"),
            format!("subdomain:{doc_subdomain}"),
            format!("content_type:{content_type}"),
        ]
        .into_iter()
        .collect();
        topic_tags.extend(surfaces.iter().map(|s| format!("surface:{s}")));
        topic_tags.extend(frontmatter_tags.iter().cloned());

        if is_query_library {
            topic_tags.extend(
                ["query_snippets", "sql_examples", "analytics_queries"].map(String::from),
            );
        }
        if ref_lower.contains("template") {
            topic_tags.insert("templates".into());
        }
        if content_type == "faq" {
            topic_tags.insert("support".into());
        }
        if content_type.ends_with("_guide") {
            topic_tags.insert("how_to".into());
        }

        Self {
            doc_domain,
            doc_subdomain,
            content_type,
            primary_surface,
            surfaces,
            topic_tags,
            frontmatter_tags,
        }
    }

    /// Write the taxonomy fields into `metadata`.
    pub fn apply_to(&self, metadata: &mut Metadata) {
        let list = |items: Vec<String>| MetadataValue::List(items);
        metadata.insert("taxonomy_version".into(), TAXONOMY_VERSION.into());
        metadata.insert("doc_domain".into(), self.doc_domain.clone().into());
        metadata.insert("doc_subdomain".into(), self.doc_subdomain.clone().into());
        metadata.insert("content_type".into(), self.content_type.into());
        metadata.insert("primary_surface".into(), self.primary_surface.into());
        metadata.insert(
            "surfaces".into(),
            list(self.surfaces.iter().map(|s| s.to_string()).collect()),
        );
        metadata.insert(
            "topic_tags".into(),
            list(self.topic_tags.iter().cloned().collect()),
        );
        metadata.insert(
            "frontmatter_tags".into(),
            list(self.frontmatter_tags.iter().cloned().collect()),
        );
        metadata.insert("taxonomy_source".into(), TAXONOMY_SOURCE.into());
    }
}

fn content_type_for(ref_lower: &str) -> &'static str {
    if ref_lower == SQL_QUERY_LIBRARY_REF {
        return "query_snippet_library";
    }
    CONTENT_TYPE_PREFIXES
        .iter()
        .find(|(prefix, _)| ref_lower.starts_with(*prefix))
        .map_or("general_doc", |&(_, content_type)| content_type)
}

fn surfaces_for(ref_lower: &str, text: &str) -> BTreeSet<&'static str> {
    let mut surfaces = BTreeSet::new();
    if ref_lower.starts_with(MANAGED_BI_MODULES_PREFIX) {
        surfaces.extend(["dashboard", "looker_studio"]);
    } else if ref_lower.starts_with(MANAGED_BI_PREFIX) {
        surfaces.insert("dashboard");
    }
    if text.contains("looker") {
        surfaces.insert("looker_studio");
    }
    if text.contains("bigquery") || text.contains("sql") || ref_lower.starts_with(DATA_TABLES_PREFIX)
    {
        surfaces.insert("bigquery");
    }
    if text.contains("dashboard") {
        surfaces.insert("dashboard");
    }
    if text.contains("warehouse") || ref_lower.starts_with(MANAGED_WAREHOUSE_PREFIX) {
        surfaces.insert("managed_warehouse");
    }
    if ref_lower.starts_with("mta/") {
        surfaces.insert("mta");
    }
    if ref_lower.contains("configuration-sheet") {
        surfaces.insert("configuration_sheet");
    }
    if surfaces.is_empty() {
        surfaces.insert("general");
    }
    surfaces
}

/// Lowercase, trim, and join whitespace runs with `_`.
fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
