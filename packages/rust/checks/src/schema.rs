//! Canonical schema extraction from table reference pages.
//!
//! Each table page embeds a dbt-style ```yaml snapshot. The first `- name:`
//! entry equal to the file stem is the model itself; the rest are columns.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use docsync_markdown::first_yaml_block;
use docsync_shared::{Result, SchemaDataset};

use crate::read_page;

static YAML_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*-\s*name:\s*([A-Za-z0-9_]+)\s*$").expect("valid regex")
});

/// Known columns per `dataset.table`.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    tables: BTreeMap<String, BTreeSet<String>>,
    datasets: Vec<String>,
}

impl SchemaIndex {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Columns of `dataset.table`, if the table is known.
    pub fn columns(&self, table_key: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table_key)
    }

    pub fn contains(&self, table_key: &str) -> bool {
        self.tables.contains_key(table_key)
    }

    /// Configured dataset names (lowercase), whether or not they produced tables.
    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    pub fn insert(&mut self, table_key: impl Into<String>, columns: BTreeSet<String>) {
        self.tables.insert(table_key.into(), columns);
    }
}

/// Table pages (`*.mdx`, non-recursive) of one dataset directory, sorted.
pub fn table_pages(root: &Path, dataset: &SchemaDataset) -> Vec<PathBuf> {
    let dir = root.join(&dataset.dir);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut pages: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "mdx"))
        .collect();
    pages.sort();
    pages
}

/// Column names from a yaml snapshot, dropping the model entry named `table`.
pub fn columns_from_yaml(yaml: &str, table: &str) -> BTreeSet<String> {
    let mut names: Vec<&str> = YAML_NAME_RE
        .captures_iter(yaml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if names.first() == Some(&table) {
        names.remove(0);
    }
    names
        .into_iter()
        .filter(|n| *n != table)
        .map(str::to_string)
        .collect()
}

/// Build the schema index from every configured dataset directory.
pub fn build_schema_index(root: &Path, datasets: &[SchemaDataset]) -> Result<SchemaIndex> {
    let mut index = SchemaIndex {
        datasets: datasets.iter().map(|d| d.name.to_lowercase()).collect(),
        ..SchemaIndex::default()
    };

    for dataset in datasets {
        for path in table_pages(root, dataset) {
            let Some(table) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = read_page(&path)?;
            let Some(block) = first_yaml_block(&text) else {
                continue;
            };
            let columns = columns_from_yaml(block.body, table);
            if columns.is_empty() {
                continue;
            }
            index.insert(format!("{}.{table}", dataset.name.to_lowercase()), columns);
        }
    }

    debug!(tables = index.len(), "built schema index");
    Ok(index)
}
