//! Regenerate table reference pages from a warehouse schema snapshot.
//!
//! The snapshot is a JSON array of column rows. Each table page gets a
//! canonical dbt-style ```yaml block, missing pages are created, and the
//! nav group listing the tables is rewritten in table-type order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use docsync_checks::table_pages;
use docsync_markdown::first_yaml_block;
use docsync_shared::{AppConfig, DocsyncError, Result, SchemaDataset};

/// Nav group holding the table pages.
pub const DEFAULT_NAV_GROUP: &str = "SourceMedium Tables";

/// Table types in nav order; anything else sorts after, by name.
const TABLE_TYPE_ORDER: [&str; 4] = ["Dimension", "Fact", "One Big Table", "Report"];

/// One row of the schema snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
struct SnapshotRow {
    #[serde(default)]
    dataset_name: Option<String>,
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    table_type: Option<String>,
    #[serde(default)]
    table_description: Option<String>,
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default)]
    column_description: Option<String>,
}

/// A table assembled from its snapshot rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub name: String,
    pub table_type: String,
    pub description: String,
    /// Column name → description, sorted by name.
    pub columns: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RegenerateOptions {
    pub snapshot: PathBuf,
    /// Dataset to regenerate; defaults to the first configured schema dataset.
    pub dataset: Option<String>,
    pub nav_group: String,
}

/// What a regeneration run changed.
#[derive(Debug, Clone, Default)]
pub struct RegenerateReport {
    pub dataset: String,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub created: Vec<String>,
    /// `(page, reason)` for pages left alone.
    pub skipped: Vec<(String, String)>,
    pub nav_pages: usize,
    pub nav_updated: bool,
}

// ---------------------------------------------------------------------------
// Snapshot parsing
// ---------------------------------------------------------------------------

/// Group snapshot rows for `dataset` by table.
///
/// Later non-empty descriptions win for both tables and columns.
pub fn parse_snapshot(json: &str, dataset: &str) -> Result<BTreeMap<String, TableSnapshot>> {
    let rows: Vec<Option<SnapshotRow>> = serde_json::from_str(json)
        .map_err(|e| DocsyncError::parse(format!("invalid schema snapshot: {e}")))?;

    let mut tables: BTreeMap<String, TableSnapshot> = BTreeMap::new();
    for row in rows.into_iter().flatten() {
        if row.dataset_name.as_deref() != Some(dataset) {
            continue;
        }
        let Some(table) = row.table_name.filter(|t| !t.is_empty()) else {
            continue;
        };
        let entry = tables.entry(table.clone()).or_insert_with(|| TableSnapshot {
            name: table,
            table_type: row.table_type.clone().unwrap_or_default(),
            ..TableSnapshot::default()
        });
        if let Some(desc) = row.table_description.as_deref().map(str::trim) {
            if !desc.is_empty() {
                entry.description = desc.to_string();
            }
        }
        let Some(column) = row.column_name.filter(|c| !c.is_empty()) else {
            continue;
        };
        let desc = row.column_description.as_deref().unwrap_or("").trim();
        let slot = entry.columns.entry(column).or_default();
        if !desc.is_empty() {
            *slot = desc.to_string();
        }
    }
    Ok(tables)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn push_folded(lines: &mut Vec<String>, indent: &str, text: &str) {
    let text = text.replace("\r\n", "\n");
    if text.is_empty() {
        lines.push(format!("{indent}description: \"\""));
        return;
    }
    lines.push(format!("{indent}description: >"));
    for line in text.split('\n') {
        lines.push(format!("{indent}  {line}").trim_end().to_string());
    }
}

/// The full ```yaml block for one table, fences included.
pub fn render_yaml_block(table: &TableSnapshot) -> String {
    let mut lines = vec![
        "```yaml".to_string(),
        "version: 2".to_string(),
        String::new(),
        "models:".to_string(),
        format!("  - name: {}", table.name),
    ];
    push_folded(&mut lines, "    ", &table.description);
    lines.push("    columns:".to_string());
    for (column, description) in &table.columns {
        lines.push(format!("      - name: {column}"));
        push_folded(&mut lines, "        ", description);
        lines.push(String::new());
    }
    lines.push("```".to_string());
    lines.join("\n")
}

fn new_page(table: &TableSnapshot) -> String {
    format!(
        "---\ntitle: '{}'\ndescription: ''\n---\n\n{}\n",
        table.name,
        render_yaml_block(table)
    )
}

/// Replace the first ```yaml block of `text`, or `None` when it has none.
pub fn replace_first_yaml_block(text: &str, block: &str) -> Option<String> {
    let span = first_yaml_block(text)?.span;
    Some(format!("{}{block}{}", &text[..span.start], &text[span.end..]))
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Nav refs for the tables, ordered by table type then name.
pub fn ordered_nav_pages<'a>(
    tables: impl IntoIterator<Item = &'a TableSnapshot>,
    dir: &str,
) -> Vec<String> {
    let rank = |t: &str| {
        TABLE_TYPE_ORDER
            .iter()
            .position(|o| *o == t)
            .unwrap_or(TABLE_TYPE_ORDER.len())
    };
    let mut sorted: Vec<&TableSnapshot> = tables.into_iter().collect();
    sorted.sort_by(|a, b| {
        rank(a.table_type.as_str())
            .cmp(&rank(b.table_type.as_str()))
            .then_with(|| a.name.cmp(&b.name))
    });
    let dir = dir.trim_matches('/');
    sorted
        .into_iter()
        .map(|t| format!("{dir}/{}", t.name))
        .collect()
}

/// Set `pages` on every nav group named `group`. Returns whether any matched.
pub fn replace_nav_group(nav: &mut Value, group: &str, pages: &[String]) -> bool {
    let Some(tabs) = nav
        .get_mut("navigation")
        .and_then(|n| n.get_mut("tabs"))
        .and_then(Value::as_array_mut)
    else {
        return false;
    };
    let mut updated = false;
    for tab in tabs {
        updated |= replace_in_node(tab, group, pages);
    }
    updated
}

fn replace_in_node(node: &mut Value, group: &str, pages: &[String]) -> bool {
    let Some(obj) = node.as_object_mut() else {
        return false;
    };
    let is_target = obj.get("group").and_then(Value::as_str) == Some(group)
        && obj.get("pages").is_some_and(Value::is_array);
    if is_target {
        obj.insert(
            "pages".into(),
            Value::Array(pages.iter().cloned().map(Value::String).collect()),
        );
        return true;
    }

    let mut updated = false;
    for key in ["pages", "groups"] {
        if let Some(children) = obj.get_mut(key).and_then(Value::as_array_mut) {
            for child in children {
                updated |= replace_in_node(child, group, pages);
            }
        }
    }
    updated
}

// ---------------------------------------------------------------------------
// Regeneration
// ---------------------------------------------------------------------------

fn resolve_dataset<'a>(config: &'a AppConfig, name: Option<&str>) -> Result<&'a SchemaDataset> {
    let datasets = &config.checks.schema_datasets;
    match name {
        Some(name) => datasets.iter().find(|d| d.name == name).ok_or_else(|| {
            DocsyncError::validation(format!("dataset '{name}' is not a configured schema dataset"))
        }),
        None => datasets
            .first()
            .ok_or_else(|| DocsyncError::config("no schema datasets configured")),
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| DocsyncError::io(path, e))
}

/// Rewrite table pages and the nav group from a schema snapshot.
#[instrument(skip_all, fields(snapshot = %opts.snapshot.display()))]
pub fn regenerate_tables(
    root: &Path,
    config: &AppConfig,
    opts: &RegenerateOptions,
) -> Result<RegenerateReport> {
    let dataset = resolve_dataset(config, opts.dataset.as_deref())?;
    let json = std::fs::read_to_string(&opts.snapshot)
        .map_err(|e| DocsyncError::io(&opts.snapshot, e))?;
    let tables = parse_snapshot(&json, &dataset.name)?;
    if tables.is_empty() {
        return Err(DocsyncError::validation(format!(
            "snapshot has no rows for dataset '{}'",
            dataset.name
        )));
    }

    let mut report = RegenerateReport {
        dataset: dataset.name.clone(),
        ..RegenerateReport::default()
    };

    // Existing pages
    for path in table_pages(root, dataset) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if stem == "index" {
            continue;
        }
        let file = format!("{stem}.mdx");
        let Some(table) = tables.get(&stem) else {
            report
                .skipped
                .push((file, "table not found in snapshot".into()));
            continue;
        };
        let text = std::fs::read_to_string(&path).map_err(|e| DocsyncError::io(&path, e))?;
        let Some(updated) = replace_first_yaml_block(&text, &render_yaml_block(table)) else {
            warn!(page = %file, "table page has no yaml block");
            report.skipped.push((file, "yaml block not found".into()));
            continue;
        };
        if updated == text {
            report.unchanged.push(file);
        } else {
            write_file(&path, &updated)?;
            report.updated.push(file);
        }
    }

    // Missing pages
    let dir = root.join(&dataset.dir);
    for table in tables.values() {
        let path = dir.join(format!("{}.mdx", table.name));
        if path.exists() {
            continue;
        }
        std::fs::create_dir_all(&dir).map_err(|e| DocsyncError::io(&dir, e))?;
        write_file(&path, &new_page(table))?;
        report.created.push(format!("{}.mdx", table.name));
    }

    // Navigation
    let nav_path = root.join(&config.site.nav_file);
    let nav_text =
        std::fs::read_to_string(&nav_path).map_err(|e| DocsyncError::io(&nav_path, e))?;
    let mut nav: Value = serde_json::from_str(&nav_text)
        .map_err(|e| DocsyncError::parse(format!("invalid {}: {e}", nav_path.display())))?;
    let pages = ordered_nav_pages(tables.values(), &dataset.dir);
    report.nav_pages = pages.len();
    if replace_nav_group(&mut nav, &opts.nav_group, &pages) {
        let mut out = serde_json::to_string_pretty(&nav)
            .map_err(|e| DocsyncError::parse(format!("failed to encode nav: {e}")))?;
        out.push('\n');
        if out != nav_text {
            write_file(&nav_path, &out)?;
            report.nav_updated = true;
        }
    } else {
        warn!(group = %opts.nav_group, "nav group not found, navigation left unchanged");
    }

    info!(
        dataset = %report.dataset,
        updated = report.updated.len(),
        created = report.created.len(),
        skipped = report.skipped.len(),
        nav_updated = report.nav_updated,
        "table pages regenerated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SNAPSHOT: &str = r#"[
        {"dataset_name": "analytics", "table_name": "obt_orders", "table_type": "One Big Table",
         "table_description": "", "column_name": "order_id", "column_description": "Order key."},
        {"dataset_name": "analytics", "table_name": "obt_orders", "table_type": "One Big Table",
         "table_description": "One row per order.", "column_name": "customer_id", "column_description": ""},
        {"dataset_name": "analytics", "table_name": "dim_customers", "table_type": "Dimension",
         "table_description": "Customers.", "column_name": "customer_id", "column_description": "Customer key.\nStable."},
        {"dataset_name": "analytics", "table_name": "rpt_daily", "table_type": "Report",
         "column_name": null},
        {"dataset_name": "other", "table_name": "ignored", "column_name": "x"},
        null
    ]"#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn groups_rows_by_table() {
        let tables = parse_snapshot(SNAPSHOT, "analytics").unwrap();
        assert_eq!(
            tables.keys().collect::<Vec<_>>(),
            vec!["dim_customers", "obt_orders", "rpt_daily"]
        );
        let orders = &tables["obt_orders"];
        assert_eq!(orders.description, "One row per order.");
        assert_eq!(orders.columns["order_id"], "Order key.");
        assert_eq!(orders.columns["customer_id"], "");
        assert!(tables["rpt_daily"].columns.is_empty());
    }

    #[test]
    fn renders_sorted_folded_yaml() {
        let tables = parse_snapshot(SNAPSHOT, "analytics").unwrap();
        let block = render_yaml_block(&tables["obt_orders"]);
        assert_eq!(
            block,
            "```yaml\nversion: 2\n\nmodels:\n  - name: obt_orders\n    description: >\n      One row per order.\n    columns:\n      - name: customer_id\n        description: \"\"\n\n      - name: order_id\n        description: >\n          Order key.\n\n```"
        );
    }

    #[test]
    fn nav_order_follows_table_type() {
        let tables = parse_snapshot(SNAPSHOT, "analytics").unwrap();
        assert_eq!(
            ordered_nav_pages(tables.values(), "/tables/"),
            vec!["tables/dim_customers", "tables/obt_orders", "tables/rpt_daily"]
        );
    }

    #[test]
    fn replaces_nested_nav_group() {
        let mut nav = json!({"navigation": {"tabs": [
            {"tab": "Data", "groups": [
                {"group": "Reference", "pages": ["a", {"group": "SourceMedium Tables", "pages": ["old"]}]}
            ]}
        ]}});
        assert!(replace_nav_group(&mut nav, DEFAULT_NAV_GROUP, &["new".into()]));
        assert_eq!(
            nav["navigation"]["tabs"][0]["groups"][0]["pages"][1]["pages"],
            json!(["new"])
        );
        assert!(!replace_nav_group(&mut nav, "Missing", &[]));
    }

    #[test]
    fn regenerates_pages_and_nav() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "snapshot.json", SNAPSHOT);
        write(
            root,
            "docs.json",
            r#"{"navigation": {"tabs": [{"tab": "Data", "groups": [{"group": "SourceMedium Tables", "pages": []}]}]}}"#,
        );
        write(
            root,
            "tables/obt_orders.mdx",
            "---\ntitle: obt_orders\n---\n\nIntro.\n\n```yaml\nold: true\n```\n\nFooter.\n",
        );
        write(root, "tables/legacy.mdx", "```yaml\nx: 1\n```\n");
        write(root, "tables/index.mdx", "index");

        let mut config = AppConfig::default();
        config.checks.schema_datasets = vec![SchemaDataset {
            name: "analytics".into(),
            dir: "tables".into(),
        }];
        let opts = RegenerateOptions {
            snapshot: root.join("snapshot.json"),
            dataset: None,
            nav_group: DEFAULT_NAV_GROUP.into(),
        };

        let report = regenerate_tables(root, &config, &opts).unwrap();
        assert_eq!(report.updated, vec!["obt_orders.mdx"]);
        assert_eq!(report.created, vec!["dim_customers.mdx", "rpt_daily.mdx"]);
        assert_eq!(
            report.skipped,
            vec![("legacy.mdx".to_string(), "table not found in snapshot".to_string())]
        );
        assert!(report.nav_updated);

        let page = std::fs::read_to_string(root.join("tables/obt_orders.mdx")).unwrap();
        assert!(page.starts_with("---\ntitle: obt_orders\n---\n\nIntro.\n\n```yaml\nversion: 2"));
        assert!(page.ends_with("```\n\nFooter.\n"));

        let created = std::fs::read_to_string(root.join("tables/dim_customers.mdx")).unwrap();
        assert!(created.starts_with("---\ntitle: 'dim_customers'\ndescription: ''\n---\n\n```yaml"));
        assert!(created.contains("          Customer key.\n          Stable.\n"));

        let nav: Value =
            serde_json::from_str(&std::fs::read_to_string(root.join("docs.json")).unwrap()).unwrap();
        assert_eq!(
            nav["navigation"]["tabs"][0]["groups"][0]["pages"],
            json!(["tables/dim_customers", "tables/obt_orders", "tables/rpt_daily"])
        );

        // Second run is a no-op.
        let again = regenerate_tables(root, &config, &opts).unwrap();
        assert!(again.updated.is_empty());
        assert!(again.created.is_empty());
        assert!(!again.nav_updated);
    }
}
