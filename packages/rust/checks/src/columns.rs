//! Column accuracy: SQL examples and "Key columns" lines must only name
//! columns that exist in the canonical schema.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use docsync_discovery::{PageWalkOptions, walk_pages};
use docsync_markdown::sql_blocks;
use docsync_shared::{Issue, Result};

use crate::schema::{SchemaIndex, build_schema_index, table_pages};
use crate::{CheckContext, CheckKind, CheckReport, read_page};

const SQL_IGNORE_WORDS: &[&str] = &[
    "select", "from", "where", "group", "by", "order", "limit", "join", "left", "right", "inner",
    "outer", "full", "cross", "on", "as", "with", "union", "all", "distinct", "having", "over",
    "partition", "and", "or", "not", "null", "is", "in", "like", "between", "case", "when", "then",
    "else", "end", "desc", "asc", "qualify", "true", "false", "interval", "day", "week", "month",
    "quarter", "year",
];

const SQL_IGNORE_FUNCTIONS: &[&str] = &[
    "sum",
    "count",
    "countif",
    "avg",
    "min",
    "max",
    "lag",
    "lead",
    "safe_divide",
    "nullif",
    "ifnull",
    "coalesce",
    "current_date",
    "current_timestamp",
    "date_sub",
    "date_add",
    "cast",
];

static QUALIFIED_COL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid regex")
});
static UNQUALIFIED_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([a-z][a-z0-9_]{2,})\b").expect("valid regex"));
static AS_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAS\s+([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid regex"));
static CTE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bWITH\s+|,\s*)([A-Za-z_][A-Za-z0-9_]*)\s+AS\s*\(").expect("valid regex")
});
static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*?$").expect("valid regex"));
static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static SINGLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^'\\]|\\.)*'").expect("valid regex"));
static DOUBLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("valid regex"));
static KEY_COLUMNS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)key columns(?:\*\*)?\s*:(?:\*\*)?(.*)$").expect("valid regex")
});
static BACKTICK_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)`").expect("valid regex"));

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates SQL blocks and key-column lists against a [`SchemaIndex`].
pub struct ColumnValidator<'a> {
    index: &'a SchemaIndex,
    project_placeholder: String,
    /// `` `project.dataset.table` [AS] alias `` for the configured datasets.
    table_ref_re: Regex,
    /// Bare `dataset.table` mentions in prose.
    table_mention_re: Regex,
}

impl<'a> ColumnValidator<'a> {
    pub fn new(index: &'a SchemaIndex, project_placeholder: &str) -> Result<Self> {
        let datasets = index
            .datasets()
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");
        // No datasets: a group that can never be followed by `.`.
        let datasets = if datasets.is_empty() {
            r"\z".to_string()
        } else {
            datasets
        };

        let table_ref_re = crate::compile_pattern(
            "schema_datasets",
            &format!(
                r"`[^`]*?\.({datasets})\.([A-Za-z0-9_]+)`(?:\s+(?:AS\s+)?([A-Za-z_][A-Za-z0-9_]*))?"
            ),
            true,
        )?;
        let table_mention_re = crate::compile_pattern(
            "schema_datasets",
            &format!(r"\b({datasets})\.([A-Za-z0-9_]+)\b"),
            true,
        )?;

        Ok(Self {
            index,
            project_placeholder: project_placeholder.to_lowercase(),
            table_ref_re,
            table_mention_re,
        })
    }

    /// Issues for every ```sql block in `text`.
    ///
    /// An unknown unqualified identifier is reported once per block, however
    /// often it appears there.
    pub fn check_sql(&self, path: &Path, text: &str) -> Vec<Issue> {
        sql_blocks(text)
            .into_iter()
            .flat_map(|sql| self.check_sql_block(path, sql))
            .collect()
    }

    fn check_sql_block(&self, path: &Path, sql: &str) -> Vec<Issue> {
        let sql = normalize_sql(sql);
        let mut issues = Vec::new();

        let mut alias_to_table: BTreeMap<String, String> = BTreeMap::new();
        let mut referenced: BTreeSet<String> = BTreeSet::new();

        for caps in self.table_ref_re.captures_iter(&sql) {
            let table = &caps[2];
            let table_key = format!("{}.{table}", caps[1].to_lowercase());
            referenced.insert(table_key.clone());
            if let Some(alias) = caps.get(3).map(|m| m.as_str()) {
                if !SQL_IGNORE_WORDS.contains(&alias.to_lowercase().as_str()) {
                    alias_to_table.insert(alias.to_string(), table_key.clone());
                }
            }
            alias_to_table.entry(table.to_string()).or_insert(table_key);
        }

        for caps in QUALIFIED_COL_RE.captures_iter(&sql) {
            let (qualifier, col) = (&caps[1], &caps[2]);
            let Some(table) = alias_to_table.get(qualifier) else {
                continue;
            };
            let Some(columns) = self.index.columns(table) else {
                continue;
            };
            if !columns.contains(col) {
                issues.push(Issue::new(
                    path,
                    format!("unknown column `{qualifier}.{col}` for table `{table}` in sql block"),
                ));
            }
        }

        let known: Vec<&String> = referenced.iter().filter(|t| self.index.contains(t)).collect();
        let [single] = known.as_slice() else {
            return issues;
        };
        let Some(columns) = self.index.columns(single) else {
            return issues;
        };

        let ignore = self.ignore_set(&sql, single, &alias_to_table);
        let mut reported = HashSet::new();
        for caps in UNQUALIFIED_IDENT_RE.captures_iter(&sql) {
            let ident = &caps[1];
            if ignore.contains(ident) || columns.contains(ident) {
                continue;
            }
            if reported.insert(ident.to_string()) {
                issues.push(Issue::new(
                    path,
                    format!("unknown column `{ident}` for table `{single}` in sql block"),
                ));
            }
        }

        issues
    }

    /// Identifiers that are never column references in a block.
    fn ignore_set(
        &self,
        sql: &str,
        table_key: &str,
        alias_to_table: &BTreeMap<String, String>,
    ) -> HashSet<String> {
        let mut ignore: HashSet<String> = SQL_IGNORE_WORDS
            .iter()
            .chain(SQL_IGNORE_FUNCTIONS)
            .map(|w| (*w).to_string())
            .collect();
        ignore.extend(alias_to_table.keys().cloned());
        ignore.extend(AS_ALIAS_RE.captures_iter(sql).map(|c| c[1].to_string()));
        ignore.extend(CTE_NAME_RE.captures_iter(sql).map(|c| c[1].to_string()));
        ignore.insert(table_key.to_string());
        if let Some((_, table)) = table_key.split_once('.') {
            ignore.insert(table.to_string());
        }
        ignore.insert(self.project_placeholder.clone());
        ignore.extend(self.index.datasets().iter().cloned());
        ignore
    }

    /// Issues for `Key columns:` lines.
    ///
    /// `own_table` is the page's table key when the page is itself a schema
    /// table page; otherwise the single known table mentioned in the text is used.
    pub fn check_key_columns(&self, path: &Path, text: &str, own_table: Option<&str>) -> Vec<Issue> {
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                KEY_COLUMNS_RE
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .map(|m| (i + 1, m.as_str()))
            })
            .collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let table = match own_table {
            Some(t) => Some(t.to_string()),
            None => self.single_mentioned_table(text),
        };
        let Some(table) = table else {
            debug!(path = %path.display(), "key columns without a single known table, skipping");
            return Vec::new();
        };
        let Some(columns) = self.index.columns(&table) else {
            return Vec::new();
        };

        let mut issues = Vec::new();
        for (line_no, rest) in lines {
            for caps in BACKTICK_IDENT_RE.captures_iter(rest) {
                let col = &caps[1];
                if !columns.contains(col) {
                    issues.push(Issue::at_line(
                        path,
                        line_no,
                        format!("unknown key column `{col}` for table `{table}`"),
                    ));
                }
            }
        }
        issues
    }

    fn single_mentioned_table(&self, text: &str) -> Option<String> {
        let mentioned: BTreeSet<String> = self
            .table_mention_re
            .captures_iter(text)
            .map(|c| format!("{}.{}", c[1].to_lowercase(), &c[2]))
            .filter(|key| self.index.contains(key))
            .collect();
        if mentioned.len() == 1 {
            mentioned.into_iter().next()
        } else {
            None
        }
    }
}

/// Strip comments and string literals so neither reads as identifiers.
pub fn normalize_sql(sql: &str) -> String {
    let sql = LINE_COMMENT_RE.replace_all(sql, "");
    let sql = BLOCK_COMMENT_RE.replace_all(&sql, "");
    let sql = SINGLE_QUOTED_RE.replace_all(&sql, "''");
    DOUBLE_QUOTED_RE.replace_all(&sql, "\"\"").into_owned()
}

// ---------------------------------------------------------------------------
// Check entry point
// ---------------------------------------------------------------------------

pub(crate) fn run(ctx: &CheckContext<'_>) -> Result<CheckReport> {
    let mut report = CheckReport::new(CheckKind::Columns);
    let checks = &ctx.config.checks;

    let index = build_schema_index(ctx.root, &checks.schema_datasets)?;
    if index.is_empty() {
        report
            .notes
            .push("no schema table pages found, column accuracy skipped".to_string());
        return Ok(report);
    }
    let validator = ColumnValidator::new(&index, &checks.project_placeholder)?;

    // Table pages check their own key columns against their own table.
    let mut own_tables: BTreeMap<std::path::PathBuf, String> = BTreeMap::new();
    for dataset in &checks.schema_datasets {
        for path in table_pages(ctx.root, dataset) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let key = format!("{}.{stem}", dataset.name.to_lowercase());
                if index.contains(&key) {
                    own_tables.insert(path.clone(), key);
                }
            }
        }
    }

    let opts = PageWalkOptions {
        extensions: vec!["mdx".into()],
        excluded_dirs: checks.excluded_dirs.clone(),
    };
    let pages = walk_pages(ctx.root, &opts);
    for path in &pages {
        let text = read_page(path)?;
        let rel = ctx.relative(path);
        if text.to_lowercase().contains("```sql") {
            report.issues.extend(validator.check_sql(&rel, &text));
        }
        let own = own_tables.get(path).map(String::as_str);
        report
            .issues
            .extend(validator.check_key_columns(&rel, &text, own));
    }

    info!(
        pages = pages.len(),
        tables = index.len(),
        "column accuracy scanned"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SchemaIndex {
        let dir = tempfile::tempdir().unwrap();
        crate::test_support::write(
            dir.path(),
            "tables/sm_transformed_v2/obt_orders.mdx",
            "```yaml\nmodels:\n  - name: obt_orders\n    columns:\n      - name: order_id\n      - name: order_net_revenue\n      - name: customer_id\n      - name: order_processed_at_local_datetime\n```\n",
        );
        crate::test_support::write(
            dir.path(),
            "tables/sm_transformed_v2/dim_customers.mdx",
            "```yaml\nmodels:\n  - name: dim_customers\n    columns:\n      - name: customer_id\n      - name: customer_email\n```\n",
        );
        let datasets = vec![docsync_shared::SchemaDataset {
            name: "sm_transformed_v2".into(),
            dir: "tables/sm_transformed_v2".into(),
        }];
        build_schema_index(dir.path(), &datasets).unwrap()
    }

    fn messages(issues: &[Issue]) -> Vec<String> {
        issues.iter().map(|i| i.message.clone()).collect()
    }

    #[test]
    fn valid_single_table_sql_passes() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "```sql\n-- revenue by day\nSELECT\n  DATE(order_processed_at_local_datetime) AS order_date,\n  SUM(order_net_revenue) AS revenue\nFROM `your_project.sm_transformed_v2.obt_orders`\nWHERE customer_id IS NOT NULL\nGROUP BY 1\n```\n";
        assert!(v.check_sql(Path::new("a.mdx"), text).is_empty());
    }

    #[test]
    fn unknown_unqualified_column_is_reported() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "```sql\nSELECT order_id, order_gross_revenue\nFROM `your_project.sm_transformed_v2.obt_orders`\n```\n";
        assert_eq!(
            messages(&v.check_sql(Path::new("a.mdx"), text)),
            vec!["unknown column `order_gross_revenue` for table `sm_transformed_v2.obt_orders` in sql block"]
        );
    }

    #[test]
    fn repeated_unknown_column_reported_once_per_block() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let block = "```sql\nSELECT order_gross_revenue, SUM(order_gross_revenue)\nFROM `your_project.sm_transformed_v2.obt_orders`\nGROUP BY order_gross_revenue\n```\n";
        let text = format!("{block}\n{block}");
        assert_eq!(v.check_sql(Path::new("a.mdx"), &text).len(), 2);
    }

    #[test]
    fn qualified_columns_checked_per_alias() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "```sql\nSELECT o.order_id, c.customer_email, c.customer_phone\nFROM `your_project.sm_transformed_v2.obt_orders` o\nJOIN `your_project.sm_transformed_v2.dim_customers` AS c\n  ON o.customer_id = c.customer_id\n```\n";
        // Two known tables: unqualified identifiers are not checked.
        assert_eq!(
            messages(&v.check_sql(Path::new("a.mdx"), text)),
            vec!["unknown column `c.customer_phone` for table `sm_transformed_v2.dim_customers` in sql block"]
        );
    }

    #[test]
    fn comments_strings_and_ctes_are_ignored() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "```sql\nWITH recent_orders AS (\n  SELECT order_id /* bogus_column */\n  FROM `your_project.sm_transformed_v2.obt_orders`\n  WHERE order_id != 'placeholder_value'\n)\nSELECT COUNT(*) AS total FROM recent_orders\n```\n";
        assert!(v.check_sql(Path::new("a.mdx"), text).is_empty());
    }

    #[test]
    fn unknown_tables_are_skipped() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "```sql\nSELECT anything_goes FROM `your_project.sm_transformed_v2.not_documented`\n```\n";
        assert!(v.check_sql(Path::new("a.mdx"), text).is_empty());
    }

    #[test]
    fn key_columns_on_table_page() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "Intro\n\n**Key columns:** `order_id`, `order_total`\n";
        let issues = v.check_key_columns(
            Path::new("obt_orders.mdx"),
            text,
            Some("sm_transformed_v2.obt_orders"),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(3));
        assert_eq!(
            issues[0].message,
            "unknown key column `order_total` for table `sm_transformed_v2.obt_orders`"
        );
    }

    #[test]
    fn key_columns_use_single_mentioned_table() {
        let index = index();
        let v = ColumnValidator::new(&index, "your_project").unwrap();
        let text = "Use sm_transformed_v2.dim_customers for this.\n\nKey columns: `customer_email`, `lifetime_value`\n";
        let issues = v.check_key_columns(Path::new("guide.mdx"), text, None);
        assert_eq!(messages(&issues), vec!["unknown key column `lifetime_value` for table `sm_transformed_v2.dim_customers`"]);

        let ambiguous = "sm_transformed_v2.dim_customers and sm_transformed_v2.obt_orders\n\nKey columns: `nope`\n";
        assert!(v.check_key_columns(Path::new("guide.mdx"), ambiguous, None).is_empty());
    }

    #[test]
    fn normalize_sql_strips_comments_and_literals() {
        let sql = "SELECT a -- trailing\n/* block\ncomment */ FROM t WHERE b = 'it''s' AND c = \"x\"";
        let out = normalize_sql(sql);
        assert!(!out.contains("trailing"));
        assert!(!out.contains("comment"));
        assert!(!out.contains("x\""));
    }
}
