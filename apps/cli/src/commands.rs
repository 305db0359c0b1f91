//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use docsync_checks::{CheckContext, CheckKind, CheckReport, run_all, run_check};
use docsync_core::pipeline::{ProgressReporter, SyncMode, SyncOptions, SyncResult};
use docsync_core::provision::InstructionScope;
use docsync_core::snapshot::{DEFAULT_NAV_GROUP, RegenerateOptions};
use docsync_remote::RemoteClient;
use docsync_shared::{AppConfig, init_config, load_config, load_env_file, resolve_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsync: sync a Markdown docs tree into a retrieval service.
#[derive(Parser)]
#[command(
    name = "docsync",
    version,
    about = "Sync a Markdown/MDX docs tree into a retrieval service and validate it locally.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Docs root (contains the nav file and docsync.toml).
    #[arg(long, default_value = ".", global = true, env = "DOCSYNC_ROOT")]
    pub root: PathBuf,

    /// Explicit config file path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub(crate) enum ModeArg {
    #[default]
    Incremental,
    Full,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Incremental => SyncMode::Incremental,
            ModeArg::Full => SyncMode::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub(crate) enum ScopeArg {
    #[default]
    Document,
    Chunk,
}

impl From<ScopeArg> for InstructionScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Document => InstructionScope::Document,
            ScopeArg::Chunk => InstructionScope::Chunk,
        }
    }
}

/// Which local check to run.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum CheckArg {
    Columns,
    Inventory,
    Placeholders,
    Links,
    Tables,
    All,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Reconcile local docs with a remote partition.
    Sync(SyncArgs),

    /// Run local validation checks.
    Check {
        /// Check to run.
        #[arg(value_enum)]
        which: CheckArg,
    },

    /// Schema reference maintenance.
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },

    /// List entities extracted from one remote document.
    Entities {
        /// Partition the document lives in.
        #[arg(long)]
        partition: String,

        /// Remote document id.
        #[arg(long)]
        document_id: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct SyncArgs {
    /// Target partition (`shared_docs` or `tenant_<id>`).
    #[arg(long)]
    partition: String,

    /// Sync only these doc refs (repeatable).
    #[arg(long = "doc-ref")]
    doc_refs: Vec<String>,

    /// Log the plan without writing.
    #[arg(long)]
    dry_run: bool,

    /// Stop after building local docs; needs no API key.
    #[arg(long)]
    skip_remote: bool,

    /// Create or update the partition before syncing.
    #[arg(long)]
    ensure_partition: bool,

    /// Override the default partition description.
    #[arg(long)]
    partition_description: Option<String>,

    /// Create or activate the entity-extraction instruction.
    #[arg(long)]
    ensure_entity_instruction: bool,

    /// Override the default instruction name.
    #[arg(long)]
    entity_instruction_name: Option<String>,

    /// Instruction scope.
    #[arg(long, value_enum, default_value = "document")]
    entity_instruction_scope: ScopeArg,

    /// Treat partially indexed statuses as done when polling.
    #[arg(long)]
    allow_indexed: bool,

    /// Commit recorded in document metadata.
    #[arg(long, env = "GITHUB_SHA")]
    commit_sha: Option<String>,

    /// Sync mode.
    #[arg(long, value_enum, default_value = "incremental")]
    mode: ModeArg,
}

/// Schema subcommands.
#[derive(Subcommand)]
pub(crate) enum SchemaAction {
    /// Rewrite table pages and nav from a JSON schema snapshot.
    Regenerate {
        /// Snapshot JSON file.
        #[arg(long)]
        snapshot: PathBuf,

        /// Dataset to regenerate (defaults to the first configured one).
        #[arg(long)]
        dataset: Option<String>,

        /// Nav group whose pages are rewritten.
        #[arg(long, default_value = DEFAULT_NAV_GROUP)]
        nav_group: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default docsync.toml into the docs root.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsync=info",
        1 => "docsync=debug",
        _ => "docsync=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let root = cli.root;
    load_env_file(&root);

    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Sync(args) => {
            let config = load_config(&root, config_path)?;
            cmd_sync(&root, &config, args).await
        }
        Command::Check { which } => {
            let config = load_config(&root, config_path)?;
            cmd_check(&root, &config, which)
        }
        Command::Schema {
            action:
                SchemaAction::Regenerate {
                    snapshot,
                    dataset,
                    nav_group,
                },
        } => {
            let config = load_config(&root, config_path)?;
            cmd_schema_regenerate(&root, &config, snapshot, dataset, nav_group)
        }
        Command::Entities {
            partition,
            document_id,
        } => {
            let config = load_config(&root, config_path)?;
            cmd_entities(&config, &partition, &document_id).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&root),
            ConfigAction::Show => cmd_config_show(&load_config(&root, config_path)?),
        },
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn cmd_sync(root: &Path, config: &AppConfig, args: SyncArgs) -> Result<()> {
    let opts = SyncOptions {
        root: root.to_path_buf(),
        partition: args.partition,
        doc_refs: args.doc_refs,
        mode: args.mode.into(),
        dry_run: args.dry_run,
        skip_remote: args.skip_remote,
        ensure_partition: args.ensure_partition,
        partition_description: args.partition_description,
        ensure_entity_instruction: args.ensure_entity_instruction,
        entity_instruction_name: args.entity_instruction_name,
        entity_instruction_scope: args.entity_instruction_scope.into(),
        allow_indexed: args.allow_indexed,
        commit_sha: args.commit_sha.filter(|sha| !sha.trim().is_empty()),
    };

    info!(
        partition = %opts.partition,
        mode = %opts.mode,
        dry_run = opts.dry_run,
        refs = opts.doc_refs.len(),
        "starting sync"
    );

    let reporter = CliProgress::new();
    let result = docsync_core::run_sync(config, &opts, &reporter).await?;

    println!();
    if result.remote_skipped {
        println!("  Local docs built (remote skipped)");
    } else if result.dry_run {
        println!("  Dry run complete, nothing written");
    } else {
        println!("  Sync complete");
    }
    println!("  Partition: {}", result.partition);
    println!("  Local:     {}", result.local_docs);
    if !result.remote_skipped && !result.dry_run {
        println!("  Created:   {}", result.created);
        println!("  Updated:   {}", result.updated);
        println!("  Patched:   {}", result.patched);
        println!("  Deleted:   {}", result.deleted);
        if result.instruction_created {
            println!("  Instruction created");
        }
    }
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_check(root: &Path, config: &AppConfig, which: CheckArg) -> Result<()> {
    let ctx = CheckContext { root, config };
    let reports = match which {
        CheckArg::All => run_all(&ctx)?,
        CheckArg::Columns => vec![run_check(CheckKind::Columns, &ctx)?],
        CheckArg::Inventory => vec![run_check(CheckKind::Inventory, &ctx)?],
        CheckArg::Placeholders => vec![run_check(CheckKind::Placeholders, &ctx)?],
        CheckArg::Links => vec![run_check(CheckKind::Links, &ctx)?],
        CheckArg::Tables => vec![run_check(CheckKind::Tables, &ctx)?],
    };

    for report in &reports {
        print_report(report);
    }

    let failed: usize = reports.iter().map(|r| r.issues.len()).sum();
    if failed > 0 {
        return Err(eyre!("{failed} issue(s) found"));
    }
    Ok(())
}

fn print_report(report: &CheckReport) {
    if report.passed() {
        println!("[{}] ok", report.kind);
    } else {
        println!("[{}] {} issue(s)", report.kind, report.issues.len());
        for issue in &report.issues {
            println!("  {issue}");
        }
    }
    for note in &report.notes {
        println!("  note: {note}");
    }
}

fn cmd_schema_regenerate(
    root: &Path,
    config: &AppConfig,
    snapshot: PathBuf,
    dataset: Option<String>,
    nav_group: String,
) -> Result<()> {
    let opts = RegenerateOptions {
        snapshot,
        dataset,
        nav_group,
    };
    let report = docsync_core::regenerate_tables(root, config, &opts)?;

    println!();
    println!("  Dataset:   {}", report.dataset);
    println!("  Updated:   {}", report.updated.len());
    println!("  Unchanged: {}", report.unchanged.len());
    println!("  Created:   {}", report.created.len());
    for (page, reason) in &report.skipped {
        println!("  Skipped:   {page} ({reason})");
    }
    println!(
        "  Nav:       {} pages{}",
        report.nav_pages,
        if report.nav_updated { ", updated" } else { "" }
    );
    println!();

    Ok(())
}

async fn cmd_entities(config: &AppConfig, partition: &str, document_id: &str) -> Result<()> {
    let api_key = resolve_api_key(&config.remote)?;
    let client = RemoteClient::new(&config.remote, api_key)?;
    let entities = client
        .list_entities_by_document(document_id, partition)
        .await?;

    info!(document_id, count = entities.len(), "fetched entities");
    println!("{}", serde_json::to_string_pretty(&entities)?);
    Ok(())
}

fn cmd_config_init(root: &Path) -> Result<()> {
    let path = init_config(root)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn action(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }

    fn done(&self, _result: &SyncResult) {
        self.spinner.finish_and_clear();
    }
}
