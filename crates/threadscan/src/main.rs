//! threadscan - incremental thread search over a local mail index
//!
//! Rows go to stdout; logs go to stderr.

#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use threadscan_core::{Config, ScanError, ScanResult, SortMode, env_value};
use threadscan_store::{MailIndex, StoreError, TagCursor};
use threadscan_view::{CollectionView, ThreadDetail, ViewSettings, format_rows};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "threadscan")]
#[command(version, about = "Search a mail index thread by thread")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON index file (overrides THREADSCAN_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List matching threads, first page only
    Search(SearchArgs),

    /// Print a thread's messages as a reply tree
    Show {
        /// Thread id as printed by `search`
        thread_id: String,
    },

    /// List every tag in the index
    Tags,

    /// Show configuration
    Config,
}

#[derive(Args, Debug, Default)]
struct SearchArgs {
    /// Search expression (defaults to THREADSCAN_DEFAULT_SEARCH)
    expression: Option<String>,

    /// Rows to print
    #[arg(long)]
    rows: Option<usize>,

    /// oldest-first, newest-first, message-id or unsorted
    #[arg(long)]
    sort: Option<SortMode>,

    /// Run the search once more before printing
    #[arg(long)]
    refresh: bool,
}

fn main() {
    // clap exits with status 2 on usage errors
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        env_value("THREADSCAN_LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    tracing::debug!("Configuration loaded: {:?}", config);

    let mut stdout = io::stdout().lock();
    if let Err(err) = run(cli.command, &config, &mut stdout) {
        tracing::debug!(code = err.error_type(), "command failed");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Config, out: &mut impl Write) -> ScanResult<()> {
    match command {
        Commands::Search(args) => search(load_index(&config.database_path)?, config, &args, out),
        Commands::Show { thread_id } => {
            let index = load_index(&config.database_path)?;
            let detail = ThreadDetail::load(&index, &thread_id)?;
            for line in detail.render(Utc::now()) {
                writeln!(out, "{line}")?;
            }
            Ok(())
        }
        Commands::Tags => {
            let index = load_index(&config.database_path)?;
            let db = index.open()?;
            for tag in TagCursor::new(db.all_tags()) {
                writeln!(out, "{tag}")?;
            }
            Ok(())
        }
        Commands::Config => {
            writeln!(out, "{config:#?}")?;
            Ok(())
        }
    }
}

fn search(
    index: MailIndex,
    config: &Config,
    args: &SearchArgs,
    out: &mut impl Write,
) -> ScanResult<()> {
    let mut settings = ViewSettings::from_config(config);
    if let Some(rows) = args.rows {
        settings = settings.with_capacity(rows);
    }
    if let Some(sort) = args.sort {
        settings = settings.with_sort(sort);
    }
    let request = config.search_request(args.expression.as_deref());

    let mut view = CollectionView::open(index, settings, &request.expression)?;
    if args.refresh {
        view.refresh()?;
    }

    for line in format_rows(&view.snapshot(), 0, Utc::now()) {
        writeln!(out, "{line}")?;
    }
    for line in view.status() {
        writeln!(out, "{line}")?;
    }
    match view.failure() {
        Some(failure) => Err(ScanError::Collector(failure)),
        None => Ok(()),
    }
}

fn load_index(path: &Path) -> ScanResult<MailIndex> {
    MailIndex::load_json(path).map_err(|err| match err {
        StoreError::Io(io) => {
            ScanError::StoreUnavailable(format!("cannot read {}: {io}", path.display()))
        }
        other => other.into(),
    })
}
