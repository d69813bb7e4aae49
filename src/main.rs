use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use cloud_explorer::app::Navigator;
use cloud_explorer::config::Config;
use cloud_explorer::services::remote::{FixtureEntry, MemoryBackend};
use cloud_explorer::services::session::RemoteSession;
use cloud_explorer::services::{log_dirs, tracing_setup};
use cloud_explorer::view::file_tree::{RemoteTree, VisibleRow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Browse a remote namespace fixture the way the explorer would
#[derive(Parser, Debug)]
#[command(name = "cloud-explorer")]
#[command(about = "Lazy remote tree and capability gating over a namespace fixture", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file (default: XDG state dir)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// JSON array of namespace entries to serve (default: a small sample)
    #[arg(long, value_name = "PATH")]
    fixture: Option<PathBuf>,

    /// Folder to expand after listing the root (repeatable, in order)
    #[arg(long, value_name = "REMOTE_PATH")]
    expand: Vec<String>,

    /// Entry to select once the tree is built
    #[arg(long, value_name = "REMOTE_PATH")]
    select: Option<String>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

const SAMPLE_FIXTURE: &str = r#"[
  {"path": "/Documents/Q3 report.docx", "kind": "file", "content": "quarterly numbers"},
  {"path": "/Documents/old-notes.rtf", "kind": "file", "deleted": true},
  {"path": "/Photos/beach.JPG", "kind": "file", "content": "not really a jpeg"},
  {"path": "/Photos/2019", "kind": "folder"},
  {"path": "/readme.txt", "kind": "file", "content": "hello"}
]"#;

fn load_config(path: Option<&Path>) -> AnyhowResult<Config> {
    match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn load_fixture(path: Option<&Path>) -> AnyhowResult<Vec<FixtureEntry>> {
    let contents = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?,
        None => SAMPLE_FIXTURE.to_string(),
    };
    serde_json::from_str(&contents).context("Failed to parse namespace fixture")
}

fn print_tree(tree: &RemoteTree) {
    for row in tree.visible_rows() {
        match row {
            VisibleRow::Node { id, depth } => {
                let Some(node) = tree.get_node(id) else {
                    continue;
                };
                let suffix = if node.is_folder() { "/" } else { "" };
                let marker = if node.is_deleted() { "  [deleted]" } else { "" };
                println!("{}{}{}{}", "  ".repeat(depth), node.name(), suffix, marker);
            }
            VisibleRow::Placeholder { depth, .. } => {
                println!("{}...", "  ".repeat(depth));
            }
        }
    }
}

async fn run(args: Args, config: Config) -> AnyhowResult<()> {
    let fixture = load_fixture(args.fixture.as_deref())?;
    let backend = Arc::new(MemoryBackend::from_fixture(&fixture).with_tombstones(true));

    let session = RemoteSession::connect(backend, config)
        .await
        .context("Failed to connect")?;
    let mut navigator = Navigator::new(session);

    let summary = navigator
        .account_summary()
        .await
        .context("Failed to fetch account")?;
    println!("{}", summary.status_line());
    println!("{}", summary.usage_line());
    println!();

    navigator
        .build_root()
        .await
        .context("Failed to list the root folder")?;
    for path in &args.expand {
        navigator
            .expand_path(path)
            .await
            .with_context(|| format!("Failed to expand {}", path))?;
    }

    print_tree(navigator.tree());

    if let Some(path) = &args.select {
        let capabilities = navigator.select_path(path);
        if navigator.selected_entry().is_none() {
            anyhow::bail!("{} is not in the loaded tree", path);
        }
        println!();
        println!("{}: {}", path, capabilities);
    }

    Ok(())
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    if args.dump_config {
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
        println!("{}", json);
        return Ok(());
    }

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(log_dirs::main_log_path);
    if !tracing_setup::init_global(&log_file, &config.logging.filter) {
        eprintln!("Warning: logging to {} is unavailable", log_file.display());
    }
    log_dirs::cleanup_stale_logs();
    tracing::info!("cloud-explorer starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(args, config))
}
