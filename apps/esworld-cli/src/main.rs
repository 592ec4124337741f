use anyhow::Context;
use clap::{Parser, Subcommand};
use esworld_common::GlobalFormId;
use esworld_loader::{Loader, LoaderConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "esworld-cli", about = "Inspect plugin load orders and record collections")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON loader configuration (data directory, manifest name)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the manifest and print each plugin's index
    LoadOrder {
        /// Data directory holding the manifest and plugins
        data_dir: Option<PathBuf>,
    },
    /// Load every plugin and print the session report
    Load {
        data_dir: Option<PathBuf>,
    },
    /// Load every plugin and print one record as JSON
    Lookup {
        /// Global form id in hex, e.g. 0100ABCD
        form_id: GlobalFormId,
        data_dir: Option<PathBuf>,
    },
}

fn loader_config(cli_config: Option<&PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<LoaderConfig> {
    let mut config = match cli_config {
        Some(path) => LoaderConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        manifest = %config.manifest_name,
        "loader configured"
    );
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::LoadOrder { data_dir } => {
            let loader = Loader::new(loader_config(cli.config.as_ref(), data_dir)?);
            let order = loader.load_order()?;
            for plugin in order.plugins() {
                let master = if order.masters().contains(&plugin.filename) {
                    " (master)"
                } else {
                    ""
                };
                println!("{:>6}  {}{master}", plugin.index.to_string(), plugin.filename);
            }
            for rejected in order.rejected() {
                println!("rejected: {rejected}");
            }
        }
        Commands::Load { data_dir } => {
            let loader = Loader::new(loader_config(cli.config.as_ref(), data_dir)?);
            let session = loader.build_record_collection()?;
            for plugin in &session.report.loaded {
                println!(
                    "{:>6}  {:<32} records={} corrupt={} sha256={}",
                    plugin.index.to_string(),
                    plugin.filename,
                    plugin.records,
                    plugin.skipped_records,
                    plugin.sha256
                );
            }
            for skipped in &session.report.skipped {
                println!(
                    "{:>6}  {:<32} skipped: {}",
                    skipped.index.to_string(),
                    skipped.filename,
                    skipped.reason
                );
            }
            for (tag, count) in session.store.type_counts() {
                println!("{tag}: {count}");
            }
            println!("{}", session.report);
        }
        Commands::Lookup { form_id, data_dir } => {
            let loader = Loader::new(loader_config(cli.config.as_ref(), data_dir)?);
            let session = loader.build_record_collection()?;
            let record = session
                .store
                .lookup(form_id)
                .with_context(|| format!("no record with form id {form_id}"))?;
            println!("{}", serde_json::to_string_pretty(record)?);
        }
    }

    Ok(())
}
