//! # Folder Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e override da CLI
//! - Costruzione dei collaboratori (state store, asset store, provider)
//!
//! ## Sottocomandi:
//! - `run`: Esegue un run del task (no-op se disabilitato)
//! - `report`: Stampa il report degli audit log del provider
//! - `status`: Stato dell'account e della quota della API key
//! - `register`: Registra file nell'asset store (tutte le immagini nuove se
//!   non viene passato nessun path)
//! - `enable` / `disable`: Modificano il flag operativo del task
//!
//! ## Exit code:
//! Un errore fatale del run (provider, credenziale mancante) termina il
//! processo con exit code 2, senza alcun passo successivo.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! SP_APIKEY=... folder-optimizer --root /srv/assets run --progress
//! folder-optimizer --root /srv/assets report --json
//! folder-optimizer --root /srv/assets register --publish
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use folder_optimizer::{
    file_manager::FileManager, json_output::JsonMessage, AssetStoreRepairer, CommandProvider, Config,
    FolderTask, FsAssetStore, MemoryStateStore, OptimizeError, ReportAggregator, SiteConfigStore,
};

#[derive(Parser)]
#[command(name = "folder-optimizer")]
#[command(about = "Optimize an asset folder through an external provider and repair the asset store")]
struct Args {
    /// Configuration file (JSON); missing file means defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder to optimize, overrides the configuration
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the folder task once
    Run {
        /// Show a progress bar while repairing
        #[arg(long)]
        progress: bool,

        /// Emit the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the provider's audit log report
    Report {
        /// One JSON object per row
        #[arg(long)]
        json: bool,
    },

    /// Show the account and quota status of the API key
    Status {
        /// Emit the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add files to the asset store; without paths, every image not yet known
    Register {
        /// Files to register, absolute or relative to the root
        paths: Vec<PathBuf>,

        /// Publish the registered entries
        #[arg(long)]
        publish: bool,
    },

    /// Allow scheduled runs
    Enable,

    /// Make runs exit without doing anything
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(root) = args.root {
        config.root_folder = Some(root);
    }
    config.validate()?;

    match args.command {
        Command::Run { progress, json } => run(config, progress, json).await,
        Command::Report { json } => report(&config.root_folder(), json).await,
        Command::Status { json } => status(config, json).await,
        Command::Register { paths, publish } => register(&config, &paths, publish).await,
        Command::Enable => set_disabled(&config, false).await,
        Command::Disable => set_disabled(&config, true).await,
    }
}

/// Log a fatal error and terminate immediately
fn exit_fatal(e: &OptimizeError, json: bool) -> ! {
    error!("{}", e);
    if json {
        JsonMessage::Error {
            message: e.to_string(),
            fatal: true,
        }
        .emit();
    }
    std::process::exit(2);
}

fn site_config(config: &Config) -> Result<Arc<SiteConfigStore>> {
    Ok(Arc::new(SiteConfigStore::new(&config.state_dir()?, &config.root_folder())))
}

async fn run(config: Config, progress: bool, json: bool) -> Result<()> {
    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(e) => exit_fatal(&e, json),
    };

    let site_config = site_config(&config)?;
    let provider = CommandProvider::new(&config.provider_command, config.provider_options.clone(), api_key)
        .with_leading_args(config.provider_args.clone());

    let root = config.root_folder();
    let store = Arc::new(FsAssetStore::open(&root, &config.asset_manifest()).await?);
    let repairer = Arc::new(AssetStoreRepairer::new(store));

    let task = FolderTask::new(config, provider, site_config.clone(), repairer)
        .with_site_config(site_config)
        .with_progress(progress);

    if !task.is_enabled().await? {
        info!("Folder task is disabled, nothing to do.");
        return Ok(());
    }

    match task.run().await {
        Ok(summary) => {
            info!(
                "Run finished: {} succeeded, {} pending, {} failed, {} same",
                summary.succeeded, summary.pending, summary.failed, summary.same
            );
            if json {
                JsonMessage::Complete(&summary).emit();
            }
            Ok(())
        }
        Err(e) if e.is_fatal() => exit_fatal(&e, json),
        Err(e) => Err(e.into()),
    }
}

async fn status(config: Config, json: bool) -> Result<()> {
    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(e) => exit_fatal(&e, json),
    };

    let provider = CommandProvider::new(&config.provider_command, config.provider_options.clone(), api_key)
        .with_leading_args(config.provider_args.clone());
    let root = config.root_folder();
    let store = Arc::new(FsAssetStore::open(&root, &config.asset_manifest()).await?);
    let task = FolderTask::new(
        config,
        provider,
        Arc::new(MemoryStateStore::default()),
        Arc::new(AssetStoreRepairer::new(store)),
    );

    let api_status = match task.api_status().await {
        Ok(api_status) => api_status,
        Err(e) if e.is_fatal() => exit_fatal(&e, json),
        Err(e) => return Err(e.into()),
    };

    if json {
        JsonMessage::ApiStatus(&api_status).emit();
    } else {
        for line in api_status.lines() {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn register(config: &Config, paths: &[PathBuf], publish: bool) -> Result<()> {
    let store = FsAssetStore::open(&config.root_folder(), &config.asset_manifest()).await?;

    if paths.is_empty() {
        let added = store.register_missing(publish).await?;
        info!("Registered {} new files", added.len());
        return Ok(());
    }

    for path in paths {
        let entry = store.register_path(path, publish).await?;
        info!("Registered {} ({})", entry.filename, entry.file_hash);
    }
    Ok(())
}

async fn set_disabled(config: &Config, disabled: bool) -> Result<()> {
    let site_config = site_config(config)?;
    site_config.set_task_disabled(disabled).await?;
    info!(
        "Folder task {} ({})",
        if disabled { "disabled" } else { "enabled" },
        site_config.path().display()
    );
    Ok(())
}

async fn report(root: &Path, json: bool) -> Result<()> {
    let rows = ReportAggregator::build(root).await;

    if json {
        for row in &rows {
            JsonMessage::ReportRow(row).emit();
        }
        return Ok(());
    }

    println!("{:<19}  {:<60}  {:<8}  {:>7}", "Date", "File", "Status", "Percent");
    let mut saved = 0u64;
    for row in &rows {
        println!(
            "{:<19}  {:<60}  {:<8}  {:>6.2}%",
            row.date_nice, row.record.file_path, row.record.status, row.record.percent
        );
        saved += row.record.original_size.saturating_sub(row.record.optimized_size);
    }
    println!("{} records, {} saved", rows.len(), FileManager::format_size(saved));

    Ok(())
}
