//! store-relay - Deduplicating relay for store-page screenshots
//!
//! Watches a Telegram chat for screenshots of online store pages, reads the
//! store name from each one and relays only stores that were not seen before.

mod analysis;
mod config;
mod pipeline;
mod storage;
mod telegram;
mod vision;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::pipeline::{log_outcome, DisabledRelay, InboundImage, Outcome, Pipeline, Relay};
use crate::storage::StoreDatabase;
use crate::telegram::{BotHost, TelegramClient, TelegramRelay};

/// Number of records `stats` lists
const RECENT_LIMIT: usize = 10;

/// store-relay - Relay each store screenshot only once
#[derive(Parser, Debug)]
#[command(name = "store-relay")]
#[command(about = "Relays store-page screenshots, skipping stores already seen")]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run every step except relaying and recording
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the Telegram bot
    Run,
    /// Run the pipeline on local screenshots
    Process {
        /// Image files to process in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Check whether a store name is already known
    Check {
        /// Store name as it appears on the page
        name: String,
    },
    /// Show processed store statistics
    Stats,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if let Command::InitConfig { force } = args.command {
        return init_config(&config_path, force);
    }

    let mut config = load_or_create_config(&config_path, args.config.is_some())?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if args.dry_run {
        config.general.dry_run = true;
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.general.log_level))
        .context("Invalid log level")?;
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    config.validate_common()?;

    match args.command {
        Command::Run => run_bot(&config),
        Command::Process { images } => process_images(config, &images),
        Command::Check { name } => check_name(&config, &name),
        Command::Stats => show_stats(&config),
        Command::InitConfig { .. } => Ok(()),
    }
}

fn default_config_path() -> Result<PathBuf> {
    Ok(storage::get_config_dir()?.join("config.toml"))
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config(path: &Path, explicit: bool) -> Result<AppConfig> {
    if path.exists() {
        return config::load_config(path).with_context(|| format!("Failed to load configuration from {:?}", path));
    }
    if explicit {
        bail!("Configuration file {:?} does not exist", path);
    }
    Ok(AppConfig::default())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    config::save_config(&AppConfig::default(), path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn open_database(config: &AppConfig) -> Result<StoreDatabase> {
    let path = &config.storage.database_path;
    let database = StoreDatabase::open(path)
        .with_context(|| format!("Failed to open store database {:?}", path))?
        .with_threshold(config.pipeline.fuzzy_threshold);
    info!("Using store database {:?}", path);
    Ok(database)
}

/// Run the Telegram bot until Ctrl-C
fn run_bot(config: &AppConfig) -> Result<()> {
    info!("store-relay starting...");
    let recognizer = vision::build_recognizer(&config.recognizer);
    let database = open_database(config)?;

    let host = BotHost::start(config, recognizer, database)?;
    host.run()?;

    info!("store-relay shutdown complete");
    Ok(())
}

/// Run local files through the pipeline
fn process_images(mut config: AppConfig, images: &[PathBuf]) -> Result<()> {
    let relay: Box<dyn Relay> = match (&config.telegram.bot_token, &config.telegram.target_chat) {
        (Some(_), Some(target)) => {
            let client = Arc::new(TelegramClient::new(&config.telegram)?);
            Box::new(TelegramRelay::new(client, target.clone(), None))
        }
        _ => {
            if !config.general.dry_run {
                warn!("No Telegram target configured, running in dry-run mode");
                config.general.dry_run = true;
            }
            Box::new(DisabledRelay)
        }
    };

    let recognizer = vision::build_recognizer(&config.recognizer);
    let database = open_database(&config)?;
    let pipeline = Pipeline::new(recognizer, relay, database, config.pipeline_config());

    let mut relayed = 0;
    let mut failed = 0;
    for path in images {
        let image = InboundImage::new(path, None);
        let outcome = pipeline.process_image(&image);
        log_outcome(&image, &outcome);

        match outcome {
            Ok(outcome) => {
                if matches!(outcome, Outcome::Relayed { .. } | Outcome::WouldRelay { .. }) {
                    relayed += 1;
                }
                println!("{}: {}", path.display(), outcome);
            }
            Err(e) => {
                failed += 1;
                println!("{}: error: {}", path.display(), e);
            }
        }
    }

    let stats = pipeline.database().get_stats()?;
    println!(
        "Processed {} image(s): {} new, {} failed, {} store(s) in history",
        images.len(),
        relayed,
        failed,
        stats.total_stores
    );
    Ok(())
}

fn check_name(config: &AppConfig, name: &str) -> Result<()> {
    let database = open_database(config)?;
    let display = analysis::normalize_display(name);

    match database.is_duplicate(&display)? {
        Some(found) => println!(
            "'{}' is a duplicate of '{}' (record {}, {:.1}% similar)",
            display, found.display_name, found.id, found.similarity
        ),
        None => println!("'{}' is new", display),
    }
    Ok(())
}

fn show_stats(config: &AppConfig) -> Result<()> {
    let database = open_database(config)?;
    let stats = database.get_stats()?;
    println!("Total stores processed: {}", stats.total_stores);

    let recent = database.recent_stores(RECENT_LIMIT)?;
    if !recent.is_empty() {
        println!("Most recent:");
        for record in recent {
            println!(
                "  [{}] {} ({}){}",
                record.id,
                record.display_name,
                record.created_at,
                record
                    .relay_ref
                    .map(|id| format!(" -> message {id}"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}
