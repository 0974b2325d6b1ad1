//! Username Monitor Bot - Main Entry Point
//!
//! A Telegram bot that watches usernames for its subscribers and reports
//! when a username gets banned or comes back.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ban_monitor_bot::commands::CommandHandler;
use ban_monitor_bot::config::{BotSettings, TelegramConfig};
use ban_monitor_bot::health;
use ban_monitor_bot::reconciler::{PlaceholderOracle, TimeoutOracle};
use ban_monitor_bot::registry::{Registry, RegistryStore, SharedRegistry};
use ban_monitor_bot::scheduler::{self, MonitorScheduler, SchedulerMessage};
use ban_monitor_bot::telegram::{TelegramBot, UpdateRouter};

/// Telegram bot that monitors usernames for bans.
#[derive(Parser, Debug)]
#[command(name = "ban_monitor")]
#[command(about = "Watch Telegram usernames and get notified when they are banned")]
#[command(version)]
struct Args {
    /// Path to the registry JSON file (overrides DB_FILE).
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let mut settings = BotSettings::from_env_with_defaults();
    if let Some(path) = args.data {
        settings.data_path = path;
    }

    let registry = SharedRegistry::open(RegistryStore::new(&settings.data_path));
    info!(
        "Loaded {} subscribers from {}",
        registry.read(Registry::len).await,
        settings.data_path.display()
    );

    let oracle = Arc::new(TimeoutOracle::new(PlaceholderOracle, settings.oracle_timeout()));
    let telegram = Arc::new(TelegramBot::new(tg_config.bot_token.clone()));

    let handler = Arc::new(CommandHandler::new(
        registry.clone(),
        Arc::clone(&oracle),
        tg_config.owner_id,
        settings.max_usernames,
        settings.trial_days,
    ));

    let scheduler = MonitorScheduler::new(
        registry.clone(),
        oracle,
        Arc::clone(&telegram),
        settings.check_interval(),
        settings.confirm_limit,
    );

    let (scheduler_tx, scheduler_rx) = mpsc::channel::<SchedulerMessage>(8);
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_rx).await;
    });

    let health_registry = registry.clone();
    let port = settings.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port, health_registry).await {
            warn!("Liveness endpoint unavailable on port {}: {}", port, e);
        }
    });

    let router = UpdateRouter::new(Arc::clone(&telegram), handler);
    let shutdown = router.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            if let Ok(done) = shutdown.shutdown() {
                done.await;
            }
        }
    });

    info!("Starting username monitor bot (owner: {})", tg_config.owner_id);
    router.run().await;

    info!("Shutting down...");
    if !scheduler::stop(&scheduler_tx, scheduler_handle).await {
        warn!("Scheduler did not stop cleanly");
    }
    if !registry.flush().await {
        warn!("Registry could not be saved on shutdown");
    }

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
