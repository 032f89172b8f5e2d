//! edge-bot: Deribit/Polymarket probability-arbitrage bot.
//!
//! Usage:
//!   edge-bot [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>     Config file path (default: config/bot.toml)
//!   -l, --log-level <LVL>   Log level override: trace|debug|info|warn|error
//!   -o, --output <FILE>     Decision log CSV path override
//!   --live                  Disable dry-trade mode

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use edge_bot::api::{DeribitClient, LiveQuoteSource, PolymarketClient};
use edge_bot::config::BotConfig;
use edge_bot::engine::Engine;
use edge_bot::session::reconcile::SnapshotWriter;
use edge_bot::strategy::recorder::CsvRecorder;

/// CLI arguments for edge-bot.
#[derive(Parser, Debug)]
#[command(name = "edge-bot")]
#[command(about = "Deribit/Polymarket probability-arbitrage bot")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/bot.toml")]
    config: PathBuf,

    /// Log level override: trace|debug|info|warn|error
    #[arg(short, long)]
    log_level: Option<String>,

    /// Decision log CSV path override
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable dry-trade mode (recommendations are marked live)
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    // Configuration errors are fatal before the first tick runs.
    let mut config = BotConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    config.apply_env_overrides();
    config.apply_cli_overrides(
        args.log_level,
        args.output,
        if args.live { Some(false) } else { None },
    );
    config.validate().context("Configuration validation failed")?;

    // Initialize logging
    let log_level = match config.general.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    info!("Starting edge-bot");
    info!(
        events = config.events.len(),
        check_interval_secs = config.general.check_interval_secs,
        reconcile_interval_secs = config.reconcile.interval_secs,
        dry_trade = config.general.dry_trade,
        "configuration loaded"
    );

    // Wire the external collaborators.
    let deribit = DeribitClient::new(config.general.deribit_url.clone());
    let polymarket = PolymarketClient::new(config.general.polymarket_url.clone());
    let source = Arc::new(LiveQuoteSource::new(deribit, polymarket));

    let sink = Arc::new(
        CsvRecorder::open(&config.general.output_csv).with_context(|| {
            format!(
                "Failed to open decision log at {:?}",
                config.general.output_csv
            )
        })?,
    );
    let snapshots = SnapshotWriter::open(&config.general.pnl_csv).with_context(|| {
        format!("Failed to open P&L snapshot log at {:?}", config.general.pnl_csv)
    })?;

    let engine = Engine::new(config, source, sink, Some(snapshots));

    tokio::select! {
        _ = engine.run() => {}
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
