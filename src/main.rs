//! QR check-in desk - scans a guest's QR code and shows whether they may enter
//!
//! Module structure:
//! - `domain/` - Desk states, outcomes and the transition table
//! - `io/` - External interfaces (scanner backends, verification client, journal)
//! - `services/` - Desk controller driving scan and verification effects
//! - `infra/` - Infrastructure (Config, Metrics)
//! - `ui/` - Terminal and headless frontends

use anyhow::Context;
use checkin_desk::infra::{Config, Metrics, ScannerBackend};
use checkin_desk::io::{
    keyboard_channel, HttpVerifier, KeyboardFeed, ScanSource, ScriptedScanner, SerialScanner,
    Verifier,
};
use checkin_desk::services::DeskController;
use checkin_desk::ui::terminal::ScreenInfo;
use checkin_desk::ui::{headless, terminal, Frontend};
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// QR check-in desk
#[derive(Parser, Debug)]
#[command(name = "checkin-desk", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/desk.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Line-oriented stdin/stdout frontend instead of the full-screen terminal
    #[arg(long)]
    headless: bool,
}

/// Route logs to stderr (headless) or to the desk log file (terminal UI owns the screen)
fn init_logging(headless: bool, log_file: &str) -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(UtcTime::rfc_3339())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file {}", log_file))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(UtcTime::rfc_3339())
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

fn build_scanner(config: &Config) -> (Option<KeyboardFeed>, Arc<dyn ScanSource>) {
    match config.scanner_backend() {
        ScannerBackend::Keyboard => {
            let (feed, scanner) = keyboard_channel(16);
            (Some(feed), Arc::new(scanner))
        }
        ScannerBackend::Serial => (None, Arc::new(SerialScanner::new(config))),
        ScannerBackend::Scripted => {
            let scanner = ScriptedScanner::from_codes(config.scripted_codes())
                .with_delay(config.scripted_delay());
            (None, Arc::new(scanner))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config is read before logging exists; a load failure is reported once logging is up
    let config_path = Config::resolve_config_path(args.config.as_deref());
    let (config, load_error) = Config::load_or_default(&config_path);

    init_logging(args.headless, config.log_file())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build = env!("DESK_BUILD"),
        "checkin_desk_starting"
    );
    if let Some(e) = load_error {
        warn!(
            config_file = %config_path,
            error = %format!("{:#}", e),
            "config_load_failed_using_defaults"
        );
    }

    info!(
        config_file = %config.config_file(),
        desk_id = %config.desk_id(),
        endpoint_configured = %config.endpoint().is_some(),
        scanner = %config.scanner_backend().as_str(),
        result_hold_ms = %config.result_hold().as_millis(),
        auto_arm = %config.auto_arm(),
        journal_enabled = %config.journal_enabled(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create shared components
    let metrics = Arc::new(Metrics::new());
    let (feed, scanner) = build_scanner(&config);
    let verifier: Arc<dyn Verifier> = Arc::new(HttpVerifier::new(&config));

    let controller = DeskController::new(&config, scanner, verifier, metrics.clone());
    let state_rx = controller.subscribe();
    let transitions = controller.subscribe_transitions();

    let (command_tx, command_rx) = mpsc::channel(16);
    let controller_shutdown = shutdown_rx.clone();
    let controller_handle = tokio::spawn(async move {
        controller.run(command_rx, controller_shutdown).await;
    });

    // Start metrics reporter (lock-free reads)
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
            loop {
                interval.tick().await;
                metrics_clone.report().log();
            }
        });
    }

    // Handle shutdown on Ctrl+C (the terminal UI also sees Ctrl+C as a key in raw mode)
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = signal_tx.send(true);
    });

    let frontend = Frontend::new(command_tx, feed, config.auto_arm());
    let frontend_result = if args.headless {
        headless::run(frontend, transitions, state_rx, shutdown_rx).await
    } else {
        let screen = ScreenInfo {
            desk_id: config.desk_id().to_string(),
            build: env!("DESK_BUILD").to_string(),
            metrics: metrics.clone(),
        };
        terminal::run(frontend, transitions, state_rx, screen, shutdown_rx).await
    };

    let _ = shutdown_tx.send(true);
    if let Err(e) = controller_handle.await {
        warn!(error = %e, "desk_controller_join_failed");
    }

    metrics.report().log();
    info!("checkin_desk_shutdown_complete");

    frontend_result.context("frontend failed")
}
