//! rsv-gateway: Recurring Reservation Gateway Main Binary
//!
//! Main entry point for the recurring reservation gateway.
//!
//! Usage:
//!   rsv-gateway                    - Start the HTTP API server
//!   rsv-gateway --preview <file>   - Preview one request and print it as JSON
//!   rsv-gateway --help             - Show help

use std::sync::Arc;

use anyhow::Context;
use rsv_api::AppState;
use rsv_core::{AvailabilityBackend, Config, RecurrenceSpec};
use rsv_engine::{AvailabilityChecker, AvailabilitySource, HttpAvailabilitySource, PreviewAssembler, SharedStore};
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// HTTP API server
    Server,
    /// One-shot preview of a request file
    Preview(String),
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Parsed command line
#[derive(Debug, PartialEq, Eq)]
struct Args {
    mode: RunMode,
    config_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    match args.mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("rsv-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging (stderr, so --preview output stays pipeable)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match &args.config_path {
        Some(path) => Config::from_toml_file(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting rsv-gateway...");
    tracing::info!("Database: {}", config.database.db_path);

    let store = SharedStore::open(&config.database.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open booking store: {}", e))?;
    let checker = AvailabilityChecker::new(availability_source(&config, &store)?);
    tracing::info!("Availability source: {}", checker.source_name());

    match args.mode {
        RunMode::Preview(path) => run_preview(&config, checker, &path).await,
        RunMode::Server => run_server(config, store, checker).await,
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut mode = RunMode::Server;
    let mut config_path = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--preview" | "-p" => {
                let path = args.next().context("--preview requires a request file")?;
                mode = RunMode::Preview(path);
            }
            "--config" => {
                config_path = Some(args.next().context("--config requires a file path")?);
            }
            "--help" | "-h" => mode = RunMode::Help,
            "--version" | "-v" => mode = RunMode::Version,
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(Args { mode, config_path })
}

/// Print help message
fn print_help() {
    println!("rsv-gateway - Recurring Reservation Gateway");
    println!();
    println!("Usage:");
    println!("  rsv-gateway                   Start the HTTP API server");
    println!("  rsv-gateway --preview <file>  Preview the request in <file> (TOML) and print JSON");
    println!("  rsv-gateway --config <file>   Use <file> instead of ./rsv-gateway.toml");
    println!("  rsv-gateway --help            Show this help message");
    println!("  rsv-gateway --version         Show version");
    println!();
    println!("Environment Variables:");
    println!("  API_PORT                     HTTP API port (default: 3000)");
    println!("  DB_PATH                      SQLite database (default: data/rsv-gateway.db)");
    println!("  PREVIEW_WINDOW_SIZE          Concurrent checks per window (default: 7)");
    println!("  PREVIEW_WINDOW_PAUSE_MS      Pause between windows (default: 200)");
    println!("  AVAILABILITY_TIMEOUT_MS      Per-check timeout (default: 5000)");
    println!("  PREVIEW_TTL_SECS             Max preview age at commit (default: 900)");
    println!("  COMMIT_RECHECK_AVAILABILITY  Re-check each occurrence at commit (default: false)");
    println!("  AVAILABILITY_BACKEND         local or http (default: local)");
    println!("  AVAILABILITY_BASE_URL        Booking backend URL (http backend)");
    println!("  AVAILABILITY_API_TOKEN       Bearer token for the booking backend");
    println!("  RUST_LOG                     Log filter (default: info)");
}

/// Pick the availability source named in the configuration
fn availability_source(config: &Config, store: &SharedStore) -> anyhow::Result<Arc<dyn AvailabilitySource>> {
    match config.availability.backend {
        AvailabilityBackend::Local => Ok(Arc::new(store.clone())),
        AvailabilityBackend::Http => {
            let source = HttpAvailabilitySource::from_config(&config.availability)
                .map_err(|e| anyhow::anyhow!("Failed to create availability client: {}", e))?;
            Ok(Arc::new(source))
        }
    }
}

/// Preview a single request file and print the result
async fn run_preview(config: &Config, checker: AvailabilityChecker, path: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let spec: RecurrenceSpec = toml::from_str(&content).with_context(|| format!("Failed to parse {}", path))?;

    let assembler = PreviewAssembler::from_config(checker, &config.preview);
    let today = chrono::Local::now().date_naive();
    let preview = assembler
        .preview(&spec, today)
        .await
        .map_err(|e| anyhow::anyhow!("Preview failed: {}", e))?;

    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

/// Run server mode
async fn run_server(config: Config, store: SharedStore, checker: AvailabilityChecker) -> anyhow::Result<()> {
    let state = AppState::new(config, store, checker);
    let api_port = state.config.api.port;

    let handle = tokio::spawn(async move {
        if let Err(e) = rsv_api::start_server(state).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    tracing::info!("HTTP API server started on port {}", api_port);

    tracing::info!("rsv-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    handle.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_is_server() {
        let parsed = parse_args(args(&[])).unwrap();
        assert_eq!(parsed.mode, RunMode::Server);
        assert_eq!(parsed.config_path, None);
    }

    #[test]
    fn test_preview_with_config() {
        let parsed = parse_args(args(&["--config", "alt.toml", "--preview", "weekly.toml"])).unwrap();
        assert_eq!(parsed.mode, RunMode::Preview("weekly.toml".to_string()));
        assert_eq!(parsed.config_path.as_deref(), Some("alt.toml"));
    }

    #[test]
    fn test_missing_values_and_unknown_flags() {
        assert!(parse_args(args(&["--preview"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--cli"])).is_err());
        assert_eq!(parse_args(args(&["-h"])).unwrap().mode, RunMode::Help);
    }

    #[test]
    fn test_request_file_format() {
        let spec: RecurrenceSpec = toml::from_str(
            r#"
            scenarioId = 4
            pattern = "MONTHLY"
            startDate = "2030-01-01"
            endDate = "2030-06-30"
            startTime = "09:00:00"
            endTime = "10:30:00"
            dayOfMonth = 31
            "#,
        )
        .unwrap();
        assert_eq!(spec.day_of_month, Some(31));
        assert_eq!(spec.repeat_interval, 1);
        assert_eq!(rsv_core::enumerate(&spec).len(), 3);
    }
}
