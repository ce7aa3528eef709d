//! rollstats server - campaign roll log, sheets and statistics.

use anyhow::Result;
use clap::Parser;
use rollstats_core::{relay, LogSink};
use rollstats_server::{app, config::Config, logging, state::AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use logging::{LogConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "rollstats-server")]
#[command(about = "Roll log, character sheets and statistics for tabletop campaigns")]
#[command(version)]
struct Cli {
    /// Path to config file (defaults to $ROLLSTATS_CONFIG, then config/default.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging (INFO level for every target)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g. "relay=debug").
    /// Can be repeated. Targets are prefixed with "rollstats::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    tracing::info!(
        target: "rollstats::startup",
        "Loaded configuration (root: {}, port: {})",
        config.root_dir.display(),
        config.port
    );

    // No chat client ships with the server; the relay logs what it would post.
    let relay = if config.relay.enabled {
        let (handle, worker) = relay::channel(config.relay.settings());
        tokio::spawn(worker.run(LogSink::default()));
        tracing::info!(target: "rollstats::startup", "Started roll relay");
        Some(handle)
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config, relay)?);
    tracing::info!(
        target: "rollstats::startup",
        "Opened roll store and sheets under {}",
        state.config.root_dir.display()
    );

    tracing::info!(target: "rollstats::startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
