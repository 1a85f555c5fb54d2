//! Fieldsight Daemon - Main entry point
//!
//! Serves the viewer frontend and field assets, relays pose updates from
//! the vision pipeline to connected viewers, and persists settings.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fieldsight")]
#[command(about = "Field visualization daemon with pose relay and REST API")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fieldsight.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Fieldsight v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        fields = %config.assets.fields_path,
        web = %config.assets.web_path,
        "Configuration loaded"
    );

    // Create application state
    let state = state::AppState::new(config.clone())?;

    let bind = config.daemon.bind.clone();
    server::run(state, &bind).await
}
