//! Courier - XML folder watcher and uploader
//!
//! Entry point for the courier service.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use courier::config::AuthConfig;
use courier::observability::init_tracing;
use courier::pipeline::Pipeline;
use courier::{Config, Result};

/// Courier - watches a folder for XML files and uploads them to an API
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, env = "COURIER_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Folder to watch for XML files
    #[arg(short, long, env = "COURIER_WATCH_FOLDER")]
    watch_folder: Option<std::path::PathBuf>,

    /// Upload endpoint URL
    #[arg(short, long, env = "COURIER_API_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token for the upload endpoint
    #[arg(long, env = "COURIER_API_TOKEN")]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COURIER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging output
    #[arg(long, env = "COURIER_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // CLI and environment override the file.
    if let Some(folder) = cli.watch_folder {
        config.watch_folder = folder;
    }
    if let Some(endpoint) = cli.endpoint {
        config.api.endpoint = endpoint;
    }
    if let Some(token) = cli.token {
        config.api.auth = AuthConfig::Bearer { token };
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.log_json {
        config.logging.json = true;
    }

    init_tracing(&config.logging.level, config.logging.json);

    tracing::info!("Courier v{} starting...", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        watch_folder = %config.watch_folder.display(),
        endpoint = %config.api.endpoint,
        patterns = ?config.processing.patterns,
        max_concurrent = config.service.max_concurrent_uploads,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(config)?;
    let cancel = pipeline.cancel_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            cancel.cancel();
        }
    });

    pipeline.run().await
}
