//! Runtime configuration daemon.
//!
//! Loads engine settings, seeds the store from an optional configuration
//! file, watches it for changes, and serves until interrupted.

use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use runtime_config::observability::{logging, metrics};
use runtime_config::reload::{FileSource, SourceLoader};
use runtime_config::settings::{load_settings, EngineSettings};
use runtime_config::EngineContext;

#[derive(Parser, Debug)]
#[command(name = "runtime-config", version, about = "Live runtime configuration engine")]
struct Args {
    /// Engine settings file (TOML). Defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Configuration file to load at startup and watch for changes.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level override; falls back to the settings value.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => EngineSettings::default(),
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&settings.observability.log_level);
    logging::init_logging(log_level);

    tracing::info!("runtime-config v0.1.0 starting");

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let initial = match &args.config {
        Some(path) => FileSource::new(path).load().await?,
        None => json!({}),
    };

    let mut builder = EngineContext::builder(settings).initial_config(initial);
    if let Some(path) = &args.config {
        builder = builder.watch_file("primary", path);
    }
    let ctx = builder.build();

    ctx.start().await?;

    let stats = ctx.store.statistics();
    tracing::info!(
        snapshots = stats.snapshot_count,
        flags = ctx.flags.flag_count(),
        watching = ctx.reload.is_running(),
        "Engine ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    ctx.stop();
    if let Err(e) = ctx.cache.persist_to_disk().await {
        tracing::warn!(error = %e, "Final cache flush failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
