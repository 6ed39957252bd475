//! rpc-dispatch daemon.
//!
//! Loads a TOML configuration, publishes its static node list to the
//! balancer, keeps it in sync with the file, and closes every connection
//! pool on SIGINT/SIGTERM.

use std::path::PathBuf;
use clap::Parser;
use rpc_dispatch::config::{load_config, ConfigWatcher};
use rpc_dispatch::lifecycle::{wait_for_signal, Runtime};
use rpc_dispatch::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "rpc-dispatch")]
#[command(about = "Client-side RPC dispatch daemon", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "dispatch.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-dispatch starting");
    tracing::info!(
        path = ?cli.config,
        strategies = ?config.balancer.strategies,
        nodes = config.nodes.len(),
        max_capacity = config.pool.max_capacity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let (watcher, mut updates) = ConfigWatcher::new(&cli.config);
    let runtime = Runtime::start(config.clone())?;

    // Keep the watcher alive for the lifetime of the process.
    let _watcher = match watcher.with_current(config).run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };

    let signal = wait_for_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                let events = runtime.reload(new_config);
                tracing::info!(events, "Applied configuration update");
            }
            _ = &mut signal => break,
        }
    }

    runtime.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
