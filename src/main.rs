//! thermo, a daemon supervising one-wire thermometers and reporting rolling averages.
//!
//! Run with:  `RUST_LOG=info thermo [config-path]`

mod daemon;

use anyhow::{Context, Result};
use daemon::Daemon;
use std::path::PathBuf;
use thermo_config::ConfigWatcher;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging; RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("thermo v{} starting", env!("CARGO_PKG_VERSION"));

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(thermo_config::default_path);
    let config = thermo_config::load(&path).context("loading configuration")?;

    let mut daemon = Daemon::start(config).await;
    let (_watcher, mut changes) = ConfigWatcher::spawn(&path);

    let mut report = tokio::time::interval(daemon.config().global.report_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("waiting for Ctrl-C")?;
                tracing::info!("shutting down");
                break;
            }
            Some(()) = changes.recv() => match thermo_config::load(&path) {
                Ok(config) => {
                    tracing::info!("Configuration reloaded");
                    let interval = config.global.report_interval();
                    if interval != daemon.config().global.report_interval() {
                        report = tokio::time::interval(interval);
                    }
                    daemon.apply(config).await;
                }
                Err(e) => tracing::warn!("Keeping previous configuration: {e}"),
            },
            _ = report.tick() => {
                daemon
                    .report(&mut std::io::stdout().lock())
                    .context("writing report")?;
            }
        }
    }

    daemon.stop_all().await;
    Ok(())
}
