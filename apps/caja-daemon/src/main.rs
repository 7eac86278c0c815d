//! # Caja Daemon
//!
//! Runs the automation loop against the configured SQLite database until
//! interrupted.
//!
//! ```text
//! caja-daemon [--config <path>] [--write-config]
//!
//!   --config, -c     caja.toml to load (default: platform config dir)
//!   --write-config   write the effective configuration and exit
//! ```
//!
//! Log level comes from `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use caja_db::{Database, DbConfig};
use caja_scheduler::{CajaService, SchedulerConfig, TracingEmitter};

struct Args {
    config: Option<PathBuf>,
    write_config: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        write_config: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--write-config" => args.write_config = true,
            "--help" | "-h" => {
                println!("Usage: caja-daemon [--config <path>] [--write-config]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = parse_args()?;

    let config = SchedulerConfig::load(args.config.clone()).context("loading configuration")?;
    if args.write_config {
        config.save(args.config).context("writing configuration")?;
        return Ok(());
    }

    info!(
        database = %config.database.path.display(),
        tick_secs = config.scheduler.tick_interval_secs,
        timezone = %config.defaults.timezone,
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await
    .context("opening database")?;

    let autostart = config.scheduler.autostart;
    let service = CajaService::builder(config)
        .with_database(db.clone())
        .with_emitter(Arc::new(TracingEmitter))
        .build()
        .context("building scheduler")?;

    if autostart {
        service.start_automation().await.context("starting automation")?;
    } else {
        info!("Autostart disabled; automation loop idle");
    }

    let shutdown = CancellationToken::new();
    let watchdog = service.watchdog().spawn(shutdown.clone());

    shutdown_signal().await;

    shutdown.cancel();
    if let Err(e) = watchdog.await {
        warn!(error = %e, "Watchdog task ended abnormally");
    }
    service.stop_automation().await;
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping scheduler...");
}
