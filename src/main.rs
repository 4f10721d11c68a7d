//! find-liquor: watches the OLCC liquor search for in-stock items and
//! notifies each subscriber through their configured channels.
//!
//! Usage:
//!   find-liquor                     # run until Ctrl-C / SIGTERM
//!   find-liquor --once              # one pass for every subscriber, then exit
//!   find-liquor -c config.toml -d   # explicit config, debug logging

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use find_liquor::config::{load_config, AppConfig};
use find_liquor::scheduler::Orchestrator;

#[derive(Parser)]
#[command(
    name = "find-liquor",
    version,
    about = "Periodically search the OLCC liquor database and notify on stock"
)]
struct Cli {
    /// Config file path (TOML or JSON); falls back to $GFL_CONFIG_PATH
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single search pass and exit
    #[arg(short, long)]
    once: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

/// `RUST_LOG` wins; otherwise info, or debug with `--debug` / `verbose`.
fn init_tracing(debug: bool) {
    let default = if debug {
        "find_liquor=debug,info"
    } else {
        "find_liquor=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn log_summary(cfg: &AppConfig) {
    let settings = cfg.settings();
    info!(
        interval = ?settings.interval,
        user_agent = if settings.user_agent.is_empty() { "<rotating>" } else { settings.user_agent.as_str() },
        subscribers = cfg.subscribers.len(),
        "configuration loaded"
    );
    for sub in &cfg.subscribers {
        info!(
            subscriber = %sub.name,
            items = ?sub.terms,
            zipcode = %sub.location,
            distance = sub.radius,
            notifications = sub.notifications.len(),
            "subscriber"
        );
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // `verbose` in the config picks the log level, so tracing starts after loading.
    let cfg = match load_config(cli.config.as_deref()) {
        Ok(cfg) => {
            init_tracing(cli.debug || cfg.verbose);
            cfg
        }
        Err(e) => {
            init_tracing(cli.debug);
            error!(error = %format!("{e:#}"), "failed to load configuration");
            return Err(e);
        }
    };
    log_summary(&cfg);

    let orchestrator =
        Arc::new(Orchestrator::from_config(&cfg).context("setting up subscribers")?);
    let cancel = CancellationToken::new();

    {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown signal received");
            orchestrator.stop();
            cancel.cancel();
        });
    }

    let result = if cli.once {
        orchestrator.run_once(cancel).await
    } else {
        orchestrator.start(cancel).await
    };

    match result {
        Ok(()) => {
            info!("find-liquor finished");
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            info!("find-liquor stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "find-liquor exited with error");
            Err(e.into())
        }
    }
}
