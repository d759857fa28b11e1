//! greenwaked - wake-lock daemon.
//!
//! Keeps the host awake while wanted, suspends it when idle, and listens
//! for magic packets and device activity. One `--config` flag; everything
//! else lives in the YAML config.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use greenwake_common::config::Config;
use greenwake_common::event::EventType;
use greenwake_common::logging;

use greenwaked::facade::Facade;
use greenwaked::instance::InstanceLock;
use greenwaked::wakeevent::device::{self, ProbeSwitch};
use greenwaked::wakeevent::{supervise, wol};
use greenwaked::wakelock::{platform_lock, WakeLockService};

/// How long to wait for the event sources after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "greenwaked", version)]
#[command(about = "Wake-lock daemon: hold the host awake on demand, suspend it when idle")]
struct Cli {
    /// Config file path (default: the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The logger may not be up yet; stderr always is.
            eprintln!("greenwaked: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let cfg = Config::load(&config_path)?;

    logging::init(&cfg.log_level)?;
    setup_panic_hook();

    info!("[*]  greenwake-guard v{}", env!("CARGO_PKG_VERSION"));
    info!("[>]  config: {}", config_path.display());

    let mut instance_lock = InstanceLock::acquire(&Config::lock_path()?, &cfg)
        .context("single-instance check failed")?;

    let core = WakeLockService::new(platform_lock(), &cfg);
    let probe_switch = ProbeSwitch::new(cfg.valid_events().contains(&EventType::Device));
    let _facade = Facade::install(
        Arc::clone(&core),
        cfg.clone(),
        config_path.clone(),
        probe_switch.clone(),
    );

    let timed_duration = cfg.timed_duration()?;
    core.initialize_state(cfg.strategy, cfg.sleep_mode, timed_duration);

    match greenwaked::power::sleep_inhibitors() {
        Ok(report) => debug!(
            "{} sleep inhibitors active at startup",
            report.inhibitors.len()
        ),
        Err(e) => debug!("power introspection unavailable: {e:#}"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let wol_task = {
        let core = Arc::clone(&core);
        let rx = shutdown_rx.clone();
        let port = cfg.external_wake.wol_port;
        supervise("wake packet listener", shutdown_rx.clone(), move || {
            wol::run(port, Arc::clone(&core), rx.clone())
        })
    };

    let device_task = {
        let core = Arc::clone(&core);
        let switch = probe_switch.clone();
        let rx = shutdown_rx.clone();
        supervise("device activity probe", shutdown_rx.clone(), move || {
            device::run(Arc::clone(&core), switch.clone(), rx.clone())
        })
    };

    wait_for_shutdown().await;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    core.stop();

    let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = wol_task.await;
        let _ = device_task.await;
    })
    .await;
    if joined.is_err() {
        warn!("event sources did not stop within {SHUTDOWN_TIMEOUT:?}, exiting anyway");
    }

    instance_lock.release();
    info!("all services stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                error!("failed to register SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}

fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        eprintln!("[!!!]  panic at {location}: {message}");
        default_hook(panic_info);
    }));
}
