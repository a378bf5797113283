//! `rbmc-cfamd` – redundant BMC mailbox daemon.
//!
//! This binary:
//!
//! 1. Loads `/etc/rbmc-cfamd/config.toml` (or `RBMC_CONFIG`), with `RBMC_*`
//!    overrides.
//! 2. Publishes this BMC's register image into its CFAM mailbox.
//! 3. Advances the heartbeat and polls the sibling's mailbox on timers,
//!    mirroring local state changes from the state file as they happen.
//! 4. Exits cleanly on SIGINT/SIGTERM, or with an error if the local mailbox
//!    can no longer be written.  A local mailbox that has not appeared yet is
//!    waited for, not treated as an error.

mod config;
mod status;

use std::process::ExitCode;
use std::sync::Arc;

use rbmc_hal::{DeviceDriver, Driver};
use rbmc_middleware::queue::DEFAULT_CAPACITY;
use rbmc_middleware::{StateFile, notification_queue, spawn_ticker};
use rbmc_runtime::{Application, init_tracing};
use rbmc_types::{Notification, RbmcError};
use tracing::{error, info, warn};

use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            let _guard = init_tracing("rbmc-cfamd", None);
            error!(error = %e, path = %config::config_path().display(), "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let _guard = init_tracing("rbmc-cfamd", Some(cfg.bmc_identity()));

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, code = e.code(), "rbmc-cfamd exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<(), RbmcError> {
    info!(path = %config::config_path().display(), config = ?cfg, "configuration loaded");

    let driver: Arc<dyn Driver> = Arc::new(DeviceDriver::new());
    let services = Arc::new(StateFile::new(&cfg.state_file, cfg.bmc_position, cfg.provisioned));
    let (tx, rx) = notification_queue(DEFAULT_CAPACITY);

    // Read before publication; the watcher reports anything newer.
    let baseline = services.load().await.unwrap_or_default();
    let mut tasks = vec![services.clone().spawn_watcher(
        baseline,
        tx.clone(),
        cfg.state_poll_interval(),
    )];

    let mut app = Application::new(&cfg.application_config(), driver, services);
    if let Some(path) = cfg.status_file.clone() {
        tasks.push(tokio::spawn(status::publish(app.subscribe(), path)));
    }
    app.start().await?;

    tasks.push(spawn_ticker(tx.clone(), cfg.heartbeat_interval(), Notification::HeartbeatTick));
    tasks.push(spawn_ticker(tx, cfg.sibling_poll_interval(), Notification::SiblingPollTick));

    let result = tokio::select! {
        result = app.run(rx) => result,
        () = shutdown_signal() => {
            info!("shutdown requested");
            Ok(())
        }
    };

    for task in tasks {
        task.abort();
    }
    result
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, only Ctrl-C stops the daemon");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Ctrl-C handler unavailable");
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    // A failed Ctrl-C handler disables that branch only.
    tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
