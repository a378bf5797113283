//! Sibling status file for the failover policy.

use std::path::{Path, PathBuf};

use rbmc_runtime::SiblingStatus;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Write every published [`SiblingStatus`] to `path` as JSON until the
/// orchestrator goes away.
pub async fn publish(mut rx: watch::Receiver<SiblingStatus>, path: PathBuf) {
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        match write(&path, &status).await {
            Ok(()) => debug!(path = %path.display(), comms_ok = status.comms_ok, "status file updated"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write status file"),
        }
    }
}

/// Replace `path` atomically so readers never see a partial document.
pub async fn write(path: &Path, status: &SiblingStatus) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(status)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}
