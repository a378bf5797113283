//! [`StateFile`] – local state published as a JSON document on disk.
//!
//! Whatever manages role, redundancy and BMC state writes a file such as
//!
//! ```json
//! { "bmc_state": "ready", "role": "active", "redundancy_enabled": true }
//! ```
//!
//! and [`StateFile::spawn_watcher`] polls it, queueing one notification per
//! field that changed.  A missing file is normal while the writer is still
//! starting and is not treated as an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rbmc_types::{LocalState, Notification, RbmcError};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::queue::NotificationSender;
use crate::services::LocalServices;

/// JSON state file plus this BMC's fixed identity.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
    bmc_position: u8,
    provisioned: bool,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>, bmc_position: u8, provisioned: bool) -> Self {
        Self {
            path: path.into(),
            bmc_position,
            provisioned,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file.
    ///
    /// # Errors
    ///
    /// [`RbmcError::NotFound`] if the file does not exist,
    /// [`RbmcError::Upstream`] if it cannot be read or parsed.
    pub async fn load(&self) -> Result<LocalState, RbmcError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RbmcError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                RbmcError::Upstream(format!("reading {}: {e}", self.path.display()))
            }
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| RbmcError::Upstream(format!("parsing {}: {e}", self.path.display())))
    }

    /// Spawn a task that re-reads the file every `period` and queues a
    /// notification for each field that differs from the last state seen,
    /// starting from `baseline`.
    ///
    /// Pass the state read before the local mailbox was published, so an
    /// edit landing after that read is still reported.  A field that
    /// disappears from the file is not reported; the mailbox keeps its last
    /// value.  The task ends when the queue is closed.
    pub fn spawn_watcher(
        self: Arc<Self>,
        baseline: LocalState,
        tx: NotificationSender,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = baseline;

            loop {
                ticks.tick().await;
                let current = match self.load().await {
                    Ok(state) => state,
                    Err(e) if e.is_not_found() => {
                        debug!(path = %self.path.display(), "state file absent");
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "ignoring unreadable state file");
                        continue;
                    }
                };

                for notification in changes(&last, &current) {
                    info!(?notification, "local state changed");
                    if tx.send(notification).await.is_err() {
                        debug!("state file watcher stopping, queue closed");
                        return;
                    }
                }
                last = current;
            }
        })
    }
}

#[async_trait]
impl LocalServices for StateFile {
    fn bmc_position(&self) -> u8 {
        self.bmc_position
    }

    fn provisioned(&self) -> bool {
        self.provisioned
    }

    async fn local_state(&self) -> Result<LocalState, RbmcError> {
        self.load().await
    }
}

/// Notifications for every field that is present in `after` and differs
/// from `before`.
pub fn changes(before: &LocalState, after: &LocalState) -> Vec<Notification> {
    let mut out = Vec::new();
    if let Some(state) = after.bmc_state.filter(|s| before.bmc_state != Some(*s)) {
        out.push(Notification::BmcStateChanged(state));
    }
    if let Some(role) = after.role.filter(|r| before.role != Some(*r)) {
        out.push(Notification::RoleChanged(role));
    }
    if let Some(enabled) = after
        .redundancy_enabled
        .filter(|e| before.redundancy_enabled != Some(*e))
    {
        out.push(Notification::RedundancyEnabledChanged(enabled));
    }
    if let Some(paused) = after
        .failovers_paused
        .filter(|p| before.failovers_paused != Some(*p))
    {
        out.push(Notification::FailoversPausedChanged(paused));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::notification_queue;
    use rbmc_types::{BmcState, Role};

    fn write(path: &Path, json: &str) {
        std::fs::write(path, json).expect("write state file");
    }

    #[test]
    fn changes_reports_only_differences() {
        let before = LocalState {
            bmc_state: Some(BmcState::NotReady),
            role: Some(Role::Passive),
            redundancy_enabled: Some(true),
            failovers_paused: None,
        };
        let after = LocalState {
            bmc_state: Some(BmcState::Ready),
            role: Some(Role::Passive),
            redundancy_enabled: None,
            failovers_paused: Some(true),
        };
        assert_eq!(
            changes(&before, &after),
            vec![
                Notification::BmcStateChanged(BmcState::Ready),
                Notification::FailoversPausedChanged(true),
            ]
        );
        assert!(changes(&after, &after).is_empty());
    }

    #[tokio::test]
    async fn load_distinguishes_missing_and_malformed() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let file = StateFile::new(dir.path().join("state.json"), 1, true);

        assert!(file.load().await.unwrap_err().is_not_found());

        write(file.path(), "{ not json");
        assert!(matches!(file.load().await, Err(RbmcError::Upstream(_))));

        write(file.path(), r#"{ "role": "passive", "redundancy_enabled": false }"#);
        let state = file.local_state().await.unwrap();
        assert_eq!(state.role, Some(Role::Passive));
        assert_eq!(state.redundancy_enabled, Some(false));
        assert_eq!(file.bmc_position(), 1);
        assert!(file.provisioned());
    }

    #[tokio::test]
    async fn watcher_reports_edits_made_after_baseline() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("state.json");
        write(&path, r#"{ "role": "passive", "bmc_state": "not_ready" }"#);

        let file = Arc::new(StateFile::new(&path, 0, true));
        let baseline = file.load().await.unwrap();
        // Edited before the watcher has run at all.
        write(&path, r#"{ "role": "active", "bmc_state": "not_ready" }"#);

        let (tx, mut rx) = notification_queue(8);
        let handle = file.spawn_watcher(baseline, tx, Duration::from_millis(10));

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification in time");
        assert_eq!(got, Some(Notification::RoleChanged(Role::Active)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), None);

        handle.abort();
    }

    #[tokio::test]
    async fn watcher_tolerates_missing_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("state.json");

        let (tx, mut rx) = notification_queue(8);
        let handle = Arc::new(StateFile::new(&path, 0, true)).spawn_watcher(
            LocalState::default(),
            tx,
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.try_recv(), None);

        write(&path, r#"{ "redundancy_enabled": true }"#);
        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification in time");
        assert_eq!(got, Some(Notification::RedundancyEnabledChanged(true)));

        handle.abort();
    }
}
