//! [`Application`] – the redundancy orchestrator.
//!
//! The single consumer of the notification queue.  Each notification is
//! handled to completion before the next is taken, so the local and sibling
//! halves never need locking.
//!
//! # Escalation
//!
//! A local mailbox that is not present (link not trained yet, or gone) is
//! retryable: local writes are skipped and the whole identity image is
//! published again by the first notification after the device returns.
//! Any other failed local mirror write ends [`Application::run`] with the
//! error: the register image can no longer be trusted to match reality.  A
//! failed heartbeat increment is only logged, the next tick retries it.
//! Sibling read failures feed the liveness verdict and never end the loop.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rbmc_hal::{DevicePaths, Driver, MailboxAccess};
use rbmc_middleware::{LocalServices, NotificationReceiver};
use rbmc_types::{Notification, RbmcError};
use rbmc_wire::{LocalMailbox, PollOutcome, SiblingRegisters};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::local_bmc::LocalBmc;
use crate::sibling_bmc::SiblingBmc;

/// Wiring for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    /// FSI link of this BMC's own mailbox.
    pub local_link: usize,
    /// FSI link of the sibling's mailbox.
    pub sibling_link: usize,
    pub paths: DevicePaths,
    /// os-release file holding the running firmware's `VERSION_ID`.
    pub os_release: PathBuf,
    pub missed_poll_limit: u32,
}

/// Snapshot of what this BMC knows about its sibling, published after every
/// poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiblingStatus {
    /// The liveness verdict mirrored into the sibling-comms bit.
    pub comms_ok: bool,
    /// Whether the sibling's mailbox device has been found.
    pub attached: bool,
    /// Registers from the last poll, `None` if it failed.
    pub registers: Option<SiblingRegisters>,
    pub consecutive_misses: u32,
    /// When the last poll finished; `None` before the first poll.
    pub observed_at: Option<DateTime<Utc>>,
}

pub struct Application {
    local: LocalBmc,
    sibling: SiblingBmc,
    /// Identity image written to the current local device.
    published: bool,
    status: watch::Sender<SiblingStatus>,
}

impl Application {
    pub fn new(
        config: &ApplicationConfig,
        driver: Arc<dyn Driver>,
        services: Arc<dyn LocalServices>,
    ) -> Self {
        let local_access = MailboxAccess::new(config.local_link, config.paths.clone(), driver.clone());
        let sibling_access = MailboxAccess::new(config.sibling_link, config.paths.clone(), driver);
        Self::from_parts(
            LocalBmc::new(LocalMailbox::new(local_access), services, &config.os_release),
            SiblingBmc::new(sibling_access, config.missed_poll_limit),
        )
    }

    pub fn from_parts(local: LocalBmc, sibling: SiblingBmc) -> Self {
        let (status, _) = watch::channel(SiblingStatus::default());
        Self {
            local,
            sibling,
            published: false,
            status,
        }
    }

    /// Receiver for the sibling status published after every poll.
    pub fn subscribe(&self) -> watch::Receiver<SiblingStatus> {
        self.status.subscribe()
    }

    /// Publish the initial local register image.
    ///
    /// An absent local mailbox is not an error; publication is retried on
    /// every notification until it succeeds.
    pub async fn start(&mut self) -> Result<(), RbmcError> {
        if !self.publish().await? {
            info!("local mailbox not present yet, will retry");
        }
        Ok(())
    }

    async fn publish(&mut self) -> Result<bool, RbmcError> {
        match self.local.start().await {
            Ok(()) => self.published = true,
            Err(e) if e.is_not_found() => debug!(error = %e, "local mailbox absent"),
            Err(e) => return Err(e),
        }
        Ok(self.published)
    }

    /// Whether the identity image is in the current local mailbox.
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Handle one notification.
    ///
    /// # Errors
    ///
    /// Only local mirror writes fail this call; see the module docs.
    #[instrument(skip(self), level = "debug")]
    pub async fn handle(&mut self, notification: Notification) -> Result<(), RbmcError> {
        if !self.published {
            self.publish().await?;
        }
        match notification {
            Notification::SiblingPollTick => self.poll_sibling(),
            // Publication reads the current state, so nothing is lost.
            _ if !self.published => {
                debug!("local mailbox absent, notification skipped");
                Ok(())
            }
            Notification::HeartbeatTick => {
                let result = self.local.increment_heartbeat().map(drop);
                if let Err(e) = self.tolerate_absent(result) {
                    warn!(error = %e, "heartbeat not advanced, retrying next tick");
                }
                Ok(())
            }
            change => {
                let result = self.local.apply(change);
                self.tolerate_absent(result)
            }
        }
    }

    /// Turn a vanished local device into a pending republication.
    fn tolerate_absent<T: Default>(&mut self, result: Result<T, RbmcError>) -> Result<T, RbmcError> {
        match result {
            Err(e) if e.is_not_found() => {
                warn!(error = %e, "local mailbox gone, will republish");
                self.published = false;
                Ok(T::default())
            }
            other => other,
        }
    }

    fn poll_sibling(&mut self) -> Result<(), RbmcError> {
        let outcome = self.sibling.poll();
        let alive = self.sibling.is_alive();

        if self.published {
            let result = self.local.set_sibling_comms_ok(alive);
            if self.tolerate_absent(result)? {
                if alive {
                    info!("sibling comms OK");
                } else {
                    warn!(?outcome, misses = self.sibling.consecutive_misses(), "sibling comms lost");
                }
            }
        }

        self.status.send_replace(SiblingStatus {
            comms_ok: alive,
            attached: self.sibling.is_attached(),
            registers: match outcome {
                PollOutcome::ReadFailed => None,
                _ => self.sibling.registers(),
            },
            consecutive_misses: self.sibling.consecutive_misses(),
            observed_at: Some(Utc::now()),
        });
        Ok(())
    }

    /// Handle notifications until every sender is gone or a local mirror
    /// write fails.  Call [`Application::start`] first.
    pub async fn run(mut self, mut rx: NotificationReceiver) -> Result<(), RbmcError> {
        while let Some(notification) = rx.recv().await {
            self.handle(notification).await?;
        }
        info!("notification queue closed, orchestrator stopping");
        Ok(())
    }
}
