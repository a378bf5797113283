//! Where this BMC's externally owned state comes from.
//!
//! The orchestrator never talks to state managers directly.  It asks a
//! [`LocalServices`] implementation for a snapshot at startup and relies on
//! the implementation's watcher task to queue a
//! [`Notification`][rbmc_types::Notification] whenever something changes.

use async_trait::async_trait;
use rbmc_types::{LocalState, RbmcError};

/// Provider of this BMC's identity and externally owned state.
///
/// # Contract
///
/// * `bmc_position` and `provisioned` are fixed for the life of the process.
///
/// * `local_state` returns the current snapshot.  Fields the provider does
///   not know are `None`; the caller leaves the matching mailbox field alone.
#[async_trait]
pub trait LocalServices: Send + Sync {
    /// Physical slot of this BMC (0 or 1).
    fn bmc_position(&self) -> u8;

    /// Whether this BMC has been provisioned for redundancy.
    fn provisioned(&self) -> bool {
        true
    }

    /// Current role, redundancy flags and BMC state.
    async fn local_state(&self) -> Result<LocalState, RbmcError>;
}
