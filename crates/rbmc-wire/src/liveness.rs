//! [`HeartbeatMonitor`] – sibling liveness from heartbeat progression.
//!
//! The sibling increments an 8-bit counter in its mailbox.  Its absolute
//! value means nothing; what matters is whether it moved between two polls.
//! Each poll is fed to [`HeartbeatMonitor::observe`] as either the decoded
//! heartbeat or `None` for a failed read.
//!
//! A poll is *good* when the read succeeded and the counter differs from the
//! last successfully read value.  Everything else is a miss.  The verdict
//! turns true on the first good poll and false once more than
//! `allowed_misses` misses happened in a row.  With `allowed_misses == 0` the
//! verdict is exactly "last read succeeded and the heartbeat advanced".
//!
//! # Example
//!
//! ```
//! use rbmc_wire::liveness::{HeartbeatMonitor, PollOutcome};
//!
//! let mut monitor = HeartbeatMonitor::new(0);
//! assert_eq!(monitor.observe(Some(7)), PollOutcome::FirstSample);
//! assert!(!monitor.is_alive());
//!
//! assert_eq!(monitor.observe(Some(8)), PollOutcome::Advanced);
//! assert!(monitor.is_alive());
//!
//! assert_eq!(monitor.observe(Some(8)), PollOutcome::Stalled);
//! assert!(!monitor.is_alive());
//! ```

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Classification of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// First successful read; there is nothing to compare against yet.
    FirstSample,
    /// The heartbeat changed since the last successful read.
    Advanced,
    /// The read succeeded but the heartbeat did not move.
    Stalled,
    /// The read failed.
    ReadFailed,
}

impl PollOutcome {
    fn is_good(self) -> bool {
        self == PollOutcome::Advanced
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HeartbeatMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Tracks the sibling's heartbeat across polls and keeps the liveness
/// verdict.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    allowed_misses: u32,
    /// Heartbeat from the last successful read; survives failed reads.
    last_heartbeat: Option<u8>,
    consecutive_misses: u32,
    alive: bool,
}

impl HeartbeatMonitor {
    /// Create a monitor that tolerates `allowed_misses` bad polls in a row
    /// before declaring the sibling dead.  Starts out not alive.
    pub fn new(allowed_misses: u32) -> Self {
        Self {
            allowed_misses,
            last_heartbeat: None,
            consecutive_misses: 0,
            alive: false,
        }
    }

    /// Feed one poll result and update the verdict.
    pub fn observe(&mut self, heartbeat: Option<u8>) -> PollOutcome {
        let outcome = match (heartbeat, self.last_heartbeat) {
            (None, _) => PollOutcome::ReadFailed,
            (Some(_), None) => PollOutcome::FirstSample,
            (Some(now), Some(before)) if now != before => PollOutcome::Advanced,
            (Some(_), Some(_)) => PollOutcome::Stalled,
        };
        if heartbeat.is_some() {
            self.last_heartbeat = heartbeat;
        }

        if outcome.is_good() {
            self.consecutive_misses = 0;
            self.alive = true;
        } else {
            self.consecutive_misses = self.consecutive_misses.saturating_add(1);
            if self.consecutive_misses > self.allowed_misses {
                self.alive = false;
            }
        }
        outcome
    }

    /// Current liveness verdict.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Number of bad polls since the last good one.
    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn last_heartbeat(&self) -> Option<u8> {
        self.last_heartbeat
    }
}
