//! `rbmc-types` – shared data model for the redundant-BMC mailbox protocol.
//!
//! Everything that crosses a crate boundary lives here: the scratchpad
//! register names, masked-write operations, the role and BMC-state
//! enumerations carried on the wire, the notifications that drive the
//! orchestrator, and the [`RbmcError`] taxonomy.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of scratchpad registers exposed by the mailbox.
pub const SCRATCHPAD_REG_COUNT: u32 = 4;

/// One of the four fixed scratchpad registers in the mailbox.
///
/// Register 0 carries the packed flag word, register 1 the firmware
/// fingerprint.  Registers 2 and 3 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScratchPadReg {
    Reg0,
    Reg1,
    Reg2,
    Reg3,
}

impl ScratchPadReg {
    /// All registers in index order.
    pub const ALL: [ScratchPadReg; 4] = [
        ScratchPadReg::Reg0,
        ScratchPadReg::Reg1,
        ScratchPadReg::Reg2,
        ScratchPadReg::Reg3,
    ];

    /// Device register index (0–3).
    pub fn index(self) -> u32 {
        match self {
            ScratchPadReg::Reg0 => 0,
            ScratchPadReg::Reg1 => 1,
            ScratchPadReg::Reg2 => 2,
            ScratchPadReg::Reg3 => 3,
        }
    }
}

impl TryFrom<u32> for ScratchPadReg {
    type Error = RbmcError;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        ScratchPadReg::ALL
            .get(index as usize)
            .copied()
            .ok_or(RbmcError::InvalidRegister(index))
    }
}

impl fmt::Display for ScratchPadReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scratch{}", self.index())
    }
}

/// Register values keyed by register name, as returned by a batched read.
pub type RegMap = BTreeMap<ScratchPadReg, u32>;

/// One masked write: only the bits set in `mask` are changed in `reg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyOp {
    pub reg: ScratchPadReg,
    pub value: u32,
    pub mask: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire enumerations
// ────────────────────────────────────────────────────────────────────────────

/// Which controller currently leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Unknown,
    Active,
    Passive,
}

impl Role {
    /// Numeric value carried in the 2-bit role field.
    pub fn raw(self) -> u32 {
        match self {
            Role::Unknown => 0,
            Role::Active => 1,
            Role::Passive => 2,
        }
    }

    /// Decode a raw field value.  Values with no assigned role map to
    /// [`Role::Unknown`].
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Role::Active,
            2 => Role::Passive,
            _ => Role::Unknown,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Unknown => "Unknown",
            Role::Active => "Active",
            Role::Passive => "Passive",
        };
        f.write_str(name)
    }
}

/// Operational state of a BMC as carried in the 3-bit state field.
///
/// Only `Quiesced = 3` is confirmed against a real register dump
/// (`0x01DDFFFF`).  NotReady = 0, Ready = 1, UpdateInProgress = 2 and
/// Unknown = 7 are provisional and must be checked against the peer's
/// firmware before either side relies on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmcState {
    NotReady,
    Ready,
    UpdateInProgress,
    Quiesced,
    #[default]
    Unknown,
}

impl BmcState {
    /// Numeric value carried in the 3-bit state field.  See the type docs
    /// for which values are confirmed.
    pub fn raw(self) -> u32 {
        match self {
            BmcState::NotReady => 0,
            BmcState::Ready => 1,
            BmcState::UpdateInProgress => 2,
            BmcState::Quiesced => 3,
            BmcState::Unknown => 7,
        }
    }

    /// Decode a raw field value.  Unassigned values map to
    /// [`BmcState::Unknown`].
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => BmcState::NotReady,
            1 => BmcState::Ready,
            2 => BmcState::UpdateInProgress,
            3 => BmcState::Quiesced,
            _ => BmcState::Unknown,
        }
    }
}

impl fmt::Display for BmcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BmcState::NotReady => "NotReady",
            BmcState::Ready => "Ready",
            BmcState::UpdateInProgress => "UpdateInProgress",
            BmcState::Quiesced => "Quiesced",
            BmcState::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator inputs
// ────────────────────────────────────────────────────────────────────────────

/// Externally owned state of this BMC, as reported by the upstream provider.
///
/// Every field is optional: a provider that does not know a value leaves it
/// out and the mailbox keeps whatever it last held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmc_state: Option<BmcState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failovers_paused: Option<bool>,
}

/// A discrete event consumed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    BmcStateChanged(BmcState),
    RoleChanged(Role),
    RedundancyEnabledChanged(bool),
    FailoversPausedChanged(bool),
    /// Periodic signal to advance the local heartbeat.
    HeartbeatTick,
    /// Periodic signal to read and judge the sibling mailbox.
    SiblingPollTick,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every layer of the mailbox stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RbmcError {
    /// A device node or sysfs entry does not exist (yet).
    #[error("{} not found", path.display())]
    NotFound { path: PathBuf },

    /// Opening the device or issuing the device control call failed.
    #[error("{op} on {} failed: {}", device.display(), std::io::Error::from_raw_os_error(*code))]
    Device {
        device: PathBuf,
        op: &'static str,
        code: i32,
    },

    #[error("invalid scratchpad register {0}")]
    InvalidRegister(u32),

    /// Sibling data was requested while the most recent read had failed.
    #[error("sibling register data unavailable")]
    Unavailable,

    #[error("upstream state unavailable: {0}")]
    Upstream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("notification channel error: {0}")]
    Channel(String),
}

impl RbmcError {
    /// errno-style code for callers that branch on specific failures.
    pub fn code(&self) -> i32 {
        match self {
            RbmcError::NotFound { .. } => libc::ENOENT,
            RbmcError::Device { code, .. } => *code,
            RbmcError::InvalidRegister(_) => libc::EINVAL,
            RbmcError::Unavailable => libc::ENODATA,
            RbmcError::Upstream(_) | RbmcError::Config(_) => libc::EIO,
            RbmcError::Channel(_) => libc::EPIPE,
        }
    }

    /// `true` for conditions that clear up on their own once the hardware
    /// link trains.
    pub fn is_not_found(&self) -> bool {
        self.code() == libc::ENOENT
    }
}
