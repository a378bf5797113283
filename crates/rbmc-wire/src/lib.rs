//! `rbmc-wire` – the scratchpad wire protocol.
//!
//! The two BMCs never talk to each other except through their mailboxes.
//! This crate owns the bit layout of those mailboxes and the rule that turns
//! a sequence of sibling reads into a liveness verdict.
//!
//! # Modules
//!
//! - [`fields`] – the shift/mask table for every field and the pure
//!   [`encode`][fields::encode] / [`decode`][fields::decode] functions.
//!   [`RegisterImage`][fields::RegisterImage] is the decoded view of
//!   register 0.
//! - [`local`] – [`LocalMailbox`][local::LocalMailbox]: write-only publisher
//!   of this BMC's fields, one masked write per field.
//! - [`sibling`] – [`SiblingMailbox`][sibling::SiblingMailbox]: batched reader
//!   of the sibling's registers that refuses to hand out data from a failed
//!   read.
//! - [`liveness`] – [`HeartbeatMonitor`][liveness::HeartbeatMonitor]: judges
//!   sibling liveness from heartbeat progression across polls.
//! - [`fingerprint`] – firmware version fingerprint for register 1.

pub mod fields;
pub mod fingerprint;
pub mod liveness;
pub mod local;
pub mod sibling;

pub use fields::{Field, RegisterImage};
pub use liveness::{HeartbeatMonitor, PollOutcome};
pub use local::LocalMailbox;
pub use sibling::{SiblingMailbox, SiblingRegisters};

/// Protocol version written into the api-version field.
pub const API_VERSION: u8 = 0x01;
