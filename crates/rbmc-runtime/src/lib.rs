//! `rbmc-runtime` – the redundancy orchestrator.
//!
//! Ties the wire codecs to the event plumbing: local state changes are
//! mirrored into this BMC's mailbox, heartbeat ticks advance its counter, and
//! sibling poll ticks read the peer's mailbox and publish a liveness verdict.
//!
//! # Modules
//!
//! - [`local_bmc`] – [`LocalBmc`]: startup publication and mirroring of the
//!   local register image.
//! - [`sibling_bmc`] – [`SiblingBmc`]: lazy attach to the peer's mailbox and
//!   heartbeat-based liveness.
//! - [`application`] – [`Application`]: the single consumer of the
//!   notification queue, publishing a [`SiblingStatus`] after every poll.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber, exporting spans tagged with the
//!   [`BmcIdentity`] when an OTLP collector is configured.

pub mod application;
pub mod local_bmc;
pub mod sibling_bmc;
pub mod telemetry;

pub use application::{Application, ApplicationConfig, SiblingStatus};
pub use local_bmc::LocalBmc;
pub use sibling_bmc::SiblingBmc;
pub use telemetry::{BmcIdentity, LogFormat, TracerProviderGuard, init_tracing};
