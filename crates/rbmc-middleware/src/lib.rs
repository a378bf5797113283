//! `rbmc-middleware` – event plumbing between the outside world and the
//! orchestrator.
//!
//! Every event source runs as its own task and feeds one queue; the
//! orchestrator is the single consumer, so handlers never share mutable
//! state.
//!
//! # Modules
//!
//! - [`queue`] – bounded multi-producer, single-consumer
//!   [`Notification`][rbmc_types::Notification] queue built on Tokio `mpsc`.
//! - [`ticker`] – periodic heartbeat and sibling-poll tick tasks.
//! - [`services`] – the [`LocalServices`] trait: where this BMC's externally
//!   owned state comes from.
//! - [`state_file`] – [`StateFile`]: a JSON file implementation of
//!   [`LocalServices`] plus a watcher task that turns edits into
//!   notifications.

pub mod queue;
pub mod services;
pub mod state_file;
pub mod ticker;

pub use queue::{NotificationReceiver, NotificationSender, notification_queue};
pub use services::LocalServices;
pub use state_file::StateFile;
pub use ticker::spawn_ticker;
