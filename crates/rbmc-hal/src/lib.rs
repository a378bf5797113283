//! `rbmc-hal` – scratchpad mailbox hardware access.
//!
//! # Modules
//!
//! - [`driver`] – the [`Driver`] trait: read, write and masked write of one
//!   scratchpad register on one device node.
//! - [`device`] – [`DeviceDriver`]: the production driver issuing FSI mailbox
//!   ioctls against `/dev/mbox-cfam-s*`.
//! - [`sim`] – [`SimDriver`]: an in-memory register file with fault injection
//!   and a call log, used by every test in the workspace.
//! - [`paths`] – [`DevicePaths`]: locates the device node for an FSI link by
//!   scanning the FSI master sysfs tree.
//! - [`mailbox`] – [`MailboxAccess`]: register-name keyed reads and writes on
//!   top of a [`Driver`] for one link.

pub mod device;
pub mod driver;
pub mod mailbox;
pub mod paths;
pub mod sim;

pub use device::DeviceDriver;
pub use driver::Driver;
pub use mailbox::MailboxAccess;
pub use paths::DevicePaths;
pub use sim::{DriverCall, SimDriver, SimOp};
