//! [`MailboxAccess`] – register-name keyed access to one FSI link's mailbox.
//!
//! The device node is resolved lazily through [`DevicePaths`] and cached once
//! found.  Every operation is forwarded 1:1 to the [`Driver`] after the
//! register name has been translated to its index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rbmc_types::{ModifyOp, RbmcError, RegMap, ScratchPadReg};
use tracing::error;

use crate::driver::Driver;
use crate::paths::DevicePaths;

/// Where the device node comes from.
#[derive(Debug, Clone)]
enum Location {
    /// Resolved from the FSI master tree on first use.
    Link { link: usize, paths: DevicePaths },
    /// Fixed at construction.
    Fixed,
}

/// Reads and writes the four scratchpad registers of the mailbox on one link.
pub struct MailboxAccess {
    location: Location,
    device: Option<PathBuf>,
    driver: Arc<dyn Driver>,
}

impl MailboxAccess {
    /// Access the mailbox on FSI `link`, resolving its device node under
    /// `paths`.
    pub fn new(link: usize, paths: DevicePaths, driver: Arc<dyn Driver>) -> Self {
        let mut access = Self {
            location: Location::Link { link, paths },
            device: None,
            driver,
        };
        access.resolve();
        access
    }

    /// Access the mailbox behind a known device node.
    pub fn with_device(device: impl Into<PathBuf>, driver: Arc<dyn Driver>) -> Self {
        Self {
            location: Location::Fixed,
            device: Some(device.into()),
            driver,
        }
    }

    /// Whether the device node has been found.  Retries resolution if it has
    /// not been found yet.
    pub fn exists(&mut self) -> bool {
        self.resolve();
        self.device.is_some()
    }

    /// The resolved device node, if any.
    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }

    /// Read every register in `regs`.
    ///
    /// All or nothing: the first failing read aborts the batch and its error
    /// is returned; no partial map is produced.
    pub fn read_registers(&mut self, regs: &BTreeSet<ScratchPadReg>) -> Result<RegMap, RbmcError> {
        let mut values = RegMap::new();
        for &reg in regs {
            match self.read_register(reg) {
                Ok(value) => {
                    values.insert(reg, value);
                }
                Err(e) => {
                    error!(reg = %reg, error = %e, code = e.code(), "mailbox register read failed");
                    return Err(e);
                }
            }
        }
        Ok(values)
    }

    pub fn read_register(&mut self, reg: ScratchPadReg) -> Result<u32, RbmcError> {
        let device = self.device_path()?;
        self.driver.read(&device, reg.index())
    }

    pub fn write_register(&mut self, reg: ScratchPadReg, value: u32) -> Result<(), RbmcError> {
        let device = self.device_path()?;
        self.driver.write(&device, reg.index(), value)
    }

    /// Apply one masked write.
    pub fn write_register_masked(&mut self, op: &ModifyOp) -> Result<(), RbmcError> {
        let device = self.device_path()?;
        self.driver
            .write_with_mask(&device, op.reg.index(), op.value, op.mask)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ────────────────────────────────────────────────────────────────────────

    fn resolve(&mut self) {
        if self.device.is_some() {
            return;
        }
        if let Location::Link { link, paths } = &self.location {
            self.device = paths.find_device(*link);
        }
    }

    fn device_path(&mut self) -> Result<PathBuf, RbmcError> {
        self.resolve();
        match (&self.device, &self.location) {
            (Some(device), _) => Ok(device.clone()),
            (None, Location::Link { link, paths }) => Err(RbmcError::NotFound {
                path: paths.expected_location(*link),
            }),
            (None, Location::Fixed) => Err(RbmcError::NotFound {
                path: PathBuf::new(),
            }),
        }
    }
}
