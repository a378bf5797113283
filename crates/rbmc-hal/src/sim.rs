//! In-memory simulation driver for tests and CI without FSI hardware.
//!
//! [`SimDriver`] keeps a four-register file per device path, applies masked
//! writes exactly like the hardware does, records every call that reaches a
//! device, and can be told to fail specific operations with a chosen errno.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use rbmc_hal::{Driver, SimDriver, SimOp};
//!
//! let sim = SimDriver::new();
//! let dev = Path::new("/dev/mbox-cfam-s10");
//! sim.add_device(dev, [0xFFFF_0000, 0, 0, 0]);
//!
//! sim.write_with_mask(dev, 0, 0x0000_00AA, 0x0000_00FF).unwrap();
//! assert_eq!(sim.read(dev, 0).unwrap(), 0xFFFF_00AA);
//!
//! sim.inject_fault(dev, 1, SimOp::Read, libc::EIO);
//! assert!(sim.read(dev, 1).is_err());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rbmc_types::RbmcError;

use crate::driver::{Driver, validate_reg};

/// Operation selector for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Read,
    Write,
    WriteWithMask,
}

impl SimOp {
    fn name(self) -> &'static str {
        match self {
            SimOp::Read => "read",
            SimOp::Write => "write",
            SimOp::WriteWithMask => "write_with_mask",
        }
    }
}

/// One call that reached a simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Read {
        device: PathBuf,
        reg: u32,
    },
    Write {
        device: PathBuf,
        reg: u32,
        value: u32,
    },
    WriteWithMask {
        device: PathBuf,
        reg: u32,
        value: u32,
        mask: u32,
    },
}

/// A simulated mailbox driver.  Always consistent, never touches the OS.
#[derive(Debug, Default)]
pub struct SimDriver {
    devices: Mutex<HashMap<PathBuf, [u32; 4]>>,
    faults: Mutex<HashMap<(PathBuf, u32, SimOp), i32>>,
    calls: Mutex<Vec<DriverCall>>,
}

impl SimDriver {
    /// Create a driver with no devices.  Every access fails with
    /// [`RbmcError::NotFound`] until [`SimDriver::add_device`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `device` present with the given initial register contents.
    pub fn add_device(&self, device: impl Into<PathBuf>, regs: [u32; 4]) {
        lock(&self.devices).insert(device.into(), regs);
    }

    /// Remove `device`, as if the link went down.
    pub fn remove_device(&self, device: &Path) {
        lock(&self.devices).remove(device);
    }

    /// Current register contents of `device`.
    pub fn registers(&self, device: &Path) -> Option<[u32; 4]> {
        lock(&self.devices).get(device).copied()
    }

    /// Overwrite one register without recording a call, e.g. to emulate the
    /// peer writing its own mailbox.
    pub fn set_register(&self, device: &Path, reg: u32, value: u32) {
        if let Some(regs) = lock(&self.devices).get_mut(device)
            && let Some(slot) = regs.get_mut(reg as usize)
        {
            *slot = value;
        }
    }

    /// Make every `op` on (`device`, `reg`) fail with `code` until cleared.
    pub fn inject_fault(&self, device: &Path, reg: u32, op: SimOp, code: i32) {
        lock(&self.faults).insert((device.to_path_buf(), reg, op), code);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    /// Calls that reached a device, oldest first.
    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    // Records the call, then applies the fault table and device lookup.
    fn access<T>(
        &self,
        device: &Path,
        reg: u32,
        op: SimOp,
        call: DriverCall,
        apply: impl FnOnce(&mut [u32; 4]) -> T,
    ) -> Result<T, RbmcError> {
        validate_reg(reg)?;
        let mut devices = lock(&self.devices);
        let Some(regs) = devices.get_mut(device) else {
            return Err(RbmcError::NotFound {
                path: device.to_path_buf(),
            });
        };
        lock(&self.calls).push(call);

        if let Some(code) = lock(&self.faults).get(&(device.to_path_buf(), reg, op)) {
            return Err(RbmcError::Device {
                device: device.to_path_buf(),
                op: op.name(),
                code: *code,
            });
        }

        Ok(apply(regs))
    }
}

impl Driver for SimDriver {
    fn read(&self, device: &Path, reg: u32) -> Result<u32, RbmcError> {
        let call = DriverCall::Read {
            device: device.to_path_buf(),
            reg,
        };
        self.access(device, reg, SimOp::Read, call, |regs| regs[reg as usize])
    }

    fn write(&self, device: &Path, reg: u32, value: u32) -> Result<(), RbmcError> {
        let call = DriverCall::Write {
            device: device.to_path_buf(),
            reg,
            value,
        };
        self.access(device, reg, SimOp::Write, call, |regs| {
            regs[reg as usize] = value;
        })
    }

    fn write_with_mask(
        &self,
        device: &Path,
        reg: u32,
        value: u32,
        mask: u32,
    ) -> Result<(), RbmcError> {
        let call = DriverCall::WriteWithMask {
            device: device.to_path_buf(),
            reg,
            value,
            mask,
        };
        self.access(device, reg, SimOp::WriteWithMask, call, |regs| {
            let current = regs[reg as usize];
            regs[reg as usize] = (current & !mask) | (value & mask);
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> PathBuf {
        PathBuf::from("/dev/mbox-cfam-s10")
    }

    #[test]
    fn unknown_device_is_not_found() {
        let sim = SimDriver::new();
        assert_eq!(
            sim.read(&device(), 0),
            Err(RbmcError::NotFound { path: device() })
        );
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn write_then_read() {
        let sim = SimDriver::new();
        sim.add_device(device(), [0; 4]);

        sim.write(&device(), 2, 0x12345678).unwrap();
        assert_eq!(sim.read(&device(), 2).unwrap(), 0x12345678);
        assert_eq!(sim.calls().len(), 2);
    }

    #[test]
    fn masked_write_only_touches_masked_bits() {
        let sim = SimDriver::new();
        let before = 0xA5A5_5A5A;
        sim.add_device(device(), [before, 0, 0, 0]);

        let mask = 0x00FF_FF00;
        sim.write_with_mask(&device(), 0, 0xFFFF_FFFF, mask).unwrap();

        let after = sim.registers(&device()).unwrap()[0];
        assert_eq!(after & !mask, before & !mask);
        assert_eq!(after & mask, mask);
    }

    #[test]
    fn invalid_register_does_not_reach_device() {
        let sim = SimDriver::new();
        sim.add_device(device(), [0; 4]);

        assert_eq!(sim.read(&device(), 4), Err(RbmcError::InvalidRegister(4)));
        assert_eq!(
            sim.write_with_mask(&device(), 5, 1, 1),
            Err(RbmcError::InvalidRegister(5))
        );
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn injected_fault_fails_only_that_operation() {
        let sim = SimDriver::new();
        sim.add_device(device(), [1, 2, 3, 4]);
        sim.inject_fault(&device(), 1, SimOp::Read, libc::EIO);

        assert_eq!(sim.read(&device(), 0).unwrap(), 1);
        match sim.read(&device(), 1) {
            Err(RbmcError::Device { code, op, .. }) => {
                assert_eq!(code, libc::EIO);
                assert_eq!(op, "read");
            }
            other => panic!("expected device error, got {other:?}"),
        }
        assert!(sim.write(&device(), 1, 9).is_ok());

        sim.clear_faults();
        assert_eq!(sim.read(&device(), 1).unwrap(), 9);
    }
}
