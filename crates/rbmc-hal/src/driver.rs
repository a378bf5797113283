//! Generic `Driver` trait for scratchpad register access.
//!
//! Implementations open the device for the duration of one call only and
//! report every failure as an [`RbmcError`] value.  The rest of the stack only
//! ever talks to the trait, so the real device and the in-memory
//! [`SimDriver`][crate::sim::SimDriver] are interchangeable.

use std::path::Path;

use rbmc_types::{RbmcError, SCRATCHPAD_REG_COUNT};

/// Raw access to the four scratchpad registers behind one device node.
pub trait Driver: Send + Sync {
    /// Read scratchpad register `reg` (0–3) of `device`.
    ///
    /// # Errors
    ///
    /// * [`RbmcError::InvalidRegister`] when `reg` is out of range; the device
    ///   is not touched.
    /// * [`RbmcError::NotFound`] when the device node does not exist.
    /// * [`RbmcError::Device`] carrying the OS error code for open or ioctl
    ///   failures.
    fn read(&self, device: &Path, reg: u32) -> Result<u32, RbmcError>;

    /// Overwrite scratchpad register `reg` of `device` with `value`.
    ///
    /// # Errors
    ///
    /// Same as [`Driver::read`].
    fn write(&self, device: &Path, reg: u32, value: u32) -> Result<(), RbmcError>;

    /// Atomically replace the bits of register `reg` selected by `mask` with
    /// the corresponding bits of `value`.  Bits of `value` outside `mask` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Same as [`Driver::read`].
    fn write_with_mask(&self, device: &Path, reg: u32, value: u32, mask: u32)
    -> Result<(), RbmcError>;
}

/// Reject register indices outside `0..4`.
pub fn validate_reg(reg: u32) -> Result<(), RbmcError> {
    if reg < SCRATCHPAD_REG_COUNT {
        Ok(())
    } else {
        Err(RbmcError::InvalidRegister(reg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_register_range() {
        for reg in 0..4 {
            assert!(validate_reg(reg).is_ok());
        }
        assert_eq!(validate_reg(4), Err(RbmcError::InvalidRegister(4)));
        assert_eq!(validate_reg(u32::MAX), Err(RbmcError::InvalidRegister(u32::MAX)));
    }
}
