//! [`DeviceDriver`] – scratchpad access through the FSI mailbox character
//! device.
//!
//! Each call opens the device node, issues exactly one ioctl and closes the
//! handle again when the [`File`] drops, on success and error paths alike.
//!
//! | operation | open mode | ioctl |
//! |---|---|---|
//! | [`Driver::read`] | read-only | `FSI_MBOX_READ` |
//! | [`Driver::write`] | write-only | `FSI_MBOX_WRITE` |
//! | [`Driver::write_with_mask`] | read-write | `FSI_MBOX_RMW` |

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use rbmc_types::RbmcError;
use tracing::error;

use crate::driver::{Driver, validate_reg};

// ────────────────────────────────────────────────────────────────────────────
// Kernel ABI (uapi/linux/fsi.h)
// ────────────────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Default)]
struct MboxAccess {
    reg: u32,
    data: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct MboxAccessRmw {
    access: MboxAccess,
    mask: u32,
}

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;
const FSI_IOCTL_TYPE: u8 = b's';

const fn ioc(dir: u32, nr: u8, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | ((FSI_IOCTL_TYPE as u32) << 8) | nr as u32
}

const FSI_MBOX_READ: u32 = ioc(IOC_READ | IOC_WRITE, 0x10, size_of::<MboxAccess>());
const FSI_MBOX_WRITE: u32 = ioc(IOC_WRITE, 0x11, size_of::<MboxAccess>());
const FSI_MBOX_RMW: u32 = ioc(IOC_WRITE, 0x12, size_of::<MboxAccessRmw>());

// ────────────────────────────────────────────────────────────────────────────
// DeviceDriver
// ────────────────────────────────────────────────────────────────────────────

/// Production [`Driver`] talking to `/dev/mbox-cfam-s*`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceDriver;

impl DeviceDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for DeviceDriver {
    fn read(&self, device: &Path, reg: u32) -> Result<u32, RbmcError> {
        validate_reg(reg)?;
        let file = open(device, "read", OpenOptions::new().read(true))?;

        let mut access = MboxAccess { reg, data: 0 };
        // SAFETY: `access` is a live, correctly laid out `mbox_access` for the
        // duration of the call and the fd is owned by `file`.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                FSI_MBOX_READ as libc::Ioctl,
                &mut access as *mut MboxAccess,
            )
        };
        check_ioctl(rc, device, "read")?;

        Ok(access.data)
    }

    fn write(&self, device: &Path, reg: u32, value: u32) -> Result<(), RbmcError> {
        validate_reg(reg)?;
        let file = open(device, "write", OpenOptions::new().write(true))?;

        let mut access = MboxAccess { reg, data: value };
        // SAFETY: see `read`.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                FSI_MBOX_WRITE as libc::Ioctl,
                &mut access as *mut MboxAccess,
            )
        };
        check_ioctl(rc, device, "write")
    }

    fn write_with_mask(
        &self,
        device: &Path,
        reg: u32,
        value: u32,
        mask: u32,
    ) -> Result<(), RbmcError> {
        validate_reg(reg)?;
        let file = open(
            device,
            "write_with_mask",
            OpenOptions::new().read(true).write(true),
        )?;

        let mut rmw = MboxAccessRmw {
            access: MboxAccess { reg, data: value },
            mask,
        };
        // SAFETY: see `read`.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                FSI_MBOX_RMW as libc::Ioctl,
                &mut rmw as *mut MboxAccessRmw,
            )
        };
        check_ioctl(rc, device, "write_with_mask")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn open(device: &Path, op: &'static str, options: &OpenOptions) -> Result<File, RbmcError> {
    if !device.exists() {
        error!(device = %device.display(), op, "device doesn't exist");
        return Err(RbmcError::NotFound {
            path: device.to_path_buf(),
        });
    }

    options.open(device).map_err(|e| {
        error!(device = %device.display(), op, error = %e, "opening device failed");
        device_error(device, op, &e)
    })
}

fn check_ioctl(rc: libc::c_int, device: &Path, op: &'static str) -> Result<(), RbmcError> {
    if rc < 0 {
        let e = io::Error::last_os_error();
        error!(device = %device.display(), op, error = %e, "mailbox ioctl failed");
        return Err(device_error(device, op, &e));
    }
    Ok(())
}

fn device_error(device: &Path, op: &'static str, e: &io::Error) -> RbmcError {
    RbmcError::Device {
        device: device.to_path_buf(),
        op,
        code: e.raw_os_error().unwrap_or(libc::EIO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ioctl_numbers_encode_size_and_direction() {
        assert_eq!(FSI_MBOX_READ >> 30, IOC_READ | IOC_WRITE);
        assert_eq!((FSI_MBOX_READ >> 16) & 0x3FFF, 8);
        assert_eq!((FSI_MBOX_RMW >> 16) & 0x3FFF, 12);
        assert_eq!((FSI_MBOX_WRITE >> 8) & 0xFF, b's' as u32);
    }

    #[test]
    fn missing_device_is_not_found() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("mbox-cfam-s12");
        let driver = DeviceDriver::new();

        assert_eq!(
            driver.read(&path, 0),
            Err(RbmcError::NotFound { path: path.clone() })
        );
        assert_eq!(
            driver.write(&path, 0, 0x12345678),
            Err(RbmcError::NotFound { path: path.clone() })
        );
        assert_eq!(
            driver.write_with_mask(&path, 0, 1, 1),
            Err(RbmcError::NotFound { path })
        );
    }

    #[test]
    fn invalid_register_rejected_before_open() {
        // The path does not exist, so reaching the open would yield NotFound.
        let path = Path::new("/nonexistent/mbox-cfam-s10");
        let driver = DeviceDriver::new();

        assert_eq!(driver.read(path, 4), Err(RbmcError::InvalidRegister(4)));
        assert_eq!(driver.write(path, 7, 0), Err(RbmcError::InvalidRegister(7)));
        assert_eq!(
            driver.write_with_mask(path, 4, 0, 0xFF),
            Err(RbmcError::InvalidRegister(4))
        );
    }

    #[test]
    fn ioctl_on_regular_file_reports_device_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("scratch1");
        std::fs::write(&path, 0u32.to_ne_bytes()).expect("init file");

        let driver = DeviceDriver::new();
        match driver.read(&path, 0) {
            Err(RbmcError::Device { op, code, .. }) => {
                assert_eq!(op, "read");
                assert_ne!(code, 0);
            }
            other => panic!("expected device error, got {other:?}"),
        }
    }
}
