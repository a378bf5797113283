//! [`DevicePaths`] – FSI link to mailbox device node resolution.
//!
//! The FSI master exposes one directory per link:
//!
//! ```text
//! <fsi_master_dir>/fsi<L>/slave@00:00/<LL>:00:00:13/mbox-cfam-s<N>
//! ```
//!
//! The entry starting with `mbox-cfam-s` names the character device of the
//! same name under `<device_dir>`.

use std::path::PathBuf;

use tracing::{debug, error};

/// Default sysfs directory of the FSI master.
pub const DEFAULT_FSI_MASTER_DIR: &str = "/sys/class/fsi-master";

/// Default directory holding the device nodes.
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

const MAILBOX_PREFIX: &str = "mbox-cfam-s";

/// Root directories used when locating mailbox devices.  Both are
/// configurable so tests can point them at a temporary tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    pub fsi_master_dir: PathBuf,
    pub device_dir: PathBuf,
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            fsi_master_dir: PathBuf::from(DEFAULT_FSI_MASTER_DIR),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
        }
    }
}

impl DevicePaths {
    pub fn new(fsi_master_dir: impl Into<PathBuf>, device_dir: impl Into<PathBuf>) -> Self {
        Self {
            fsi_master_dir: fsi_master_dir.into(),
            device_dir: device_dir.into(),
        }
    }

    /// The sysfs directory that holds the mailbox entry for `link`.
    pub fn link_dir(&self, link: usize) -> PathBuf {
        self.fsi_master_dir
            .join(format!("fsi{link}"))
            .join("slave@00:00")
            .join(format!("{link:02}:00:00:13"))
    }

    /// Find the device node of the mailbox on `link`.
    ///
    /// Returns `None` while the link is not trained or the tree cannot be
    /// read; callers treat that as "not yet available".
    pub fn find_device(&self, link: usize) -> Option<PathBuf> {
        let dir = self.link_dir(link);
        if !dir.exists() {
            debug!(path = %dir.display(), "link directory doesn't exist");
            return None;
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(path = %dir.display(), error = %e, "failure iterating link directory");
                return None;
            }
        };

        entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name())
            .find(|name| name.to_string_lossy().starts_with(MAILBOX_PREFIX))
            .map(|name| self.device_dir.join(name))
    }

    /// Device node path for `link` as it would be resolved; used in error
    /// reports when resolution fails.
    pub fn expected_location(&self, link: usize) -> PathBuf {
        self.link_dir(link).join(format!("{MAILBOX_PREFIX}*"))
    }
}

/// Create the sysfs and `/dev` entries for `link` under `paths`, as the
/// kernel does once the link trains.  Returns the device node path.
///
/// Intended for tests and simulation setups.
pub fn create_fake_link(paths: &DevicePaths, link: usize) -> std::io::Result<PathBuf> {
    let dir = paths.link_dir(link);
    std::fs::create_dir_all(&dir)?;
    let name = format!("{MAILBOX_PREFIX}1{link}");
    std::fs::write(dir.join(&name), b"")?;
    std::fs::create_dir_all(&paths.device_dir)?;
    let device = paths.device_dir.join(&name);
    std::fs::write(&device, b"")?;
    Ok(device)
}
