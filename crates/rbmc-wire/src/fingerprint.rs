//! Firmware version fingerprint for register 1.
//!
//! The fingerprint is the first four bytes (big-endian) of the SHA-512
//! digest of the running image's `VERSION_ID`.  It only answers "same
//! version or not" and is not meant to be turned back into a string.

use std::path::Path;

use rbmc_types::RbmcError;
use sha2::{Digest, Sha512};

/// Default location of the os-release file.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Read `VERSION_ID` from an os-release file.
///
/// # Errors
///
/// [`RbmcError::NotFound`] if the file is missing, [`RbmcError::Upstream`]
/// if it cannot be read or has no `VERSION_ID`.
pub fn version_id(os_release: &Path) -> Result<String, RbmcError> {
    let contents = std::fs::read_to_string(os_release).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RbmcError::NotFound {
                path: os_release.to_path_buf(),
            }
        } else {
            RbmcError::Upstream(format!("reading {}: {e}", os_release.display()))
        }
    })?;

    parse_version_id(&contents).ok_or_else(|| {
        RbmcError::Upstream(format!("no VERSION_ID in {}", os_release.display()))
    })
}

/// Extract the `VERSION_ID` value from os-release contents, without quotes.
pub fn parse_version_id(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("VERSION_ID="))
        .map(|value| value.trim_matches(|c| c == '"' || c == '\''))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Truncated SHA-512 of `version_id`.
pub fn fingerprint(version_id: &str) -> u32 {
    let digest = Sha512::digest(version_id.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
