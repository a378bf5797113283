//! Daemon configuration – reads `/etc/rbmc-cfamd/config.toml`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rbmc_hal::DevicePaths;
use rbmc_hal::paths::{DEFAULT_DEVICE_DIR, DEFAULT_FSI_MASTER_DIR};
use rbmc_runtime::{ApplicationConfig, BmcIdentity};
use rbmc_types::RbmcError;
use rbmc_wire::fingerprint::OS_RELEASE;
use serde::{Deserialize, Serialize};

/// Default config location, overridden by `RBMC_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rbmc-cfamd/config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// FSI link of this BMC's own mailbox.
    pub local_link: usize,
    /// FSI link of the sibling's mailbox.
    pub sibling_link: usize,
    /// Physical slot of this BMC (0 or 1).
    pub bmc_position: u8,
    pub provisioned: bool,

    pub fsi_master_dir: PathBuf,
    pub device_dir: PathBuf,
    pub os_release: PathBuf,

    pub heartbeat_interval_ms: u64,
    pub sibling_poll_interval_ms: u64,
    /// Bad sibling polls tolerated in a row before comms are declared lost.
    pub missed_poll_limit: u32,

    /// JSON file carrying role, redundancy flags and BMC state.
    pub state_file: PathBuf,
    pub state_poll_interval_ms: u64,

    /// Where to write the sibling status after every poll; unset disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_link: 0,
            sibling_link: 1,
            bmc_position: 0,
            provisioned: true,
            fsi_master_dir: PathBuf::from(DEFAULT_FSI_MASTER_DIR),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            os_release: PathBuf::from(OS_RELEASE),
            heartbeat_interval_ms: 1000,
            sibling_poll_interval_ms: 5000,
            missed_poll_limit: 0,
            state_file: PathBuf::from("/run/rbmc/local-state.json"),
            state_poll_interval_ms: 1000,
            status_file: None,
        }
    }
}

impl Config {
    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), RbmcError> {
        if self.bmc_position > 1 {
            return Err(RbmcError::Config(format!(
                "bmc_position must be 0 or 1, got {}",
                self.bmc_position
            )));
        }
        if self.local_link == self.sibling_link {
            return Err(RbmcError::Config(format!(
                "local_link and sibling_link are both {}",
                self.local_link
            )));
        }
        for (name, ms) in [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("sibling_poll_interval_ms", self.sibling_poll_interval_ms),
            ("state_poll_interval_ms", self.state_poll_interval_ms),
        ] {
            if ms == 0 {
                return Err(RbmcError::Config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn sibling_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sibling_poll_interval_ms)
    }

    pub fn state_poll_interval(&self) -> Duration {
        Duration::from_millis(self.state_poll_interval_ms)
    }

    pub fn application_config(&self) -> ApplicationConfig {
        ApplicationConfig {
            local_link: self.local_link,
            sibling_link: self.sibling_link,
            paths: DevicePaths::new(&self.fsi_master_dir, &self.device_dir),
            os_release: self.os_release.clone(),
            missed_poll_limit: self.missed_poll_limit,
        }
    }

    /// Tags exported spans with this BMC's slot and links.
    pub fn bmc_identity(&self) -> BmcIdentity {
        BmcIdentity {
            bmc_position: self.bmc_position,
            local_link: self.local_link,
            sibling_link: self.sibling_link,
        }
    }
}

/// Path of the config file: `RBMC_CONFIG` or [`DEFAULT_CONFIG_PATH`].
pub fn config_path() -> PathBuf {
    std::env::var_os("RBMC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the config file, apply `RBMC_*` overrides and validate.
pub fn load() -> Result<Config, RbmcError> {
    let mut cfg = load_from(&config_path())?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config from a specific path.  A missing file yields defaults.
pub(crate) fn load_from(path: &Path) -> Result<Config, RbmcError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RbmcError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map_err(|e| RbmcError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply `RBMC_*` environment variable overrides to `cfg`.
///
/// Every key has a variable named after it in upper case, e.g.
/// `RBMC_SIBLING_POLL_INTERVAL_MS`.  Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(&format!("RBMC_{}", key.to_ascii_uppercase()));

    override_parsed(&mut cfg.local_link, var("local_link"));
    override_parsed(&mut cfg.sibling_link, var("sibling_link"));
    override_parsed(&mut cfg.bmc_position, var("bmc_position"));
    override_parsed(&mut cfg.provisioned, var("provisioned"));
    override_parsed(&mut cfg.fsi_master_dir, var("fsi_master_dir"));
    override_parsed(&mut cfg.device_dir, var("device_dir"));
    override_parsed(&mut cfg.os_release, var("os_release"));
    override_parsed(&mut cfg.heartbeat_interval_ms, var("heartbeat_interval_ms"));
    override_parsed(&mut cfg.sibling_poll_interval_ms, var("sibling_poll_interval_ms"));
    override_parsed(&mut cfg.missed_poll_limit, var("missed_poll_limit"));
    override_parsed(&mut cfg.state_file, var("state_file"));
    override_parsed(&mut cfg.state_poll_interval_ms, var("state_poll_interval_ms"));
    if let Some(path) = var("status_file") {
        cfg.status_file = (!path.is_empty()).then(|| PathBuf::from(path));
    }
}

fn override_parsed<T: FromStr>(slot: &mut T, value: Option<String>) {
    if let Some(parsed) = value.and_then(|v| v.parse().ok()) {
        *slot = parsed;
    }
}
