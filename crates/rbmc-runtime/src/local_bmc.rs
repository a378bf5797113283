//! [`LocalBmc`] – this BMC's side of the mailbox.
//!
//! Publishes the identity fields once at startup, mirrors upstream state
//! changes as they arrive, and owns the heartbeat counter and the
//! sibling-comms bit.

use std::path::PathBuf;
use std::sync::Arc;

use rbmc_middleware::LocalServices;
use rbmc_types::{LocalState, Notification, RbmcError};
use rbmc_wire::{API_VERSION, LocalMailbox, fingerprint};
use tracing::{debug, info, warn};

pub struct LocalBmc {
    mailbox: LocalMailbox,
    services: Arc<dyn LocalServices>,
    os_release: PathBuf,
    /// Sibling-comms value last written; `None` until the first write.
    sibling_comms_ok: Option<bool>,
}

impl LocalBmc {
    pub fn new(
        mailbox: LocalMailbox,
        services: Arc<dyn LocalServices>,
        os_release: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mailbox,
            services,
            os_release: os_release.into(),
            sibling_comms_ok: None,
        }
    }

    /// Publish the full local register image.
    ///
    /// Order: API version, firmware fingerprint, position, provisioned,
    /// sibling comms (false), redundancy fields, BMC state.  Missing firmware
    /// version or upstream state are logged and skipped; any mailbox write
    /// failure is returned.  Safe to call again after the device has been
    /// replaced; every field is rewritten.
    pub async fn start(&mut self) -> Result<(), RbmcError> {
        self.sibling_comms_ok = None;
        self.mailbox.write_api_version(API_VERSION)?;

        match fingerprint::version_id(&self.os_release) {
            Ok(version) => {
                let fp = fingerprint::fingerprint(&version);
                info!(%version, fingerprint = format_args!("{fp:#010x}"), "publishing firmware fingerprint");
                self.mailbox.write_fw_version(fp)?;
            }
            Err(e) => warn!(error = %e, "firmware version unknown, register 1 left unchanged"),
        }

        let position = self.services.bmc_position();
        self.mailbox.write_bmc_position(position)?;
        self.mailbox.write_provisioned(self.services.provisioned())?;
        self.set_sibling_comms_ok(false)?;

        let state = match self.services.local_state().await {
            Ok(state) => state,
            Err(e) => {
                info!(error = %e, "local state not available yet, keeping defaults");
                LocalState::default()
            }
        };
        self.publish_redundancy(&state)?;
        if let Some(bmc_state) = state.bmc_state {
            self.mailbox.write_bmc_state(bmc_state)?;
        }

        info!(position, ?state, "local mailbox initialised");
        Ok(())
    }

    fn publish_redundancy(&mut self, state: &LocalState) -> Result<(), RbmcError> {
        if let Some(role) = state.role {
            self.mailbox.write_role(role)?;
        }
        if let Some(enabled) = state.redundancy_enabled {
            self.mailbox.write_redundancy_enabled(enabled)?;
        }
        self.mailbox
            .write_failovers_paused(state.failovers_paused.unwrap_or(false))
    }

    /// Mirror one upstream change into the mailbox.  Tick notifications are
    /// ignored here.
    pub fn apply(&mut self, notification: Notification) -> Result<(), RbmcError> {
        match notification {
            Notification::BmcStateChanged(state) => {
                info!(%state, "mirroring BMC state");
                self.mailbox.write_bmc_state(state)
            }
            Notification::RoleChanged(role) => {
                info!(%role, "mirroring role");
                self.mailbox.write_role(role)
            }
            Notification::RedundancyEnabledChanged(enabled) => {
                info!(enabled, "mirroring redundancy enabled");
                self.mailbox.write_redundancy_enabled(enabled)
            }
            Notification::FailoversPausedChanged(paused) => {
                info!(paused, "mirroring failovers paused");
                self.mailbox.write_failovers_paused(paused)
            }
            Notification::HeartbeatTick | Notification::SiblingPollTick => Ok(()),
        }
    }

    pub fn increment_heartbeat(&mut self) -> Result<u8, RbmcError> {
        let heartbeat = self.mailbox.increment_heartbeat()?;
        debug!(heartbeat, "heartbeat advanced");
        Ok(heartbeat)
    }

    /// Write the sibling-comms bit if it differs from the last value written.
    /// Returns whether a write happened.
    pub fn set_sibling_comms_ok(&mut self, ok: bool) -> Result<bool, RbmcError> {
        if self.sibling_comms_ok == Some(ok) {
            return Ok(false);
        }
        self.mailbox.write_sibling_comms_ok(ok)?;
        self.sibling_comms_ok = Some(ok);
        Ok(true)
    }

    pub fn sibling_comms_ok(&self) -> Option<bool> {
        self.sibling_comms_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::FakeServices;
    use rbmc_hal::{DriverCall, MailboxAccess, SimDriver, SimOp};
    use rbmc_types::{BmcState, Role};
    use rbmc_wire::fields::{Field, encode};
    use rbmc_wire::{RegisterImage, fingerprint::fingerprint};
    use std::path::Path;

    const DEVICE: &str = "/dev/mbox-cfam-s10";

    fn setup(services: FakeServices, os_release: &Path) -> (LocalBmc, Arc<SimDriver>) {
        let sim = Arc::new(SimDriver::new());
        sim.add_device(DEVICE, [0; 4]);
        let mailbox = LocalMailbox::new(MailboxAccess::with_device(DEVICE, sim.clone()));
        (LocalBmc::new(mailbox, Arc::new(services), os_release), sim)
    }

    fn masked(field: Field, value: u32) -> DriverCall {
        let op = encode(field, value);
        DriverCall::WriteWithMask {
            device: DEVICE.into(),
            reg: op.reg.index(),
            value: op.value,
            mask: op.mask,
        }
    }

    #[tokio::test]
    async fn startup_writes_fields_in_order() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let os_release = dir.path().join("os-release");
        std::fs::write(&os_release, "VERSION_ID=\"fw-1\"\n").unwrap();

        let services = FakeServices::new(
            1,
            Some(LocalState {
                bmc_state: Some(BmcState::Ready),
                role: Some(Role::Active),
                redundancy_enabled: Some(true),
                failovers_paused: None,
            }),
        );
        let (mut local, sim) = setup(services, &os_release);
        local.start().await.unwrap();

        assert_eq!(
            sim.calls(),
            vec![
                masked(Field::ApiVersion, API_VERSION.into()),
                masked(Field::FwVersion, fingerprint("fw-1")),
                masked(Field::BmcPosition, 1),
                masked(Field::Provisioned, 1),
                masked(Field::SiblingCommsOk, 0),
                masked(Field::Role, Role::Active.raw()),
                masked(Field::RedundancyEnabled, 1),
                masked(Field::FailoversPaused, 0),
                masked(Field::BmcState, BmcState::Ready.raw()),
            ]
        );

        let regs = sim.registers(Path::new(DEVICE)).unwrap();
        let image = RegisterImage::from_reg0(regs[0]);
        assert_eq!(image.api_version, API_VERSION);
        assert_eq!(image.bmc_position, 1);
        assert_eq!(image.role, Role::Active);
        assert_eq!(image.bmc_state, BmcState::Ready);
        assert!(image.redundancy_enabled);
        assert!(!image.sibling_comms_ok);
        assert_eq!(regs[1], fingerprint("fw-1"));
    }

    #[tokio::test]
    async fn startup_without_upstream_or_version() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (mut local, sim) = setup(FakeServices::new(0, None), &dir.path().join("missing"));
        local.start().await.unwrap();

        assert_eq!(
            sim.calls(),
            vec![
                masked(Field::ApiVersion, API_VERSION.into()),
                masked(Field::BmcPosition, 0),
                masked(Field::Provisioned, 1),
                masked(Field::SiblingCommsOk, 0),
                masked(Field::FailoversPaused, 0),
            ]
        );
    }

    #[tokio::test]
    async fn startup_fails_on_write_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (mut local, sim) = setup(FakeServices::new(0, None), &dir.path().join("missing"));
        sim.inject_fault(Path::new(DEVICE), 0, SimOp::WriteWithMask, libc::EIO);

        let err = local.start().await.unwrap_err();
        assert!(matches!(err, RbmcError::Device { .. }));
    }

    #[test]
    fn apply_mirrors_each_change() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (mut local, sim) = setup(FakeServices::new(0, None), &dir.path().join("missing"));

        local.apply(Notification::RoleChanged(Role::Passive)).unwrap();
        local.apply(Notification::BmcStateChanged(BmcState::Quiesced)).unwrap();
        local.apply(Notification::RedundancyEnabledChanged(true)).unwrap();
        local.apply(Notification::FailoversPausedChanged(true)).unwrap();
        local.apply(Notification::HeartbeatTick).unwrap();

        assert_eq!(
            sim.calls(),
            vec![
                masked(Field::Role, Role::Passive.raw()),
                masked(Field::BmcState, BmcState::Quiesced.raw()),
                masked(Field::RedundancyEnabled, 1),
                masked(Field::FailoversPaused, 1),
            ]
        );
    }

    #[test]
    fn sibling_comms_written_only_on_change() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (mut local, sim) = setup(FakeServices::new(0, None), &dir.path().join("missing"));

        assert!(local.set_sibling_comms_ok(false).unwrap());
        assert!(!local.set_sibling_comms_ok(false).unwrap());
        assert!(local.set_sibling_comms_ok(true).unwrap());
        assert!(!local.set_sibling_comms_ok(true).unwrap());
        assert_eq!(sim.calls().len(), 2);
        assert_eq!(local.sibling_comms_ok(), Some(true));
    }

    #[test]
    fn failed_comms_write_is_retried() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (mut local, sim) = setup(FakeServices::new(0, None), &dir.path().join("missing"));
        sim.inject_fault(Path::new(DEVICE), 0, SimOp::WriteWithMask, libc::EIO);

        assert!(local.set_sibling_comms_ok(true).is_err());
        assert_eq!(local.sibling_comms_ok(), None);

        sim.clear_faults();
        assert!(local.set_sibling_comms_ok(true).unwrap());
    }
}
