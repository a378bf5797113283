//! [`LocalMailbox`] – publishes this BMC's state into its own mailbox.
//!
//! The local BMC is the source of truth for its fields, so they are written
//! from locally known values and never read back.  The heartbeat is the one
//! exception: its starting value has to come from the register.

use rbmc_hal::MailboxAccess;
use rbmc_types::{BmcState, RbmcError, Role, ScratchPadReg};
use tracing::{debug, error};

use crate::fields::{Field, decode, encode};

/// Write-only codec for the local mailbox.
pub struct LocalMailbox {
    access: MailboxAccess,
    /// Last heartbeat value successfully written.
    heartbeat: Option<u8>,
}

impl LocalMailbox {
    pub fn new(access: MailboxAccess) -> Self {
        Self {
            access,
            heartbeat: None,
        }
    }

    /// Whether the local mailbox device is present.
    pub fn exists(&mut self) -> bool {
        self.access.exists()
    }

    pub fn write_api_version(&mut self, version: u8) -> Result<(), RbmcError> {
        self.write_field(Field::ApiVersion, version.into())
    }

    pub fn write_bmc_position(&mut self, position: u8) -> Result<(), RbmcError> {
        self.write_field(Field::BmcPosition, position.into())
    }

    pub fn write_role(&mut self, role: Role) -> Result<(), RbmcError> {
        self.write_field(Field::Role, role.raw())
    }

    pub fn write_redundancy_enabled(&mut self, enabled: bool) -> Result<(), RbmcError> {
        self.write_field(Field::RedundancyEnabled, enabled.into())
    }

    pub fn write_failovers_paused(&mut self, paused: bool) -> Result<(), RbmcError> {
        self.write_field(Field::FailoversPaused, paused.into())
    }

    pub fn write_provisioned(&mut self, provisioned: bool) -> Result<(), RbmcError> {
        self.write_field(Field::Provisioned, provisioned.into())
    }

    pub fn write_bmc_state(&mut self, state: BmcState) -> Result<(), RbmcError> {
        self.write_field(Field::BmcState, state.raw())
    }

    pub fn write_sibling_comms_ok(&mut self, ok: bool) -> Result<(), RbmcError> {
        self.write_field(Field::SiblingCommsOk, ok.into())
    }

    /// Write the firmware fingerprint into register 1.
    pub fn write_fw_version(&mut self, fingerprint: u32) -> Result<(), RbmcError> {
        self.write_field(Field::FwVersion, fingerprint)
    }

    /// Advance the heartbeat by one, wrapping 255 → 0, and return the value
    /// written.
    ///
    /// The current value is read from register 0 the first time and after any
    /// failure; afterwards the last written value is used.
    pub fn increment_heartbeat(&mut self) -> Result<u8, RbmcError> {
        let current = match self.heartbeat {
            Some(value) => value,
            None => {
                let reg0 = self.access.read_register(ScratchPadReg::Reg0).map_err(|e| {
                    error!(error = %e, code = e.code(), "reading local heartbeat failed");
                    e
                })?;
                decode(Field::Heartbeat, reg0) as u8
            }
        };

        let next = current.wrapping_add(1);
        match self.write_field(Field::Heartbeat, next.into()) {
            Ok(()) => {
                self.heartbeat = Some(next);
                Ok(next)
            }
            Err(e) => {
                self.heartbeat = None;
                Err(e)
            }
        }
    }

    fn write_field(&mut self, field: Field, value: u32) -> Result<(), RbmcError> {
        let op = encode(field, value);
        debug!(?field, value = op.value, mask = op.mask, "local mailbox write");
        self.access.write_register_masked(&op).map_err(|e| {
            error!(?field, error = %e, code = e.code(), "local mailbox write failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbmc_hal::{DriverCall, SimDriver, SimOp};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn setup(reg0: u32) -> (LocalMailbox, Arc<SimDriver>, PathBuf) {
        let device = PathBuf::from("/dev/mbox-cfam-s10");
        let sim = Arc::new(SimDriver::new());
        sim.add_device(&device, [reg0, 0, 0, 0]);
        let mbox = LocalMailbox::new(MailboxAccess::with_device(&device, sim.clone()));
        (mbox, sim, device)
    }

    fn masked(device: &PathBuf, reg: u32, value: u32, mask: u32) -> DriverCall {
        DriverCall::WriteWithMask {
            device: device.clone(),
            reg,
            value,
            mask,
        }
    }

    #[test]
    fn each_field_issues_one_masked_write() {
        let (mut mbox, sim, dev) = setup(0);

        mbox.write_api_version(0xFF).unwrap();
        mbox.write_bmc_position(1).unwrap();
        mbox.write_role(Role::Passive).unwrap();
        mbox.write_redundancy_enabled(true).unwrap();
        mbox.write_failovers_paused(true).unwrap();
        mbox.write_provisioned(true).unwrap();
        mbox.write_bmc_state(BmcState::Quiesced).unwrap();
        mbox.write_sibling_comms_ok(true).unwrap();
        mbox.write_fw_version(0x12345678).unwrap();

        assert_eq!(
            sim.calls(),
            vec![
                masked(&dev, 0, 0xFF000000, 0xFF000000),
                masked(&dev, 0, 0x00800000, 0x00800000),
                masked(&dev, 0, 0x00400000, 0x00600000),
                masked(&dev, 0, 0x00100000, 0x00100000),
                masked(&dev, 0, 0x00080000, 0x00080000),
                masked(&dev, 0, 0x00040000, 0x00040000),
                masked(&dev, 0, 0x00018000, 0x00038000),
                masked(&dev, 0, 0x00004000, 0x00004000),
                masked(&dev, 1, 0x12345678, 0xFFFFFFFF),
            ]
        );
    }

    #[test]
    fn clearing_a_flag_leaves_other_bits_alone() {
        let before = 0xFFFF_FFFF;
        let (mut mbox, sim, dev) = setup(before);

        mbox.write_redundancy_enabled(false).unwrap();
        mbox.write_role(Role::Active).unwrap();

        let after = sim.registers(&dev).unwrap()[0];
        let touched = Field::RedundancyEnabled.mask() | Field::Role.mask();
        assert_eq!(after & !touched, before & !touched);
        assert_eq!(decode(Field::RedundancyEnabled, after), 0);
        assert_eq!(Role::from_raw(decode(Field::Role, after)), Role::Active);
    }

    #[test]
    fn heartbeat_wraps() {
        let (mut mbox, sim, dev) = setup(0x0000_00FE);

        assert_eq!(mbox.increment_heartbeat().unwrap(), 0xFF);
        assert_eq!(mbox.increment_heartbeat().unwrap(), 0x00);
        assert_eq!(mbox.increment_heartbeat().unwrap(), 0x01);

        assert_eq!(
            sim.calls(),
            vec![
                DriverCall::Read {
                    device: dev.clone(),
                    reg: 0
                },
                masked(&dev, 0, 0x000000FF, 0xFF),
                masked(&dev, 0, 0x00000000, 0xFF),
                masked(&dev, 0, 0x00000001, 0xFF),
            ]
        );
    }

    #[test]
    fn heartbeat_n_increments() {
        let start = 0x37;
        let (mut mbox, sim, dev) = setup(0xABCD_EF00 | start);

        for _ in 0..300 {
            mbox.increment_heartbeat().unwrap();
        }
        let reg0 = sim.registers(&dev).unwrap()[0];
        assert_eq!(decode(Field::Heartbeat, reg0), (start + 300) % 256);
        assert_eq!(reg0 & !0xFF, 0xABCD_EF00);
    }

    #[test]
    fn heartbeat_rereads_after_failure() {
        let (mut mbox, sim, dev) = setup(0x10);
        assert_eq!(mbox.increment_heartbeat().unwrap(), 0x11);

        sim.inject_fault(&dev, 0, SimOp::WriteWithMask, libc::EIO);
        assert!(mbox.increment_heartbeat().is_err());

        sim.clear_faults();
        sim.set_register(&dev, 0, 0x40);
        assert_eq!(mbox.increment_heartbeat().unwrap(), 0x41);
    }

    #[test]
    fn write_failures_are_reported() {
        let (mut mbox, sim, dev) = setup(0);
        sim.inject_fault(&dev, 0, SimOp::WriteWithMask, libc::EIO);
        sim.inject_fault(&dev, 1, SimOp::WriteWithMask, libc::EIO);

        assert!(mbox.write_api_version(0xFF).is_err());
        assert!(mbox.write_role(Role::Passive).is_err());
        assert!(mbox.write_redundancy_enabled(true).is_err());
        assert!(mbox.write_failovers_paused(true).is_err());
        assert!(mbox.write_provisioned(true).is_err());
        assert!(mbox.write_bmc_state(BmcState::Quiesced).is_err());
        assert!(mbox.write_sibling_comms_ok(true).is_err());
        assert!(mbox.write_fw_version(1).is_err());
        assert!(mbox.increment_heartbeat().is_err());
    }

    #[test]
    fn heartbeat_read_failure_is_reported() {
        let (mut mbox, sim, dev) = setup(0);
        sim.inject_fault(&dev, 0, SimOp::Read, libc::EIO);

        assert_eq!(mbox.increment_heartbeat().unwrap_err().code(), libc::EIO);
        assert!(
            !sim
                .calls()
                .iter()
                .any(|c| matches!(c, DriverCall::WriteWithMask { .. }))
        );
    }
}
