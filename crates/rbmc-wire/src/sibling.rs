//! [`SiblingMailbox`] – reads and decodes the sibling BMC's mailbox.
//!
//! Unlike the local side every value here is suspect: a read can fail at any
//! time, and data from a failed attempt must never be used.  The decoded
//! registers are therefore dropped as soon as a read fails and every accessor
//! returns [`RbmcError::Unavailable`] until the next successful
//! [`SiblingMailbox::read_all`].

use std::collections::BTreeSet;

use rbmc_hal::MailboxAccess;
use rbmc_types::{BmcState, RbmcError, Role, ScratchPadReg};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fields::{Field, RegisterImage, decode};

/// Everything decoded from one successful read of registers 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingRegisters {
    #[serde(flatten)]
    pub image: RegisterImage,
    pub fw_version: u32,
}

/// Reader for the sibling's mailbox.
pub struct SiblingMailbox {
    access: MailboxAccess,
    regs: Option<SiblingRegisters>,
}

impl SiblingMailbox {
    pub fn new(access: MailboxAccess) -> Self {
        Self { access, regs: None }
    }

    /// Whether the sibling's mailbox device is present.
    pub fn exists(&mut self) -> bool {
        self.access.exists()
    }

    /// Read registers 0 and 1 in one batch and decode them.
    ///
    /// On failure the previously decoded values are discarded and the error
    /// is returned.
    pub fn read_all(&mut self) -> Result<(), RbmcError> {
        let wanted = BTreeSet::from([ScratchPadReg::Reg0, ScratchPadReg::Reg1]);
        let result = self.access.read_registers(&wanted).and_then(|values| {
            match (
                values.get(&ScratchPadReg::Reg0),
                values.get(&ScratchPadReg::Reg1),
            ) {
                (Some(&reg0), Some(&reg1)) => Ok(SiblingRegisters {
                    image: RegisterImage::from_reg0(reg0),
                    fw_version: decode(Field::FwVersion, reg1),
                }),
                _ => Err(RbmcError::Unavailable),
            }
        });

        match result {
            Ok(regs) => {
                debug!(?regs, "sibling mailbox decoded");
                self.regs = Some(regs);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "sibling mailbox read failed");
                self.regs = None;
                Err(e)
            }
        }
    }

    /// `true` until the first successful read and after every failed one.
    pub fn has_error(&self) -> bool {
        self.regs.is_none()
    }

    /// All fields of the last successful read.
    pub fn registers(&self) -> Result<&SiblingRegisters, RbmcError> {
        self.regs.as_ref().ok_or(RbmcError::Unavailable)
    }

    pub fn api_version(&self) -> Result<u8, RbmcError> {
        Ok(self.registers()?.image.api_version)
    }

    pub fn bmc_position(&self) -> Result<u8, RbmcError> {
        Ok(self.registers()?.image.bmc_position)
    }

    pub fn role(&self) -> Result<Role, RbmcError> {
        Ok(self.registers()?.image.role)
    }

    pub fn redundancy_enabled(&self) -> Result<bool, RbmcError> {
        Ok(self.registers()?.image.redundancy_enabled)
    }

    pub fn failovers_paused(&self) -> Result<bool, RbmcError> {
        Ok(self.registers()?.image.failovers_paused)
    }

    pub fn provisioned(&self) -> Result<bool, RbmcError> {
        Ok(self.registers()?.image.provisioned)
    }

    pub fn bmc_state(&self) -> Result<BmcState, RbmcError> {
        Ok(self.registers()?.image.bmc_state)
    }

    /// The sibling's own view of its link to us.
    pub fn sibling_comms_ok(&self) -> Result<bool, RbmcError> {
        Ok(self.registers()?.image.sibling_comms_ok)
    }

    pub fn heartbeat(&self) -> Result<u8, RbmcError> {
        Ok(self.registers()?.image.heartbeat)
    }

    pub fn fw_version(&self) -> Result<u32, RbmcError> {
        Ok(self.registers()?.fw_version)
    }
}
