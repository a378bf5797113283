//! Scratchpad field layout.
//!
//! | field | register | bits | width |
//! |---|---|---|---|
//! | [`Field::ApiVersion`] | 0 | 24–31 | 8 |
//! | [`Field::BmcPosition`] | 0 | 23 | 1 |
//! | [`Field::Role`] | 0 | 21–22 | 2 |
//! | [`Field::RedundancyEnabled`] | 0 | 20 | 1 |
//! | [`Field::FailoversPaused`] | 0 | 19 | 1 |
//! | [`Field::Provisioned`] | 0 | 18 | 1 |
//! | [`Field::BmcState`] | 0 | 15–17 | 3 |
//! | [`Field::SiblingCommsOk`] | 0 | 14 | 1 |
//! | [`Field::Heartbeat`] | 0 | 0–7 | 8 |
//! | [`Field::FwVersion`] | 1 | 0–31 | 32 |
//!
//! Fields never overlap, so each one can be written with a single masked
//! write without disturbing the others.

use rbmc_types::{BmcState, ModifyOp, Role, ScratchPadReg};
use serde::{Deserialize, Serialize};

/// Every field of the mailbox wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ApiVersion,
    BmcPosition,
    Role,
    RedundancyEnabled,
    FailoversPaused,
    Provisioned,
    BmcState,
    SiblingCommsOk,
    Heartbeat,
    FwVersion,
}

/// Register, bit offset and width of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub reg: ScratchPadReg,
    pub offset: u32,
    pub width: u32,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::ApiVersion,
        Field::BmcPosition,
        Field::Role,
        Field::RedundancyEnabled,
        Field::FailoversPaused,
        Field::Provisioned,
        Field::BmcState,
        Field::SiblingCommsOk,
        Field::Heartbeat,
        Field::FwVersion,
    ];

    pub const fn layout(self) -> FieldLayout {
        let (reg, offset, width) = match self {
            Field::ApiVersion => (ScratchPadReg::Reg0, 24, 8),
            Field::BmcPosition => (ScratchPadReg::Reg0, 23, 1),
            Field::Role => (ScratchPadReg::Reg0, 21, 2),
            Field::RedundancyEnabled => (ScratchPadReg::Reg0, 20, 1),
            Field::FailoversPaused => (ScratchPadReg::Reg0, 19, 1),
            Field::Provisioned => (ScratchPadReg::Reg0, 18, 1),
            Field::BmcState => (ScratchPadReg::Reg0, 15, 3),
            Field::SiblingCommsOk => (ScratchPadReg::Reg0, 14, 1),
            Field::Heartbeat => (ScratchPadReg::Reg0, 0, 8),
            Field::FwVersion => (ScratchPadReg::Reg1, 0, 32),
        };
        FieldLayout { reg, offset, width }
    }

    /// In-register mask covering this field.
    pub const fn mask(self) -> u32 {
        let layout = self.layout();
        max_value(layout.width) << layout.offset
    }
}

/// Largest value a field of `width` bits can hold.
pub const fn max_value(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Build the masked write that stores `value` in `field`.  Bits of `value`
/// beyond the field width are dropped.
pub fn encode(field: Field, value: u32) -> ModifyOp {
    let layout = field.layout();
    let max = max_value(layout.width);
    ModifyOp {
        reg: layout.reg,
        value: (value & max) << layout.offset,
        mask: max << layout.offset,
    }
}

/// Extract `field` from the raw contents of its register.
pub fn decode(field: Field, reg_value: u32) -> u32 {
    let layout = field.layout();
    (reg_value >> layout.offset) & max_value(layout.width)
}

/// Decoded view of register 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisterImage {
    pub api_version: u8,
    pub bmc_position: u8,
    pub role: Role,
    pub redundancy_enabled: bool,
    pub failovers_paused: bool,
    pub provisioned: bool,
    pub bmc_state: BmcState,
    pub sibling_comms_ok: bool,
    pub heartbeat: u8,
}

impl RegisterImage {
    pub fn from_reg0(reg0: u32) -> Self {
        let flag = |field| decode(field, reg0) != 0;
        Self {
            api_version: decode(Field::ApiVersion, reg0) as u8,
            bmc_position: decode(Field::BmcPosition, reg0) as u8,
            role: Role::from_raw(decode(Field::Role, reg0)),
            redundancy_enabled: flag(Field::RedundancyEnabled),
            failovers_paused: flag(Field::FailoversPaused),
            provisioned: flag(Field::Provisioned),
            bmc_state: BmcState::from_raw(decode(Field::BmcState, reg0)),
            sibling_comms_ok: flag(Field::SiblingCommsOk),
            heartbeat: decode(Field::Heartbeat, reg0) as u8,
        }
    }

    /// Pack the image back into a register 0 word.  Bits that belong to no
    /// field are zero.
    pub fn to_reg0(&self) -> u32 {
        [
            encode(Field::ApiVersion, self.api_version.into()),
            encode(Field::BmcPosition, self.bmc_position.into()),
            encode(Field::Role, self.role.raw()),
            encode(Field::RedundancyEnabled, self.redundancy_enabled.into()),
            encode(Field::FailoversPaused, self.failovers_paused.into()),
            encode(Field::Provisioned, self.provisioned.into()),
            encode(Field::BmcState, self.bmc_state.raw()),
            encode(Field::SiblingCommsOk, self.sibling_comms_ok.into()),
            encode(Field::Heartbeat, self.heartbeat.into()),
        ]
        .iter()
        .fold(0, |word, op| word | op.value)
    }
}
