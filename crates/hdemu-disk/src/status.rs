use core::fmt;

/// Packed device status: sense key in bits 16..24, additional sense code (ASC) in bits 8..16 and
/// its qualifier (ASCQ) in bits 0..8.
///
/// The packed form is what REQUEST SENSE reads back, so the layout is part of the host-visible
/// contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusCode(u32);

const SENSE_NO_SENSE: u8 = 0x00;
const SENSE_NOT_READY: u8 = 0x02;
const SENSE_ILLEGAL_REQUEST: u8 = 0x05;
const SENSE_UNIT_ATTENTION: u8 = 0x06;
const SENSE_DATA_PROTECT: u8 = 0x07;

const ASC_INVALID_COMMAND: u8 = 0x20;
const ASC_LBA_OUT_OF_RANGE: u8 = 0x21;
const ASC_INVALID_FIELD_IN_CDB: u8 = 0x24;
const ASC_LUN_NOT_SUPPORTED: u8 = 0x25;
const ASC_INVALID_FIELD_IN_PARAMETERS: u8 = 0x26;
const ASC_WRITE_PROTECTED: u8 = 0x27;
const ASC_MEDIUM_CHANGED: u8 = 0x28;
const ASC_MEDIUM_NOT_PRESENT: u8 = 0x3A;
const ASC_MEDIUM_REMOVAL_PREVENTED: u8 = 0x53;

impl StatusCode {
    pub const NO_ERROR: Self = Self::from_parts(SENSE_NO_SENSE, 0, 0);
    pub const NOT_READY: Self = Self::from_parts(SENSE_NOT_READY, ASC_MEDIUM_NOT_PRESENT, 0);
    pub const ATTENTION: Self = Self::from_parts(SENSE_UNIT_ATTENTION, ASC_MEDIUM_CHANGED, 0);
    pub const INVALID_COMMAND: Self = Self::from_parts(SENSE_ILLEGAL_REQUEST, ASC_INVALID_COMMAND, 0);
    pub const INVALID_LBA: Self = Self::from_parts(SENSE_ILLEGAL_REQUEST, ASC_LBA_OUT_OF_RANGE, 0);
    pub const INVALID_CDB: Self =
        Self::from_parts(SENSE_ILLEGAL_REQUEST, ASC_INVALID_FIELD_IN_CDB, 0);
    pub const INVALID_LUN: Self = Self::from_parts(SENSE_ILLEGAL_REQUEST, ASC_LUN_NOT_SUPPORTED, 0);
    pub const INVALID_PARAMETER: Self =
        Self::from_parts(SENSE_ILLEGAL_REQUEST, ASC_INVALID_FIELD_IN_PARAMETERS, 0);
    pub const WRITE_PROTECTED: Self = Self::from_parts(SENSE_DATA_PROTECT, ASC_WRITE_PROTECTED, 0);
    pub const PREVENT_REMOVAL: Self =
        Self::from_parts(SENSE_ILLEGAL_REQUEST, ASC_MEDIUM_REMOVAL_PREVENTED, 0x02);

    pub const fn from_parts(sense_key: u8, asc: u8, ascq: u8) -> Self {
        Self(((sense_key as u32) << 16) | ((asc as u32) << 8) | ascq as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Byte 0 of the non-extended sense buffer.
    pub const fn sense_key(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn asc(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn ascq(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_error(self) -> bool {
        self.0 != Self::NO_ERROR.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sense_key={:#04x} asc={:#04x} ascq={:#04x}",
            self.sense_key(),
            self.asc(),
            self.ascq()
        )
    }
}
