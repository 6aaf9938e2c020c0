//! Wire-level constants for the CCID-style bulk protocol

/// Length of every command and response header
pub const HEADER_LEN: usize = 10;

/// Command codes sent from host to reader
pub mod command {
    /// Power the card on and return its ATR
    pub const ICC_POWER_ON: u8 = 0x62;
    /// Power the card off
    pub const ICC_POWER_OFF: u8 = 0x63;
    /// Query the slot status
    pub const GET_SLOT_STATUS: u8 = 0x65;
    /// Vendor escape request
    pub const ESCAPE: u8 = 0x6B;
    /// Reset protocol parameters
    pub const RESET_PARAMETERS: u8 = 0x6D;
    /// Transfer a block (APDU) to the card
    pub const XFR_BLOCK: u8 = 0x6F;
}

/// Response markers sent from reader to host
pub mod response {
    /// Data block carrying ATR or APDU response bytes
    pub const DATA_BLOCK: u8 = 0x80;
    /// Slot status reply
    pub const SLOT_STATUS: u8 = 0x81;
    /// Protocol parameters reply
    pub const PARAMETERS: u8 = 0x82;
    /// Escape response
    pub const ESCAPE: u8 = 0x83;
}

/// First payload bytes used to classify data blocks
pub mod payload {
    /// TS byte of a direct-convention ATR
    pub const ATR: u8 = 0x3B;
    /// Procedure byte: response bytes still available
    pub const MORE_DATA: u8 = 0x61;
    /// Procedure byte: wrong Le, exact length in SW2
    pub const WRONG_LENGTH: u8 = 0x6C;
}

/// Header field offsets
pub(crate) mod offset {
    pub(crate) const LENGTH: usize = 1;
    pub(crate) const SLOT: usize = 5;
    pub(crate) const SEQUENCE: usize = 6;
    pub(crate) const TIMEOUT: usize = 7;
    pub(crate) const EXCHANGE_LEVEL: usize = 8;
    pub(crate) const STATUS: usize = 7;
    pub(crate) const ERROR: usize = 8;
    pub(crate) const EXTRA: usize = 9;
}

/// Highest addressable slot number
pub const MAX_SLOT: u8 = 127;

/// Largest payload accepted inside a T=1 block
pub const MAX_T1_PAYLOAD: usize = 254;
