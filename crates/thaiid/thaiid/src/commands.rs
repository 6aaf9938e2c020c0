//! Command APDUs understood by the Thai national ID card

use bytes::Bytes;

use crate::apdu::Command;
use crate::crypto::PinAnswer;

/// Applications selectable on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applet {
    /// Default chip data application (empty AID)
    ChipData,
    /// Personal data and picture storage
    StorageData,
    /// Card administration and PIN verification
    Extension,
    /// Biometric data
    Bio,
}

impl Applet {
    /// Application identifier, empty for the default application
    pub const fn aid(&self) -> &'static [u8] {
        match self {
            Self::ChipData => &[],
            Self::StorageData => &[0xA0, 0x00, 0x00, 0x00, 0x54, 0x48, 0x00, 0x01],
            Self::Extension => &[0xA0, 0x00, 0x00, 0x00, 0x84, 0x06, 0x00, 0x02],
            Self::Bio => &[0xA0, 0x00, 0x00, 0x00, 0x84, 0x06, 0x00, 0x00],
        }
    }

    /// SELECT by name
    pub fn select(&self) -> Command {
        let select = Command::new(0x00, 0xA4, 0x04, 0x00);
        match self.aid() {
            [] => select,
            aid => select.with_data(Bytes::from_static(aid)),
        }
    }
}

/// GET DATA for the chip serial record
pub const fn get_card_id() -> Command {
    Command::new(0x80, 0xCA, 0x9F, 0x7F)
}

/// READ BINARY of `length` bytes at `offset` in the storage applet
///
/// The card takes the length as a two-byte data field rather than Le.
pub fn read_binary(offset: u16, length: u8) -> Command {
    let [hi, lo] = offset.to_be_bytes();
    Command::new_with_data(0x80, 0xB0, hi, lo, vec![0x00, length])
}

/// GET CHALLENGE for PIN verification
pub const fn get_pin_challenge() -> Command {
    Command::new(0x80, 0xB4, 0x00, 0x00)
}

/// VERIFY with the encrypted challenge
pub fn verify_pin(answer: &PinAnswer) -> Command {
    Command::new_with_data(0x80, 0x20, 0x01, 0x00, answer.to_vec())
}

/// Read the chip administration record from the extension applet
pub const fn get_chip_info() -> Command {
    Command::new(0x80, 0x00, 0x00, 0x00)
}
