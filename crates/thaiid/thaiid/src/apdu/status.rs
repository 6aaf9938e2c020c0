//! Status word (SW1-SW2) interpretation

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Split the trailing status word off a response payload
    pub fn split(response: &[u8]) -> Option<(&[u8], Self)> {
        let (data, &[sw1, sw2]) = response.split_last_chunk::<2>()?;
        Some((data, Self::new(sw1, sw2)))
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if more response bytes are waiting (61 XX)
    pub const fn is_more_data_available(&self) -> bool {
        self.sw1 == 0x61
    }

    /// Check if the card asked for the command to be resent with Le = SW2 (6C XX)
    pub const fn is_wrong_le(&self) -> bool {
        self.sw1 == 0x6C
    }

    /// Remaining verification attempts reported by a 63 XX status
    pub const fn remaining_attempts(&self) -> Option<u8> {
        if self.sw1 == 0x63 {
            Some(self.sw2)
        } else {
            None
        }
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() || self.is_more_data_available() {
            Level::DEBUG
        } else if self.sw1 == 0x62 || self.sw1 == 0x63 {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x61, _) => "More data available",
            (0x62, 0x82) => "End of file reached before reading Le bytes",
            (0x63, 0x00) => "Verification failed",
            (0x63, _) => "Verification failed, attempts remaining",
            (0x65, 0x81) => "Memory failure",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x83) => "Authentication method blocked",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x69, 0x86) => "Command not allowed",
            (0x6A, 0x82) => "File or application not found",
            (0x6A, 0x86) => "Incorrect parameters P1-P2",
            (0x6B, 0x00) => "Wrong parameters P1-P2",
            (0x6C, _) => "Wrong Le field",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            (0x6F, 0x00) => "No precise diagnosis",
            _ => "Unknown status word",
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_split() {
        let (data, sw) = StatusWord::split(&hex!("01 02 03 90 00")).unwrap();
        assert_eq!(data, hex!("01 02 03"));
        assert!(sw.is_success());

        let (data, sw) = StatusWord::split(&hex!("63 02")).unwrap();
        assert!(data.is_empty());
        assert_eq!(sw.remaining_attempts(), Some(2));

        assert!(StatusWord::split(&[0x90]).is_none());
    }

    #[test]
    fn test_display_and_description() {
        let blocked = StatusWord::new(0x69, 0x83);
        assert_eq!(blocked.to_string(), "69 83");
        assert_eq!(blocked.description(), "Authentication method blocked");
        assert_eq!(StatusWord::new(0x6C, 0x0A).description(), "Wrong Le field");
    }

    #[test]
    fn test_tracing_level() {
        assert_eq!(StatusWord::new(0x90, 0x00).tracing_level(), Level::DEBUG);
        assert_eq!(StatusWord::new(0x61, 0x10).tracing_level(), Level::DEBUG);
        assert_eq!(StatusWord::new(0x63, 0x02).tracing_level(), Level::INFO);
        assert_eq!(StatusWord::new(0x6A, 0x82).tracing_level(), Level::WARN);
        assert_eq!(StatusWord::new(0x63, 0x01).remaining_attempts(), Some(1));
        assert_eq!(StatusWord::new(0x90, 0x00).remaining_attempts(), None);
    }
}
