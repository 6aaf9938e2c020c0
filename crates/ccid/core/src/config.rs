//! Configuration options for a CCID reader session

use crate::constants::MAX_SLOT;
use crate::error::{Error, Result};

/// Transmission protocol used for transfer blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Character protocol, payload sent as-is (default)
    #[default]
    T0,
    /// Block protocol, payload wrapped in a prologue and LRC epilogue
    T1,
}

/// Per-session frame parameters
///
/// These values are copied into every command header built by the session.
/// The maximum packet size is not part of the configuration; it is reported
/// by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcidConfig {
    /// Slot addressed by every command
    pub slot: u8,

    /// Block waiting time extension sent in header byte 7
    pub timeout: u8,

    /// Exchange level parameter sent in header byte 8
    pub exchange_level: u8,

    /// Protocol used to wrap transfer blocks
    pub protocol: Protocol,
}

impl Default for CcidConfig {
    fn default() -> Self {
        Self {
            slot: 0,
            timeout: 0,
            exchange_level: 0,
            protocol: Protocol::T0,
        }
    }
}

impl CcidConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slot, rejecting numbers above 127
    pub const fn with_slot(mut self, slot: u8) -> Result<Self> {
        if slot > MAX_SLOT {
            return Err(Error::InvalidSlot(slot));
        }
        self.slot = slot;
        Ok(self)
    }

    /// Set the timeout parameter
    pub const fn with_timeout(mut self, timeout: u8) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the exchange level parameter
    pub const fn with_exchange_level(mut self, exchange_level: u8) -> Self {
        self.exchange_level = exchange_level;
        self
    }

    /// Set the transfer protocol
    pub const fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }
}
