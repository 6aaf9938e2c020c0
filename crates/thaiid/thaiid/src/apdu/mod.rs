//! APDU layer: command model, status words and case chaining

pub mod command;
pub mod session;
pub mod status;

pub use command::Command;
pub use session::{ApduSession, ExchangeState};
pub use status::StatusWord;

/// Errors raised while chaining an APDU exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApduError {
    /// Procedure byte other than 61 or 6C
    #[error("Unexpected procedure byte {0:#04x}")]
    UnexpectedProcedureByte(u8),

    /// First response was not exactly two procedure bytes
    #[error("Expected 2 procedure bytes, got {0}")]
    UnexpectedHeaderLength(usize),

    /// Command bytes do not form a short APDU
    #[error("Malformed command APDU of {0} bytes")]
    MalformedCommand(usize),
}
