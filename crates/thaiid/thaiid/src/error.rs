//! Error types for Thai ID card operations

use thiserror::Error;

use crate::apdu::{ApduError, StatusWord};

/// Result type for Thai ID card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Thai ID card operations
#[derive(Debug, Error)]
pub enum Error {
    /// Reader, framing or transport errors
    #[error(transparent)]
    Ccid(#[from] nexum_ccid_core::Error),

    /// Case chaining errors
    #[error(transparent)]
    Apdu(#[from] ApduError),

    /// Reader reported a non-zero slot status or error
    #[error("Reader slot error: status {status:#04x}, error {error:#04x}")]
    SlotError {
        /// Slot status byte
        status: u8,
        /// Slot error byte
        error: u8,
    },

    /// Response indicates an error condition
    #[error("Card returned error status: {0} ({desc})", desc = .0.description())]
    CardStatus(StatusWord),

    /// Response length differs from what the command returns
    #[error("Invalid response length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length including the status word
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// PIN is not four ASCII digits
    #[error("PIN must be exactly 4 ASCII digits")]
    InvalidPin,

    /// Verify response was neither success nor a retry counter
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Field could not be extracted from a record
    #[error("Field {field}: {reason}")]
    Field {
        /// Field name
        field: &'static str,
        /// What went wrong
        reason: &'static str,
    },

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<nexum_ccid_core::TransportError> for Error {
    fn from(error: nexum_ccid_core::TransportError) -> Self {
        Self::Ccid(error.into())
    }
}

impl From<nexum_ccid_core::FrameError> for Error {
    fn from(error: nexum_ccid_core::FrameError) -> Self {
        Self::Ccid(error.into())
    }
}

/// Extension trait for Result with Thai ID errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
