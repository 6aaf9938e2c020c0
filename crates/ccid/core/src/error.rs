//! Core error type for CCID reader operations
//!
//! Every layer keeps its own error enum; this type gathers them so a reader
//! session can surface a single error to its caller.

use crate::event::TransitionError;
use crate::frame::FrameError;
use crate::tlv::{DecodeError, EncodeError};
use crate::transport::TransportError;

/// Result type for CCID operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bulk transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed or unexpected frame
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Escape object could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Escape object could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Device event out of order
    #[error(transparent)]
    Link(#[from] TransitionError),

    /// Slot number outside 0..=127
    #[error("Invalid slot number: {0}")]
    InvalidSlot(u8),

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

/// Extension trait for Result with CCID errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
