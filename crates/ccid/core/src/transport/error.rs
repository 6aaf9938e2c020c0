//! Error types specific to the bulk transport exchange

use crate::frame::FrameError;

/// Boxed error reported by a concrete transport
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Transport error type
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Transport accepted fewer bytes than the segment holds
    #[error("Short write: {written} of {expected} bytes sent")]
    ShortWrite {
        /// Bytes accepted by the transport
        written: usize,
        /// Segment length
        expected: usize,
    },

    /// Transport failed while writing
    #[error("Failed to write segment: {0}")]
    WriteFailed(#[source] BoxedError),

    /// First packet too short to hold a frame header
    #[error("Short read: {0} bytes, frame header needs 10")]
    ShortRead(usize),

    /// First packet carries a length field that cannot be honoured
    #[error("Invalid response header: {0}")]
    InvalidHeader(#[source] FrameError),

    /// Transport failed while reading
    #[error("Failed to read packet: {0}")]
    ReadFailed(#[source] BoxedError),

    /// Transport returned no data before the frame was complete
    #[error("Incomplete frame: {received} of {expected} bytes received")]
    Incomplete {
        /// Bytes accumulated so far
        received: usize,
        /// Header length plus declared payload length
        expected: usize,
    },
}

impl TransportError {
    /// Wrap a transport write error
    pub fn write<E: Into<BoxedError>>(error: E) -> Self {
        Self::WriteFailed(error.into())
    }

    /// Wrap a transport read error
    pub fn read<E: Into<BoxedError>>(error: E) -> Self {
        Self::ReadFailed(error.into())
    }
}
