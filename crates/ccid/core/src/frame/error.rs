//! Error types for frame building and parsing

/// Frame building or parsing error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Response marker does not match the expected block type
    #[error("Unexpected response marker {actual:#04x}, expected {expected:#04x}")]
    BadMarker {
        /// Marker the parser expected
        expected: u8,
        /// Marker found at offset 0
        actual: u8,
    },

    /// Frame shorter than its header and declared payload
    #[error("Truncated frame: {actual} bytes received, {declared} required")]
    Truncated {
        /// Header length plus declared payload length
        declared: usize,
        /// Bytes present in the frame
        actual: usize,
    },

    /// T=1 payload does not fit in a single block
    #[error("Block payload of {length} bytes exceeds {max}")]
    BlockTooLong {
        /// Payload length
        length: usize,
        /// Maximum payload length
        max: usize,
    },

    /// Declared payload length does not fit in addressable memory
    #[error("Declared payload length {0} is not addressable")]
    LengthOverflow(u32),

    /// Packet size cannot hold a frame header
    #[error("Packet size {0} is smaller than the frame header")]
    PacketSizeTooSmall(usize),
}
