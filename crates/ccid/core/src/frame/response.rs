//! Typed response blocks parsed from reassembled frames

use bytes::Bytes;
use tracing::warn;

use super::error::FrameError;
use crate::constants::{HEADER_LEN, offset, payload, response};

/// Informational classification of a data block payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Answer-to-reset
    Atr,
    /// Procedure bytes asking for a follow-up exchange
    ApduHeader,
    /// Response data and/or status word
    ApduData,
    /// Empty payload
    Unknown,
}

impl PayloadKind {
    /// Classify a payload by its first byte
    pub const fn classify(data: &[u8]) -> Self {
        let Some(&first) = data.first() else {
            return Self::Unknown;
        };
        match first {
            payload::ATR => Self::Atr,
            payload::MORE_DATA | payload::WRONG_LENGTH => Self::ApduHeader,
            _ => Self::ApduData,
        }
    }
}

/// Reply to power-on and transfer-block commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// Payload classification
    pub kind: PayloadKind,
    /// Slot status byte
    pub status: u8,
    /// Slot error byte
    pub error: u8,
    /// Payload bytes following the header
    pub data: Bytes,
}

impl DataBlock {
    /// Parse a data block frame (marker `0x80`)
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let parts = split_frame(frame, &[response::DATA_BLOCK])?;
        Ok(Self {
            kind: PayloadKind::classify(&parts.data),
            status: parts.status,
            error: parts.error,
            data: parts.data,
        })
    }

    /// Whether the reader reported neither a status nor an error
    pub const fn is_ok(&self) -> bool {
        self.status == 0 && self.error == 0
    }
}

/// Reply to an escape command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeBlock {
    /// Slot status byte
    pub status: u8,
    /// Slot error byte
    pub error: u8,
    /// Payload bytes following the header
    pub data: Bytes,
}

impl EscapeBlock {
    /// Parse an escape response frame (marker `0x83`)
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let parts = split_frame(frame, &[response::ESCAPE])?;
        Ok(Self {
            status: parts.status,
            error: parts.error,
            data: parts.data,
        })
    }

    /// Whether the reader reported neither a status nor an error
    pub const fn is_ok(&self) -> bool {
        self.status == 0 && self.error == 0
    }
}

/// Reply to power-off, slot status and reset-parameter commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    /// Response marker, slot status (`0x81`) or parameters (`0x82`)
    pub marker: u8,
    /// Slot status byte
    pub status: u8,
    /// Slot error byte
    pub error: u8,
    /// Clock status or protocol number, depending on the marker
    pub extra: u8,
    /// Protocol data structure carried by a parameters reply
    pub data: Bytes,
}

impl SlotStatus {
    /// Parse a slot status (`0x81`) or parameters (`0x82`) frame
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let parts = split_frame(frame, &[response::SLOT_STATUS, response::PARAMETERS])?;
        Ok(Self {
            marker: parts.marker,
            status: parts.status,
            error: parts.error,
            extra: parts.extra,
            data: parts.data,
        })
    }

    /// Whether this is a parameters reply
    pub const fn is_parameters(&self) -> bool {
        self.marker == response::PARAMETERS
    }

    /// Whether a card sits in the slot, active or not
    pub const fn card_present(&self) -> bool {
        self.status & 0x03 != 0x02
    }

    /// Whether the reader reported neither a status nor an error
    pub const fn is_ok(&self) -> bool {
        self.status == 0 && self.error == 0
    }
}

struct FrameParts {
    marker: u8,
    status: u8,
    error: u8,
    extra: u8,
    data: Bytes,
}

/// Validate the marker and length of a frame and split off its payload
///
/// Bytes past `10 + length` are transport padding and are ignored.
fn split_frame(frame: &[u8], markers: &[u8]) -> Result<FrameParts, FrameError> {
    let &marker = frame.first().ok_or(FrameError::Truncated {
        declared: HEADER_LEN,
        actual: 0,
    })?;

    if !markers.contains(&marker) {
        warn!(marker, expected = ?markers, "Rejecting frame with unexpected marker");
        return Err(FrameError::BadMarker {
            expected: markers[0],
            actual: marker,
        });
    }

    if frame.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            declared: HEADER_LEN,
            actual: frame.len(),
        });
    }

    let declared = frame_length(frame)?;
    if frame.len() < declared {
        warn!(declared, actual = frame.len(), "Rejecting truncated frame");
        return Err(FrameError::Truncated {
            declared,
            actual: frame.len(),
        });
    }

    Ok(FrameParts {
        marker,
        status: frame[offset::STATUS],
        error: frame[offset::ERROR],
        extra: frame[offset::EXTRA],
        data: Bytes::copy_from_slice(&frame[HEADER_LEN..declared]),
    })
}

/// Header plus the payload length declared in header bytes 1..5
///
/// The caller guarantees the frame holds a full header. The length field is
/// reader-controlled, so a value that cannot be addressed is an error rather
/// than a wrapped total.
pub(crate) fn frame_length(frame: &[u8]) -> Result<usize, FrameError> {
    let mut length = [0u8; 4];
    length.copy_from_slice(&frame[offset::LENGTH..offset::LENGTH + 4]);
    let declared = u32::from_le_bytes(length);

    usize::try_from(declared)
        .ok()
        .and_then(|payload| payload.checked_add(HEADER_LEN))
        .ok_or(FrameError::LengthOverflow(declared))
}
