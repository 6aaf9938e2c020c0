//! Core framing and transport types for CCID-style USB smart card readers
//!
//! This crate provides the protocol plumbing between a host and a contact card
//! reader that speaks a CCID-like bulk protocol:
//!
//! - Building command frames (fixed 10-byte header plus payload) and splitting
//!   them into transport-sized segments
//! - Reassembling multi-packet response frames and parsing them into typed blocks
//! - Encoding the nested TLV objects carried by vendor escape commands
//! - A single-owner reader session that binds the frame codec to one transport
//!
//! USB discovery and the raw bulk-transfer primitive are not part of this crate;
//! callers hand in anything implementing [`BulkTransport`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

// Main modules
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod frame;
pub mod reader;
pub mod tlv;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use config::{CcidConfig, Protocol};
pub use error::{Error, Result, ResultExt};
pub use event::{DeviceEvent, DeviceEventHandler, DeviceLink, LinkState, TransitionError};
pub use frame::{DataBlock, EscapeBlock, FrameBuilder, FrameError, PayloadKind, SlotStatus};
pub use reader::CcidReader;
pub use tlv::{DecodeError, EncodeError, EscapeObject};
pub use transport::{BulkTransport, Transceiver, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Error, Result, ResultExt};

    // Framing
    pub use crate::frame::{DataBlock, EscapeBlock, FrameBuilder, PayloadKind, SlotStatus};
    pub use crate::tlv::EscapeObject;

    // Transport layer
    pub use crate::transport::{BulkTransport, Transceiver};

    // Session
    pub use crate::config::{CcidConfig, Protocol};
    pub use crate::reader::CcidReader;
}
