//! Command frame building and response frame parsing
//!
//! Every frame starts with a 10-byte header:
//!
//! | offset | field                                   |
//! |--------|-----------------------------------------|
//! | 0      | command code / response marker          |
//! | 1..5   | payload length, little endian           |
//! | 5      | slot                                    |
//! | 6      | sequence number                         |
//! | 7      | timeout (command) / status (response)   |
//! | 8      | exchange level (command) / error        |
//! | 9      | reserved (command) / extra (response)   |

pub mod error;
pub mod response;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

pub use error::FrameError;
pub use response::{DataBlock, EscapeBlock, PayloadKind, SlotStatus};

use crate::config::{CcidConfig, Protocol};
use crate::constants::{HEADER_LEN, MAX_T1_PAYLOAD, command, offset};
use crate::error::Result;

/// Builds command frames for one reader session
///
/// The builder owns the sequence counter. Every header it produces takes the
/// current value and increments it, wrapping at 256.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    config: CcidConfig,
    sequence: u8,
}

impl FrameBuilder {
    /// Create a builder with the sequence counter at zero
    pub const fn new(config: CcidConfig) -> Self {
        Self {
            config,
            sequence: 0,
        }
    }

    /// Session configuration
    pub const fn config(&self) -> &CcidConfig {
        &self.config
    }

    /// Sequence number the next header will carry
    pub const fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Change the addressed slot
    pub fn set_slot(&mut self, slot: u8) -> Result<()> {
        self.config = self.config.with_slot(slot)?;
        Ok(())
    }

    /// Change the transfer protocol
    pub const fn set_protocol(&mut self, protocol: Protocol) {
        self.config.protocol = protocol;
    }

    /// Build a header for `code` announcing `payload_len` bytes
    pub fn header(&mut self, code: u8, payload_len: usize) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0] = code;
        header[offset::LENGTH..offset::LENGTH + 4]
            .copy_from_slice(&(payload_len as u32).to_le_bytes());
        header[offset::SLOT] = self.config.slot;
        header[offset::SEQUENCE] = self.sequence;
        header[offset::TIMEOUT] = self.config.timeout;
        header[offset::EXCHANGE_LEVEL] = self.config.exchange_level;

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Build a header-only command frame
    pub fn simple_command(&mut self, code: u8) -> Bytes {
        Bytes::copy_from_slice(&self.header(code, 0))
    }

    /// Power-on command
    pub fn power_on(&mut self) -> Bytes {
        self.simple_command(command::ICC_POWER_ON)
    }

    /// Power-off command
    pub fn power_off(&mut self) -> Bytes {
        self.simple_command(command::ICC_POWER_OFF)
    }

    /// Slot status command
    pub fn slot_status(&mut self) -> Bytes {
        self.simple_command(command::GET_SLOT_STATUS)
    }

    /// Reset-parameters command
    pub fn reset(&mut self) -> Bytes {
        self.simple_command(command::RESET_PARAMETERS)
    }

    /// Escape command carrying `payload` unchanged
    pub fn escape_command(&mut self, payload: &[u8]) -> Bytes {
        let header = self.header(command::ESCAPE, payload.len());
        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
        frame.put_slice(&header);
        frame.put_slice(payload);
        frame.freeze()
    }

    /// Transfer-block command split into segments of at most `max_packet` bytes
    ///
    /// Under T=1 the payload is first wrapped in a block. The first segment
    /// carries the header and as much payload as fits; later segments carry
    /// payload only.
    pub fn xfr_block_segments(
        &mut self,
        payload: &[u8],
        max_packet: usize,
    ) -> std::result::Result<Vec<Bytes>, FrameError> {
        if max_packet < HEADER_LEN {
            return Err(FrameError::PacketSizeTooSmall(max_packet));
        }

        let body = match self.config.protocol {
            Protocol::T0 => Bytes::copy_from_slice(payload),
            Protocol::T1 => wrap_t1(payload)?,
        };
        trace!(protocol = ?self.config.protocol, body = %hex::encode(&body), "Transfer block");

        let header = self.header(command::XFR_BLOCK, body.len());
        let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
        frame.put_slice(&header);
        frame.put(body);
        let mut frame = frame.freeze();

        let mut segments = Vec::with_capacity(frame.len().div_ceil(max_packet));
        while !frame.is_empty() {
            let take = frame.len().min(max_packet);
            segments.push(frame.split_to(take));
        }

        debug!(segments = segments.len(), max_packet, "Segmented transfer block");
        Ok(segments)
    }
}

/// Wrap a payload in a T=1 block: `[00][00][len][payload][lrc]`
///
/// The LRC is the XOR of every preceding byte.
pub fn wrap_t1(payload: &[u8]) -> std::result::Result<Bytes, FrameError> {
    if payload.len() > MAX_T1_PAYLOAD {
        return Err(FrameError::BlockTooLong {
            length: payload.len(),
            max: MAX_T1_PAYLOAD,
        });
    }

    let mut block = BytesMut::with_capacity(payload.len() + 4);
    block.put_u8(0x00);
    block.put_u8(0x00);
    block.put_u8(payload.len() as u8);
    block.put_slice(payload);
    let lrc = block.iter().fold(0u8, |acc, byte| acc ^ byte);
    block.put_u8(lrc);

    Ok(block.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_header_fields() {
        let config = CcidConfig::new()
            .with_slot(2)
            .unwrap()
            .with_timeout(0x05)
            .with_exchange_level(0x01);
        let mut builder = FrameBuilder::new(config);

        let header = builder.header(0x6F, 0x0102_0304);
        assert_eq!(header, hex!("6F 04 03 02 01 02 00 05 01 00"));
        assert_eq!(builder.sequence(), 1);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut builder = FrameBuilder::new(CcidConfig::default());
        for expected in 0..=255u8 {
            assert_eq!(builder.power_on()[offset::SEQUENCE], expected);
        }
        assert_eq!(builder.slot_status()[offset::SEQUENCE], 0);
    }

    #[test]
    fn test_simple_commands() {
        let mut builder = FrameBuilder::new(CcidConfig::default());
        assert_eq!(builder.power_on().as_ref(), hex!("62 00000000 00 00 00 00 00"));
        assert_eq!(builder.power_off().as_ref(), hex!("63 00000000 00 01 00 00 00"));
        assert_eq!(builder.slot_status().as_ref(), hex!("65 00000000 00 02 00 00 00"));
        assert_eq!(builder.reset().as_ref(), hex!("6D 00000000 00 03 00 00 00"));
    }

    #[test]
    fn test_escape_command() {
        let mut builder = FrameBuilder::new(CcidConfig::default());
        let frame = builder.escape_command(&hex!("C5 01 AA"));
        assert_eq!(frame.as_ref(), hex!("6B 03000000 00 00 00 00 00 C5 01 AA"));
    }

    #[test]
    fn test_t1_wrap() {
        let block = wrap_t1(&hex!("00 A4 04 00")).unwrap();
        assert_eq!(block.as_ref(), hex!("00 00 04 00 A4 04 00 A4"));

        assert_eq!(
            wrap_t1(&[0u8; 255]),
            Err(FrameError::BlockTooLong {
                length: 255,
                max: 254
            })
        );
    }

    #[test]
    fn test_segment_count_and_reassembly() {
        let payload: Vec<u8> = (0..200u8).collect();

        for max_packet in [10, 11, 16, 64, 210, 211, 512] {
            let mut builder = FrameBuilder::new(CcidConfig::default());
            let segments = builder.xfr_block_segments(&payload, max_packet).unwrap();

            assert_eq!(segments.len(), (payload.len() + 10).div_ceil(max_packet));
            assert!(segments.iter().all(|s| s.len() <= max_packet));

            let joined: Vec<u8> = segments.iter().flat_map(|s| s.iter().copied()).collect();
            assert_eq!(&joined[..HEADER_LEN], hex!("6F C8000000 00 00 00 00 00"));
            assert_eq!(&joined[HEADER_LEN..], payload.as_slice());
        }
    }

    #[test]
    fn test_t1_segments_announce_wrapped_length() {
        let config = CcidConfig::new().with_protocol(Protocol::T1);
        let mut builder = FrameBuilder::new(config);
        let segments = builder.xfr_block_segments(&hex!("80 B4 00 00"), 64).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(
            segments[0].as_ref(),
            hex!("6F 08000000 00 00 00 00 00 00 00 04 80 B4 00 00 30")
        );
    }

    #[test]
    fn test_packet_size_too_small() {
        let mut builder = FrameBuilder::new(CcidConfig::default());
        assert_eq!(
            builder.xfr_block_segments(&[0x00], 9),
            Err(FrameError::PacketSizeTooSmall(9))
        );
        // A rejected request does not consume a sequence number
        assert_eq!(builder.sequence(), 0);
    }
}
