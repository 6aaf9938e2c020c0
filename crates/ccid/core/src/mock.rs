//! Scripted bulk transport for tests
//!
//! Responses are queued as packets and handed out one per read. Every
//! written segment is recorded so tests can inspect the frames that were sent.

#![allow(missing_docs)]

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{HEADER_LEN, response};
use crate::frame::response::frame_length;
use crate::transport::BulkTransport;

/// Error raised by the mock transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

/// Transport that replays queued packets
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Packet size reported to the transceiver
    pub max_packet_size: usize,
    /// Packets (or failures) returned by successive reads
    pub packets: VecDeque<Result<Bytes, MockError>>,
    /// Segments that were written
    pub written: Vec<Bytes>,
    /// Cap on the bytes accepted per write, to simulate short writes
    pub write_limit: Option<usize>,
    /// Failure returned by every write when set
    pub write_error: Option<MockError>,
    /// Number of read calls served
    pub reads: usize,
}

impl MockTransport {
    /// Create a mock with an empty read queue
    pub const fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size,
            packets: VecDeque::new(),
            written: Vec::new(),
            write_limit: None,
            write_error: None,
            reads: 0,
        }
    }

    /// Queue a single packet
    pub fn with_packet(mut self, packet: Bytes) -> Self {
        self.packets.push_back(Ok(packet));
        self
    }

    /// Queue a frame split into packets of `max_packet_size` bytes
    pub fn with_frame(mut self, frame: &[u8]) -> Self {
        self.push_frame(frame);
        self
    }

    /// Queue a read failure
    pub fn with_read_error(mut self, message: &str) -> Self {
        self.packets.push_back(Err(MockError(message.to_string())));
        self
    }

    /// Queue a frame split into packets of `max_packet_size` bytes
    pub fn push_frame(&mut self, frame: &[u8]) {
        for chunk in frame.chunks(self.max_packet_size.max(1)) {
            self.packets.push_back(Ok(Bytes::copy_from_slice(chunk)));
        }
    }

    /// Written segments regrouped into whole frames
    pub fn sent_frames(&self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        let mut pending = BytesMut::new();

        for segment in &self.written {
            pending.extend_from_slice(segment);
            while pending.len() >= HEADER_LEN {
                let Ok(total) = frame_length(&pending) else {
                    break;
                };
                if pending.len() < total {
                    break;
                }
                frames.push(pending.split_to(total).freeze());
            }
        }

        frames
    }

    /// Payloads of the written frames, without their headers
    pub fn sent_payloads(&self) -> Vec<Bytes> {
        self.sent_frames()
            .into_iter()
            .map(|frame| frame.slice(HEADER_LEN..))
            .collect()
    }
}

impl BulkTransport for MockTransport {
    type Error = MockError;

    fn do_write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        if let Some(error) = &self.write_error {
            return Err(error.clone());
        }

        let accepted = self.write_limit.map_or(data.len(), |limit| data.len().min(limit));
        self.written.push(Bytes::copy_from_slice(&data[..accepted]));
        Ok(accepted)
    }

    fn do_read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.reads += 1;
        let packet = self
            .packets
            .pop_front()
            .ok_or_else(|| MockError("no response queued".to_string()))??;

        let n = packet.len().min(buf.len());
        buf[..n].copy_from_slice(&packet[..n]);
        Ok(n)
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

/// Build a response frame with the given marker and header bytes
pub fn response_frame(marker: u8, status: u8, error: u8, extra: u8, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u8(marker);
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(&[0x00, 0x00, status, error, extra]);
    frame.put_slice(payload);
    frame.freeze()
}

/// Build a data block response frame
pub fn data_block_frame(status: u8, error: u8, payload: &[u8]) -> Bytes {
    response_frame(response::DATA_BLOCK, status, error, 0x00, payload)
}

/// Build an escape response frame
pub fn escape_block_frame(status: u8, error: u8, payload: &[u8]) -> Bytes {
    response_frame(response::ESCAPE, status, error, 0x00, payload)
}

/// Build a slot status response frame
pub fn slot_status_frame(status: u8, error: u8, extra: u8) -> Bytes {
    response_frame(response::SLOT_STATUS, status, error, extra, &[])
}
