//! Bulk transport abstraction and the frame exchange built on it
//!
//! A [`BulkTransport`] moves raw packets and knows nothing about frames. The
//! [`Transceiver`] writes segmented command frames and reassembles multi-packet
//! responses using the length field of the first packet.

pub mod error;

use std::fmt;

use bytes::{Bytes, BytesMut};
pub use error::TransportError;
use tracing::{debug, instrument, trace, warn};

use crate::constants::HEADER_LEN;
use crate::frame::response::frame_length;

/// Upper bound on the buffer reserved from a reader-declared length
const MAX_RESERVE: usize = 0x1_0000;

/// Trait for packetized bulk transports
///
/// Both directions block until the transfer completes or the transport's own
/// timeout fires.
pub trait BulkTransport: fmt::Debug {
    /// Error type returned by the transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write one packet and return the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        trace!(packet = %hex::encode(data), "Writing packet");
        let result = self.do_write(data);
        if let Err(e) = &result {
            debug!(error = %e, "Transport error during write");
        }
        result
    }

    /// Internal implementation of write
    /// This is the method that concrete implementations should override
    fn do_write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read one packet into `buf` and return the number of bytes received
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let result = self.do_read(buf);
        match &result {
            Ok(n) => {
                trace!(packet = %hex::encode(&buf[..*n]), "Read packet");
            }
            Err(e) => {
                debug!(error = %e, "Transport error during read");
            }
        }
        result
    }

    /// Internal implementation of read
    fn do_read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Largest packet the transport moves in one transfer
    fn max_packet_size(&self) -> usize;
}

/// One request/response exchange over a bulk transport
#[derive(Debug)]
pub struct Transceiver<T: BulkTransport> {
    transport: T,
}

impl<T: BulkTransport> Transceiver<T> {
    /// Wrap a transport
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Packet size reported by the transport
    pub fn max_packet_size(&self) -> usize {
        self.transport.max_packet_size()
    }

    /// Write each segment in order
    pub fn exchange(&mut self, segments: &[Bytes]) -> Result<(), TransportError> {
        for segment in segments {
            let written = self
                .transport
                .write(segment)
                .map_err(TransportError::write)?;
            if written != segment.len() {
                warn!(written, expected = segment.len(), "Short write");
                return Err(TransportError::ShortWrite {
                    written,
                    expected: segment.len(),
                });
            }
        }
        Ok(())
    }

    /// Read packets until the frame announced by the first one is complete
    ///
    /// The returned buffer is not trimmed and may carry trailing padding past
    /// the declared frame length.
    pub fn receive_frame(&mut self) -> Result<Bytes, TransportError> {
        let mut packet = vec![0u8; self.max_packet_size()];

        let n = self.transport.read(&mut packet).map_err(TransportError::read)?;
        if n < HEADER_LEN {
            warn!(received = n, "Response packet shorter than frame header");
            return Err(TransportError::ShortRead(n));
        }

        let expected = frame_length(&packet[..n]).map_err(|e| {
            warn!(error = %e, "Rejecting response header");
            TransportError::InvalidHeader(e)
        })?;
        let mut frame = BytesMut::with_capacity(expected.min(MAX_RESERVE).max(n));
        frame.extend_from_slice(&packet[..n]);

        while frame.len() < expected {
            let n = self.transport.read(&mut packet).map_err(TransportError::read)?;
            if n == 0 {
                warn!(received = frame.len(), expected, "Transport ran dry mid-frame");
                return Err(TransportError::Incomplete {
                    received: frame.len(),
                    expected,
                });
            }
            frame.extend_from_slice(&packet[..n]);
        }

        debug!(length = frame.len(), expected, "Received frame");
        Ok(frame.freeze())
    }

    /// Write a segmented command and read back its response frame
    #[instrument(level = "trace", skip_all, fields(segments = segments.len()))]
    pub fn transceive(&mut self, segments: &[Bytes]) -> Result<Bytes, TransportError> {
        self.exchange(segments)?;
        self.receive_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockError, MockTransport, data_block_frame};
    use hex_literal::hex;

    #[test]
    fn test_exchange_writes_all_segments() {
        let mut transceiver = Transceiver::new(MockTransport::new(16));
        let segments = [
            Bytes::from_static(&hex!("6F 08000000 00 00 00 00 00 01 02 03 04 05")),
            Bytes::from_static(&hex!("06 07 08")),
        ];

        transceiver.exchange(&segments).unwrap();
        assert_eq!(transceiver.transport().written, segments.to_vec());
    }

    #[test]
    fn test_short_write() {
        let mut transport = MockTransport::new(16);
        transport.write_limit = Some(4);
        let mut transceiver = Transceiver::new(transport);

        let err = transceiver
            .exchange(&[Bytes::from_static(&[0u8; 10])])
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::ShortWrite {
                written: 4,
                expected: 10
            }
        ));
    }

    #[test]
    fn test_write_failure() {
        let mut transport = MockTransport::new(16);
        transport.write_error = Some(MockError("pipe stalled".to_string()));
        let mut transceiver = Transceiver::new(transport);

        let err = transceiver
            .transceive(&[Bytes::from_static(&hex!("65 00000000 00 00 00 00 00"))])
            .unwrap_err();
        assert!(matches!(err, TransportError::WriteFailed(_)));
        assert_eq!(err.to_string(), "Failed to write segment: pipe stalled");
        assert!(transceiver.transport().written.is_empty());
        assert_eq!(transceiver.transport().reads, 0);
    }

    #[test]
    fn test_single_packet_frame() {
        let frame = data_block_frame(0, 0, &hex!("90 00"));
        let mut transceiver = Transceiver::new(MockTransport::new(64).with_frame(&frame));

        assert_eq!(transceiver.receive_frame().unwrap(), frame);
    }

    #[test]
    fn test_multi_packet_reassembly() {
        let payload: Vec<u8> = (0..100u8).collect();
        let frame = data_block_frame(0, 0, &payload);
        let mut transceiver = Transceiver::new(MockTransport::new(32).with_frame(&frame));

        let received = transceiver.receive_frame().unwrap();
        assert_eq!(received, frame);
        assert_eq!(transceiver.transport().reads, 4);
    }

    #[test]
    fn test_reassembly_from_short_packets() {
        let payload: Vec<u8> = (0..30u8).collect();
        let frame = data_block_frame(0, 0, &payload);
        let transport = [0..10, 10..17, 17..20, 20..32, 32..40]
            .into_iter()
            .fold(MockTransport::new(64), |mock, range| {
                mock.with_packet(frame.slice(range))
            })
            .with_packet(Bytes::from_static(&hex!("80 00000000 00 01 00 00 00")));
        let mut transceiver = Transceiver::new(transport);

        assert_eq!(transceiver.receive_frame().unwrap(), frame);
        assert_eq!(transceiver.transport().reads, 5);
        // The next frame's packet is left queued
        assert_eq!(transceiver.transport().packets.len(), 1);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_huge_declared_length() {
        let mut transceiver = Transceiver::new(
            MockTransport::new(64)
                .with_packet(Bytes::from_static(&hex!("80 F0FFFFFF 00 00 00 00 00")))
                .with_packet(Bytes::new()),
        );

        assert!(matches!(
            transceiver.receive_frame(),
            Err(TransportError::Incomplete {
                received: 10,
                expected: 0xFFFF_FFFA
            })
        ));
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_unaddressable_declared_length() {
        let mut transceiver = Transceiver::new(
            MockTransport::new(64)
                .with_packet(Bytes::from_static(&hex!("80 FFFFFFFF 00 00 00 00 00"))),
        );

        assert!(matches!(
            transceiver.receive_frame(),
            Err(TransportError::InvalidHeader(
                crate::frame::FrameError::LengthOverflow(u32::MAX)
            ))
        ));
    }

    #[test]
    fn test_padding_is_kept() {
        let mut packet = data_block_frame(0, 0, &hex!("90 00")).to_vec();
        packet.extend_from_slice(&[0u8; 4]);
        let mut transceiver =
            Transceiver::new(MockTransport::new(64).with_packet(Bytes::from(packet.clone())));

        assert_eq!(transceiver.receive_frame().unwrap().as_ref(), packet.as_slice());
    }

    #[test]
    fn test_short_read() {
        let mut transceiver = Transceiver::new(
            MockTransport::new(64).with_packet(Bytes::from_static(&hex!("80 02 00 00"))),
        );
        assert!(matches!(
            transceiver.receive_frame(),
            Err(TransportError::ShortRead(4))
        ));
    }

    #[test]
    fn test_incomplete_frame() {
        let frame = data_block_frame(0, 0, &[0xAA; 40]);
        let mut transceiver = Transceiver::new(
            MockTransport::new(32)
                .with_packet(frame.slice(..32))
                .with_packet(Bytes::new()),
        );

        assert!(matches!(
            transceiver.receive_frame(),
            Err(TransportError::Incomplete {
                received: 32,
                expected: 50
            })
        ));
    }

    #[test]
    fn test_read_failure() {
        let mut transceiver = Transceiver::new(MockTransport::new(64).with_read_error("stall"));
        let err = transceiver.receive_frame().unwrap_err();

        assert!(matches!(err, TransportError::ReadFailed(_)));
        assert_eq!(err.to_string(), "Failed to read packet: stall");
    }
}
