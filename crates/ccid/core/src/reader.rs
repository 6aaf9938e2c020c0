//! Reader session binding the frame codec to one transport

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::config::{CcidConfig, Protocol};
use crate::error::{Result, ResultExt};
use crate::frame::{DataBlock, EscapeBlock, FrameBuilder, SlotStatus};
use crate::transport::{BulkTransport, Transceiver};

/// A single-owner session with one reader slot
///
/// The session owns the sequence counter and slot parameters. Every operation
/// is one blocking exchange, and `&mut self` keeps exchanges from interleaving.
#[derive(Debug)]
pub struct CcidReader<T: BulkTransport> {
    builder: FrameBuilder,
    transceiver: Transceiver<T>,
}

impl<T: BulkTransport> CcidReader<T> {
    /// Create a session with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, CcidConfig::default())
    }

    /// Create a session with an explicit configuration
    pub const fn with_config(transport: T, config: CcidConfig) -> Self {
        Self {
            builder: FrameBuilder::new(config),
            transceiver: Transceiver::new(transport),
        }
    }

    /// Session configuration
    pub const fn config(&self) -> &CcidConfig {
        self.builder.config()
    }

    /// Sequence number the next command will carry
    pub const fn sequence(&self) -> u8 {
        self.builder.sequence()
    }

    /// Change the addressed slot
    pub fn set_slot(&mut self, slot: u8) -> Result<()> {
        self.builder.set_slot(slot)
    }

    /// Change the transfer protocol
    pub const fn set_protocol(&mut self, protocol: Protocol) {
        self.builder.set_protocol(protocol);
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        self.transceiver.transport()
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        self.transceiver.transport_mut()
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transceiver.into_transport()
    }

    /// Power the card on and return its ATR block
    #[instrument(level = "debug", skip(self))]
    pub fn power_on(&mut self) -> Result<DataBlock> {
        let frame = self.builder.power_on();
        let response = self.round_trip(frame).context("Power on")?;
        let block = DataBlock::parse(&response).context("Parsing power-on reply")?;
        debug!(kind = ?block.kind, status = block.status, error = block.error, "Power on");
        Ok(block)
    }

    /// Power the card off
    #[instrument(level = "debug", skip(self))]
    pub fn power_off(&mut self) -> Result<SlotStatus> {
        let frame = self.builder.power_off();
        let response = self.round_trip(frame).context("Power off")?;
        SlotStatus::parse(&response).context("Parsing power-off reply")
    }

    /// Query the slot status
    #[instrument(level = "debug", skip(self))]
    pub fn slot_status(&mut self) -> Result<SlotStatus> {
        let frame = self.builder.slot_status();
        let response = self.round_trip(frame).context("Slot status")?;
        SlotStatus::parse(&response).context("Parsing slot status reply")
    }

    /// Reset the protocol parameters
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&mut self) -> Result<SlotStatus> {
        let frame = self.builder.reset();
        let response = self.round_trip(frame).context("Reset parameters")?;
        SlotStatus::parse(&response).context("Parsing reset reply")
    }

    /// Transfer an APDU to the card and return the raw data block
    #[instrument(level = "debug", skip_all, fields(apdu = %hex::encode(apdu)))]
    pub fn transfer(&mut self, apdu: &[u8]) -> Result<DataBlock> {
        let max_packet = self.transceiver.max_packet_size();
        let segments = self.builder.xfr_block_segments(apdu, max_packet)?;
        let response = self
            .transceiver
            .transceive(&segments)
            .context("Transfer block")?;

        let block = DataBlock::parse(&response).context("Parsing transfer reply")?;
        if !block.is_ok() {
            warn!(status = block.status, error = block.error, "Reader reported slot error");
        }
        Ok(block)
    }

    /// Send a vendor escape payload
    #[instrument(level = "debug", skip_all, fields(payload = %hex::encode(payload)))]
    pub fn escape(&mut self, payload: &[u8]) -> Result<EscapeBlock> {
        let frame = self.builder.escape_command(payload);
        let response = self.round_trip(frame).context("Escape")?;
        EscapeBlock::parse(&response).context("Parsing escape reply")
    }

    fn round_trip(&mut self, frame: Bytes) -> Result<Bytes> {
        Ok(self.transceiver.transceive(&[frame])?)
    }
}
