//! Case chaining of APDU exchanges (ISO/IEC 7816-4 procedure bytes)
//!
//! The card answers most commands with two procedure bytes instead of the
//! response itself. `61 XX` means XX bytes are waiting for a GET RESPONSE;
//! `6C XX` means the command must be resent with Le set to XX. The session
//! performs exactly one such follow-up per command.

use nexum_ccid_core::{BulkTransport, CcidReader, DataBlock};
use tracing::{debug, instrument, trace, warn};

use super::{ApduError, Command, StatusWord};
use crate::Result;

/// Progress of the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeState {
    /// No exchange started
    #[default]
    Idle,
    /// Command sent, waiting for procedure bytes
    HeaderSent,
    /// GET RESPONSE sent after `61 XX`
    BodyRequested,
    /// Command resent with the corrected Le after `6C XX`
    Retrying,
    /// Final response received with a clean slot status
    Complete,
    /// Reader reported a slot status or error
    Failed,
}

/// APDU session over a reader
#[derive(Debug)]
pub struct ApduSession<T: BulkTransport> {
    reader: CcidReader<T>,
    state: ExchangeState,
}

impl<T: BulkTransport> ApduSession<T> {
    /// Wrap a reader session
    pub const fn new(reader: CcidReader<T>) -> Self {
        Self {
            reader,
            state: ExchangeState::Idle,
        }
    }

    /// State reached by the last exchange
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Get a reference to the underlying reader
    pub const fn reader(&self) -> &CcidReader<T> {
        &self.reader
    }

    /// Get a mutable reference to the underlying reader
    pub const fn reader_mut(&mut self) -> &mut CcidReader<T> {
        &mut self.reader
    }

    /// Take ownership of the reader and return it
    pub fn into_reader(self) -> CcidReader<T> {
        self.reader
    }

    /// Send a command and follow its procedure bytes once
    ///
    /// A non-zero slot status or error on either exchange is returned as data
    /// in the block; only protocol violations are errors.
    ///
    /// On `6C XX` the whole command is resent with Le = XX, so a case 3
    /// command such as READ BINARY goes out as case 4 with its data field.
    /// Older host software sent only the header `CLA INS P1 P2 XX` here. Which
    /// form the card expects has not been confirmed on hardware.
    #[instrument(level = "debug", skip_all, fields(apdu = %hex::encode(apdu)))]
    pub fn send(&mut self, apdu: &[u8]) -> Result<DataBlock> {
        self.state = ExchangeState::Idle;
        let header = self.exchange(apdu, ExchangeState::HeaderSent)?;
        if !header.is_ok() {
            return Ok(header);
        }

        let &[sw1, sw2] = header.data.as_ref() else {
            warn!(length = header.data.len(), "Procedure bytes have unexpected length");
            self.state = ExchangeState::Failed;
            return Err(ApduError::UnexpectedHeaderLength(header.data.len()).into());
        };

        let procedure = StatusWord::new(sw1, sw2);
        let (follow_up, state) = if procedure.is_more_data_available() {
            debug!(available = sw2, "Requesting response body");
            (Command::new_with_le(0x00, 0xC0, 0x00, 0x00, sw2), ExchangeState::BodyRequested)
        } else if procedure.is_wrong_le() {
            debug!(le = sw2, "Resending with corrected Le");
            let command = Command::from_bytes(apdu).inspect_err(|_| {
                self.state = ExchangeState::Failed;
            })?;
            (command.with_le(sw2), ExchangeState::Retrying)
        } else {
            warn!(%procedure, "Unexpected procedure byte");
            self.state = ExchangeState::Failed;
            return Err(ApduError::UnexpectedProcedureByte(sw1).into());
        };

        let body = self.exchange(&follow_up.to_bytes(), state)?;
        if body.is_ok() {
            self.state = ExchangeState::Complete;
        }
        Ok(body)
    }

    /// Send a command once, without following procedure bytes
    #[instrument(level = "debug", skip_all, fields(apdu = %hex::encode(apdu)))]
    pub fn transmit(&mut self, apdu: &[u8]) -> Result<DataBlock> {
        self.state = ExchangeState::Idle;
        let block = self.exchange(apdu, ExchangeState::HeaderSent)?;
        if block.is_ok() {
            self.state = ExchangeState::Complete;
        }
        Ok(block)
    }

    fn exchange(&mut self, apdu: &[u8], state: ExchangeState) -> Result<DataBlock> {
        let block = self.reader.transfer(apdu).inspect_err(|_| {
            self.state = ExchangeState::Failed;
        })?;
        trace!(?state, kind = ?block.kind, data = %hex::encode(&block.data), "Exchange step");

        self.state = if block.is_ok() {
            state
        } else {
            warn!(status = block.status, error = block.error, "Exchange failed at reader");
            ExchangeState::Failed
        };
        Ok(block)
    }
}
