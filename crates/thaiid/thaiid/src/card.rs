//! Card command surface and record readers

use bytes::{Bytes, BytesMut};
use nexum_ccid_core::{BulkTransport, CcidReader, DataBlock, EscapeBlock, PayloadKind};
use tracing::{Level, debug, info, instrument, warn};

use crate::apdu::{ApduSession, Command, StatusWord};
use crate::commands::{self, Applet};
use crate::crypto::{CHALLENGE_LEN, Challenge, Pin, PinAnswer};
use crate::fields::{PersonalInformation, PersonalRecord};
use crate::pin::{PinStatus, PinVerifier};
use crate::{Error, Result, ResultExt};

/// Length of the chip serial record returned by GET DATA
const CARD_ID_RECORD_LEN: usize = 45;

/// Length of the chip administration record
const CHIP_INFO_LEN: usize = 0x17;

/// Picture offset in the storage applet
const PICTURE_OFFSET: u16 = 0x017B;

/// Picture length in bytes, including space padding
const PICTURE_LEN: usize = 5118;

/// Largest block read in one command
const MAX_READ: usize = 0xFF;

/// Personal record reads: (offset, length)
const RECORD_READS: [(u16, u8); 2] = [(0x0000, 0xFF), (0x00FF, 0x7A)];

/// Address block read: (offset, length)
const ADDRESS_READ: (u16, u8) = (0x1579, 0xAE);

/// Chip administration data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    /// Major and minor version
    pub version: (u8, u8),
    /// Lifecycle state
    pub state: u8,
    /// Authorization level
    pub authorize: u8,
    /// Laser-engraved number, raw ASCII
    pub laser_number: Bytes,
}

impl ChipInfo {
    fn parse(data: &[u8]) -> Self {
        Self {
            version: (data[0], data[1]),
            state: data[2],
            authorize: data[3],
            laser_number: Bytes::copy_from_slice(&data[7..23]),
        }
    }
}

/// A Thai national ID card behind a reader
#[derive(Debug)]
pub struct ThaiIdCard<T: BulkTransport> {
    session: ApduSession<T>,
}

impl<T: BulkTransport> ThaiIdCard<T> {
    /// Wrap a reader session
    pub const fn new(reader: CcidReader<T>) -> Self {
        Self {
            session: ApduSession::new(reader),
        }
    }

    /// Create a card over a transport with the default reader configuration
    pub fn from_transport(transport: T) -> Self {
        Self::new(CcidReader::new(transport))
    }

    /// Get a reference to the APDU session
    pub const fn session(&self) -> &ApduSession<T> {
        &self.session
    }

    /// Get a mutable reference to the APDU session
    pub const fn session_mut(&mut self) -> &mut ApduSession<T> {
        &mut self.session
    }

    /// Take ownership of the APDU session
    pub fn into_session(self) -> ApduSession<T> {
        self.session
    }

    /// Whether a card answers power-on with an ATR
    #[instrument(level = "debug", skip(self))]
    pub fn is_inserted(&mut self) -> Result<bool> {
        let block = self.session.reader_mut().power_on()?;
        let inserted = block.kind == PayloadKind::Atr && block.is_ok();
        debug!(inserted, atr = %hex::encode(&block.data), "Card presence");
        Ok(inserted)
    }

    /// Select an application
    #[instrument(level = "debug", skip(self))]
    pub fn select_applet(&mut self, applet: Applet) -> Result<()> {
        let block = self.session.send(&applet.select().to_bytes())?;
        check_slot(&block)?;
        Ok(())
    }

    /// Card identifier: hex of bytes 13..21 of the chip serial record
    pub fn card_id(&mut self) -> Result<String> {
        self.select_applet(Applet::ChipData)
            .context("Selecting chip data applet")?;
        let record = self
            .read(&commands::get_card_id(), CARD_ID_RECORD_LEN)
            .context("Reading card id")?;
        Ok(hex::encode(&record[13..21]))
    }

    /// Read a block of the personal data file
    pub fn personal_info_block(&mut self, offset: u16, length: u8) -> Result<Bytes> {
        self.read(&commands::read_binary(offset, length), length as usize)
    }

    /// Read a block of the picture file
    pub fn picture_block(&mut self, offset: u16, length: u8) -> Result<Bytes> {
        self.read(&commands::read_binary(offset, length), length as usize)
    }

    /// Request the 32-byte PIN challenge from the extension applet
    pub fn pin_challenge(&mut self) -> Result<Challenge> {
        let data = self.read(&commands::get_pin_challenge(), CHALLENGE_LEN)?;
        let mut challenge = [0u8; CHALLENGE_LEN];
        challenge.copy_from_slice(&data);
        Ok(challenge)
    }

    /// Submit a computed answer with VERIFY
    ///
    /// The command is sent once; its status word is the result.
    #[instrument(level = "debug", skip_all)]
    pub fn verify_pin_answer(&mut self, answer: &PinAnswer) -> Result<PinStatus> {
        let block = self.session.transmit(&commands::verify_pin(answer).to_bytes())?;
        check_slot(&block)?;

        let Some((_, sw)) = StatusWord::split(&block.data) else {
            return Err(Error::InvalidResponse(format!(
                "verify response too short: {}",
                hex::encode(&block.data)
            )));
        };

        if let Some(remaining) = sw.remaining_attempts() {
            warn!(remaining, "PIN rejected");
            Ok(PinStatus::WrongPin { remaining })
        } else if sw.sw1 == 0x90 {
            info!("PIN verified");
            Ok(PinStatus::Verified)
        } else {
            Err(Error::InvalidResponse(format!("unexpected verify status {sw}")))
        }
    }

    /// Verify a PIN through the challenge-response handshake
    pub fn verify_pin(&mut self, pin: &Pin) -> Result<PinStatus> {
        PinVerifier::new().verify(self, pin)
    }

    /// Send a vendor escape payload to the reader
    pub fn escape(&mut self, payload: &[u8]) -> Result<EscapeBlock> {
        Ok(self.session.reader_mut().escape(payload)?)
    }

    /// Read the raw personal record and address block
    #[instrument(level = "debug", skip(self))]
    pub fn personal_record(&mut self) -> Result<PersonalRecord> {
        self.select_applet(Applet::StorageData)
            .context("Selecting storage applet")?;

        let mut record = BytesMut::new();
        for (offset, length) in RECORD_READS {
            let block = self
                .personal_info_block(offset, length)
                .context(format!("Reading personal block at {offset:#06x}"))?;
            record.extend_from_slice(&block);
        }

        let (offset, length) = ADDRESS_READ;
        let address = self
            .personal_info_block(offset, length)
            .context("Reading address block")?;

        PersonalRecord::new(record.freeze(), address)
    }

    /// Read and split the cardholder record
    pub fn personal_information(&mut self) -> Result<PersonalInformation> {
        PersonalInformation::try_from(&self.personal_record()?)
    }

    /// Read the chip administration record
    #[instrument(level = "debug", skip(self))]
    pub fn chip_info(&mut self) -> Result<ChipInfo> {
        self.select_applet(Applet::Extension)
            .context("Selecting extension applet")?;
        let data = self
            .read(&commands::get_chip_info(), CHIP_INFO_LEN)
            .context("Reading chip information")?;
        Ok(ChipInfo::parse(&data))
    }

    /// Read the cardholder picture with trailing space padding removed
    ///
    /// The picture is returned as stored, typically a JPEG stream.
    #[instrument(level = "debug", skip(self))]
    pub fn picture(&mut self) -> Result<Bytes> {
        self.select_applet(Applet::StorageData)
            .context("Selecting storage applet")?;

        let mut picture = BytesMut::with_capacity(PICTURE_LEN);
        let mut offset = PICTURE_OFFSET;
        while picture.len() < PICTURE_LEN {
            let length = (PICTURE_LEN - picture.len()).min(MAX_READ) as u8;
            let block = self
                .picture_block(offset, length)
                .context(format!("Reading picture block at {offset:#06x}"))?;
            picture.extend_from_slice(&block);
            offset += u16::from(length);
        }

        let end = picture.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        picture.truncate(end);
        debug!(length = end, "Read picture");
        Ok(picture.freeze())
    }

    /// Send a chained command expecting `expected` data bytes plus `90 00`
    fn read(&mut self, command: &Command, expected: usize) -> Result<Bytes> {
        let block = self.session.send(&command.to_bytes())?;
        check_slot(&block)?;

        if block.data.len() != expected + 2 {
            warn!(
                expected = expected + 2,
                actual = block.data.len(),
                data = %hex::encode(&block.data),
                "Unexpected response length"
            );
            return Err(Error::InvalidLength {
                expected: expected + 2,
                actual: block.data.len(),
            });
        }

        let Some((_, sw)) = StatusWord::split(&block.data) else {
            return Err(Error::InvalidLength {
                expected: expected + 2,
                actual: block.data.len(),
            });
        };
        if !sw.is_success() {
            let level = sw.tracing_level();
            if level == Level::WARN {
                warn!(%sw, description = sw.description(), "Card returned error status");
            } else if level == Level::INFO {
                info!(%sw, description = sw.description(), "Card returned warning status");
            } else {
                debug!(%sw, description = sw.description(), "Card returned status");
            }
            return Err(Error::CardStatus(sw));
        }
        Ok(block.data.slice(..expected))
    }
}

fn check_slot(block: &DataBlock) -> Result<()> {
    if block.is_ok() {
        Ok(())
    } else {
        Err(Error::SlotError {
            status: block.status,
            error: block.error,
        })
    }
}
