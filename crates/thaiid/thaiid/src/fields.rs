//! Fixed-offset fields of the personal data record
//!
//! The storage applet holds the cardholder record as fixed-width, space padded
//! fields. Values are returned as raw bytes; they are TIS-620 encoded text and
//! decoding is left to the caller.

use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::{Error, Result};

/// Length of the main record, assembled from two reads
pub const RECORD_LEN: usize = 0xFF + 0x7A;

/// Length of the address block
pub const ADDRESS_LEN: usize = 0xAE;

/// Buffer a field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Main personal record
    Record,
    /// Address block
    Address,
}

/// Post-processing applied to a raw field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trim {
    /// Keep the bytes as stored
    None,
    /// Drop trailing spaces
    TrailingSpaces,
    /// Drop trailing spaces, then turn `#` separators into spaces
    Separated,
    /// Keep everything before the first space; a field without one is invalid
    FirstSpace,
}

/// Location and trimming of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Buffer holding the field
    pub source: Source,
    /// Byte range within the buffer
    pub range: Range<usize>,
    /// Trimming rule
    pub trim: Trim,
}

impl FieldSpec {
    const fn new(name: &'static str, source: Source, range: Range<usize>, trim: Trim) -> Self {
        Self {
            name,
            source,
            range,
            trim,
        }
    }

    /// Cut this field out of `buffer` and apply its trimming rule
    pub fn extract(&self, buffer: &[u8]) -> Result<Bytes> {
        let raw = buffer.get(self.range.clone()).ok_or(Error::Field {
            field: self.name,
            reason: "range exceeds buffer",
        })?;

        let value = match self.trim {
            Trim::None => Bytes::copy_from_slice(raw),
            Trim::TrailingSpaces => Bytes::copy_from_slice(trim_trailing_spaces(raw)),
            Trim::Separated => trim_trailing_spaces(raw)
                .iter()
                .map(|&b| if b == b'#' { b' ' } else { b })
                .collect(),
            Trim::FirstSpace => {
                let end = raw.iter().position(|&b| b == b' ').ok_or_else(|| {
                    warn!(field = self.name, "No space terminator in field");
                    Error::Field {
                        field: self.name,
                        reason: "missing space terminator",
                    }
                })?;
                Bytes::copy_from_slice(&raw[..end])
            }
        };
        Ok(value)
    }
}

fn trim_trailing_spaces(raw: &[u8]) -> &[u8] {
    let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &raw[..end]
}

/// Citizen identification number
pub const PERSONAL_ID: FieldSpec = FieldSpec::new("personal_id", Source::Record, 4..17, Trim::None);
/// Thai name, `#` separated
pub const NAME_TH: FieldSpec = FieldSpec::new("name_th", Source::Record, 17..117, Trim::Separated);
/// English name, `#` separated
pub const NAME_EN: FieldSpec = FieldSpec::new("name_en", Source::Record, 117..217, Trim::Separated);
/// Date of birth, `YYYYMMDD` in the Buddhist calendar
pub const BIRTH_DATE: FieldSpec =
    FieldSpec::new("birth_date", Source::Record, 217..225, Trim::None);
/// Issuing office
pub const ISSUER: FieldSpec = FieldSpec::new("issuer", Source::Record, 246..346, Trim::FirstSpace);
/// Issuing office code
pub const ISSUER_CODE: FieldSpec =
    FieldSpec::new("issuer_code", Source::Record, 346..359, Trim::None);
/// Issue date
pub const ISSUE_DATE: FieldSpec =
    FieldSpec::new("issue_date", Source::Record, 359..367, Trim::None);
/// Expiry date
pub const EXPIRE_DATE: FieldSpec =
    FieldSpec::new("expire_date", Source::Record, 367..375, Trim::None);
/// Registered address, `#` separated
pub const ADDRESS: FieldSpec = FieldSpec::new("address", Source::Address, 0..160, Trim::Separated);
/// Picture reference
pub const PICTURE_TAG: FieldSpec =
    FieldSpec::new("picture_tag", Source::Address, 160..174, Trim::None);

/// Every personal field, in record order
pub const PERSONAL_FIELDS: [FieldSpec; 10] = [
    PERSONAL_ID,
    NAME_TH,
    NAME_EN,
    BIRTH_DATE,
    ISSUER,
    ISSUER_CODE,
    ISSUE_DATE,
    EXPIRE_DATE,
    ADDRESS,
    PICTURE_TAG,
];

/// Record ranges joined with `-` to form the card information string
pub const CARD_INFO_PARTS: [Range<usize>; 4] = [375..377, 0..4, 226..237, 238..246];

/// Raw personal data as read from the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalRecord {
    /// Main record
    pub record: Bytes,
    /// Address block
    pub address: Bytes,
}

impl PersonalRecord {
    /// Wrap the two buffers, checking their lengths
    pub fn new(record: Bytes, address: Bytes) -> Result<Self> {
        if record.len() != RECORD_LEN {
            return Err(Error::InvalidLength {
                expected: RECORD_LEN,
                actual: record.len(),
            });
        }
        if address.len() != ADDRESS_LEN {
            return Err(Error::InvalidLength {
                expected: ADDRESS_LEN,
                actual: address.len(),
            });
        }
        Ok(Self { record, address })
    }

    /// Extract one field
    pub fn field(&self, spec: &FieldSpec) -> Result<Bytes> {
        match spec.source {
            Source::Record => spec.extract(&self.record),
            Source::Address => spec.extract(&self.address),
        }
    }

    /// Card information parts joined with `-`
    pub fn card_info(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(26);
        for (i, range) in CARD_INFO_PARTS.iter().enumerate() {
            if i > 0 {
                out.put_u8(b'-');
            }
            out.put_slice(&self.record[range.clone()]);
        }
        out.freeze()
    }
}

/// Cardholder data, one raw value per field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalInformation {
    /// Card information string
    pub card_info: Bytes,
    /// Citizen identification number
    pub personal_id: Bytes,
    /// Thai name
    pub name_th: Bytes,
    /// English name
    pub name_en: Bytes,
    /// Date of birth
    pub birth_date: Bytes,
    /// Registered address
    pub address: Bytes,
    /// Picture reference
    pub picture_tag: Bytes,
    /// Issuing office
    pub issuer: Bytes,
    /// Issuing office code
    pub issuer_code: Bytes,
    /// Issue date
    pub issue_date: Bytes,
    /// Expiry date
    pub expire_date: Bytes,
}

impl TryFrom<&PersonalRecord> for PersonalInformation {
    type Error = Error;

    fn try_from(record: &PersonalRecord) -> Result<Self> {
        Ok(Self {
            card_info: record.card_info(),
            personal_id: record.field(&PERSONAL_ID)?,
            name_th: record.field(&NAME_TH)?,
            name_en: record.field(&NAME_EN)?,
            birth_date: record.field(&BIRTH_DATE)?,
            address: record.field(&ADDRESS)?,
            picture_tag: record.field(&PICTURE_TAG)?,
            issuer: record.field(&ISSUER)?,
            issuer_code: record.field(&ISSUER_CODE)?,
            issue_date: record.field(&ISSUE_DATE)?,
            expire_date: record.field(&EXPIRE_DATE)?,
        })
    }
}
