//! Nested TLV objects carried by vendor escape commands
//!
//! An escape object is a one-byte tag followed by a length field and a value.
//! The value is either raw data (a leaf) or the concatenated encodings of child
//! objects (a composite).
//!
//! The length field is BER-like but keyed on fixed prefix bytes rather than the
//! high-bit convention:
//!
//! | length            | encoding              |
//! |-------------------|-----------------------|
//! | `< 0x80`          | `LL`                  |
//! | `..= 0xFF`        | `81 LL`               |
//! | `..= 0xFFFF`      | `82 LL LL`            |
//! | `..= 0xFF_FFFF`   | `83 LL LL LL`         |

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

/// Tag reserved for flat data objects, the only tag that can be decoded
pub const FLAT_DATA_TAG: u8 = 0xC5;

/// Largest value length representable by the length field
pub const MAX_LENGTH: usize = 0x00FF_FFFF;

/// Errors raised while encoding an escape object
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Value longer than the 24-bit length field allows
    #[error("Escape object value length {0} exceeds 0xFFFFFF")]
    LengthOverflow(usize),

    /// Composite object without children
    #[error("Escape object {0:#04x} has no data and no elements")]
    EmptyComposite(u8),
}

/// Errors raised while decoding an escape object
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No bytes to decode
    #[error("Empty escape object")]
    Empty,

    /// Length field prefix is not one of the supported forms
    #[error("Unsupported length field {0:#04x}")]
    UnsupportedLengthField(u8),

    /// Fewer bytes present than the length field describes
    #[error("Truncated escape object: {needed} bytes needed, {available} available")]
    Truncated {
        /// Bytes required by the header
        needed: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Tag whose value layout cannot be decoded
    #[error("Decoding escape object tag {0:#04x} is not supported")]
    UnsupportedTag(u8),
}

/// Value of an escape object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw value bytes
    Data(Bytes),
    /// Nested child objects
    Elements(Vec<EscapeObject>),
}

/// A tagged escape object, either a leaf or a composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeObject {
    command: u8,
    body: Body,
}

impl EscapeObject {
    /// Create an empty composite object
    pub const fn new(command: u8) -> Self {
        Self {
            command,
            body: Body::Elements(Vec::new()),
        }
    }

    /// Create a leaf object holding raw data
    pub fn with_data<T: Into<Bytes>>(command: u8, data: T) -> Self {
        Self {
            command,
            body: Body::Data(data.into()),
        }
    }

    /// Create a composite object with a single child
    pub fn with_element(command: u8, element: Self) -> Self {
        Self::with_elements(command, vec![element])
    }

    /// Create a composite object from a list of children
    pub const fn with_elements(command: u8, elements: Vec<Self>) -> Self {
        Self {
            command,
            body: Body::Elements(elements),
        }
    }

    /// Tag byte
    pub const fn command(&self) -> u8 {
        self.command
    }

    /// Object value
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Raw data, if this is a leaf
    pub const fn data(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Data(data) => Some(data),
            Body::Elements(_) => None,
        }
    }

    /// Child objects, if this is a composite
    pub fn elements(&self) -> Option<&[Self]> {
        match &self.body {
            Body::Data(_) => None,
            Body::Elements(elements) => Some(elements),
        }
    }

    /// Append a child to a composite object
    ///
    /// Leaves cannot hold children; the element is handed back in that case.
    pub fn add_element(&mut self, element: Self) -> Result<(), Self> {
        match &mut self.body {
            Body::Elements(elements) => {
                elements.push(element);
                Ok(())
            }
            Body::Data(_) => Err(element),
        }
    }

    /// Encode the object as `[tag][length][value]`
    pub fn serialize(&self) -> Result<Bytes, EncodeError> {
        let value = match &self.body {
            Body::Data(data) => data.clone(),
            Body::Elements(elements) if elements.is_empty() => {
                warn!(tag = self.command, "Serializing composite without elements");
                return Err(EncodeError::EmptyComposite(self.command));
            }
            Body::Elements(elements) => {
                let mut buffer = BytesMut::new();
                for element in elements {
                    buffer.put(element.serialize()?);
                }
                buffer.freeze()
            }
        };

        let mut out = BytesMut::with_capacity(value.len() + 5);
        out.put_u8(self.command);
        put_length(&mut out, value.len())?;
        out.put(value);

        trace!(tag = self.command, encoded = %hex::encode(&out), "Serialized escape object");
        Ok(out.freeze())
    }

    /// Decode an object produced by [`serialize`](Self::serialize)
    ///
    /// Only [`FLAT_DATA_TAG`] objects are decoded. Other tags have their length
    /// field validated and are then rejected with [`DecodeError::UnsupportedTag`],
    /// since their value layout is vendor-defined.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&command, rest) = bytes.split_first().ok_or(DecodeError::Empty)?;
        let (length, header) = read_length(rest)?;

        if command != FLAT_DATA_TAG {
            return Err(DecodeError::UnsupportedTag(command));
        }

        let value = rest
            .get(header..header + length)
            .ok_or(DecodeError::Truncated {
                needed: 1 + header + length,
                available: bytes.len(),
            })?;

        Ok(Self::with_data(command, Bytes::copy_from_slice(value)))
    }
}

/// Append the length field for a value of `length` bytes
fn put_length(out: &mut BytesMut, length: usize) -> Result<(), EncodeError> {
    match length {
        0..=0x7F => out.put_u8(length as u8),
        0x80..=0xFF => {
            out.put_u8(0x81);
            out.put_u8(length as u8);
        }
        0x100..=0xFFFF => {
            out.put_u8(0x82);
            out.put_u16(length as u16);
        }
        0x1_0000..=MAX_LENGTH => {
            out.put_u8(0x83);
            out.put_slice(&(length as u32).to_be_bytes()[1..]);
        }
        _ => return Err(EncodeError::LengthOverflow(length)),
    }
    Ok(())
}

/// Read a length field, returning the value length and the field's own size
fn read_length(bytes: &[u8]) -> Result<(usize, usize), DecodeError> {
    let &first = bytes.first().ok_or(DecodeError::Truncated {
        needed: 2,
        available: 1,
    })?;

    let width = match first {
        0x00..=0x7F => return Ok((first as usize, 1)),
        0x81 => 1,
        0x82 => 2,
        0x83 => 3,
        other => return Err(DecodeError::UnsupportedLengthField(other)),
    };

    let field = bytes.get(1..=width).ok_or(DecodeError::Truncated {
        needed: 2 + width,
        available: 1 + bytes.len(),
    })?;
    let length = field
        .iter()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize);

    Ok((length, 1 + width))
}
