//! Short command APDUs (ISO/IEC 7816-4)

use bytes::{BufMut, Bytes, BytesMut};

use super::ApduError;

/// A short command APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a case 1 command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a case 2 command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a case 3 command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data.into()),
            le: None,
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Serialized length
    pub fn command_length(&self) -> usize {
        4 + self.data.as_ref().map_or(0, |data| 1 + data.len()) + usize::from(self.le.is_some())
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());
        buffer.put_slice(&[self.cla, self.ins, self.p1, self.p2]);

        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }
        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Parse a command from raw bytes
    ///
    /// A single byte after the header is Le (case 2). Otherwise the byte is Lc
    /// and must be followed by exactly Lc data bytes, optionally plus Le.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ApduError> {
        let (header, body) = bytes
            .split_first_chunk::<4>()
            .ok_or(ApduError::MalformedCommand(bytes.len()))?;
        let [cla, ins, p1, p2] = *header;
        let mut command = Self::new(cla, ins, p1, p2);

        match body {
            [] => {}
            [le] => command.le = Some(*le),
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                if lc == 0 || rest.len() < lc || rest.len() > lc + 1 {
                    return Err(ApduError::MalformedCommand(bytes.len()));
                }
                command.data = Some(Bytes::copy_from_slice(&rest[..lc]));
                command.le = rest.get(lc).copied();
            }
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_serialization_by_case() {
        assert_eq!(
            Command::new(0x80, 0xB4, 0x00, 0x00).to_bytes().as_ref(),
            hex!("80 B4 00 00")
        );
        assert_eq!(
            Command::new_with_le(0x00, 0xC0, 0x00, 0x00, 0x22).to_bytes().as_ref(),
            hex!("00 C0 00 00 22")
        );

        let select = Command::new_with_data(
            0x00,
            0xA4,
            0x04,
            0x00,
            hex!("A0 00 00 00 54 48 00 01").to_vec(),
        );
        assert_eq!(select.command_length(), 13);
        assert_eq!(select.to_bytes().as_ref(), hex!("00 A4 04 00 08 A0 00 00 00 54 48 00 01"));

        let read =
            Command::new_with_data(0x80, 0xB0, 0x00, 0x04, hex!("00").to_vec()).with_le(0x0D);
        assert_eq!(read.to_bytes().as_ref(), hex!("80 B0 00 04 01 00 0D"));
    }

    #[test]
    fn test_parse_each_case() {
        let case1 = Command::from_bytes(&hex!("80 B4 00 00")).unwrap();
        assert!(case1.data.is_none() && case1.le.is_none());

        let case2 = Command::from_bytes(&hex!("80 CA 9F 7F 2D")).unwrap();
        assert_eq!(case2.le, Some(0x2D));
        assert!(case2.data.is_none());

        let case3 = Command::from_bytes(&hex!("00 A4 04 00 02 3F 00")).unwrap();
        assert_eq!(case3.data.as_deref(), Some(&hex!("3F 00")[..]));
        assert!(case3.le.is_none());

        let case4 = Command::from_bytes(&hex!("80 B0 00 04 02 00 0D 0A")).unwrap();
        assert_eq!(case4.data.as_deref(), Some(&hex!("00 0D")[..]));
        assert_eq!(case4.le, Some(0x0A));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            Command::from_bytes(&hex!("80 B4 00")),
            Err(ApduError::MalformedCommand(3))
        );
        // Lc claims more data than present
        assert_eq!(
            Command::from_bytes(&hex!("00 A4 04 00 05 01 02")),
            Err(ApduError::MalformedCommand(7))
        );
        // Trailing bytes after Le
        assert_eq!(
            Command::from_bytes(&hex!("00 A4 04 00 01 01 02 03")),
            Err(ApduError::MalformedCommand(8))
        );
    }

    #[test]
    fn test_replacing_le_round_trips() {
        for raw in [
            &hex!("80 B4 00 00")[..],
            &hex!("80 CA 9F 7F 2D"),
            &hex!("00 A4 04 00 02 3F 00"),
            &hex!("80 B0 00 04 02 00 0D 0A"),
        ] {
            let corrected = Command::from_bytes(raw).unwrap().with_le(0x11).to_bytes();
            assert_eq!(*corrected.last().unwrap(), 0x11);
            assert_eq!(&corrected[..4], &raw[..4]);
        }
    }
}
