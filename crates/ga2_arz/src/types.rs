//! Base types for the structure of an ARZ stream.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// Size of the header in front of every ARZ payload
pub const HEADER_SIZE: usize = 8;

/// Key every payload byte is XOR-ed with
pub const XOR_KEY: u8 = 0x72;

/// Largest raw size a header may declare
pub const MAX_RAW_SIZE: u32 = i32::MAX as u32;

/// Identifies which magic a stream starts with
///
/// Both variants share the same payload encoding, only the first three bytes differ.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ArzVariant {
    /// `"ARZ"`
    #[default]
    Arz,

    /// `" 3;"`
    Legacy,
}

impl ArzVariant {
    /// The magic bytes written for this variant
    pub const fn magic(self) -> [u8; 3] {
        match self {
            ArzVariant::Arz => *b"ARZ",
            ArzVariant::Legacy => *b" 3;",
        }
    }

    /// Identify a variant from its magic bytes
    pub fn from_magic(magic: [u8; 3]) -> Option<Self> {
        match &magic {
            b"ARZ" => Some(ArzVariant::Arz),
            b" 3;" => Some(ArzVariant::Legacy),
            _ => None,
        }
    }
}

/// Identifies how the payload following the header is stored
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ArzMode {
    /// Payload is a verbatim (obfuscated) copy of the data
    Stored,

    /// Payload is LZSS encoded
    #[default]
    Lzss,
}

impl ArzMode {
    /// The ASCII digit written for this mode
    pub const fn as_char(self) -> u8 {
        match self {
            ArzMode::Stored => b'0',
            ArzMode::Lzss => b'1',
        }
    }

    /// Identify a mode from the hex digit stored in the header
    pub fn from_char(value: u8) -> Option<Self> {
        let digit = match value {
            b'0'..=b'9' => value - b'0',
            b'A'..=b'F' => value - b'A' + 10,
            b'a'..=b'f' => value - b'a' + 10,
            _ => return None,
        };

        match digit {
            0 => Some(ArzMode::Stored),
            1 => Some(ArzMode::Lzss),
            _ => None,
        }
    }
}

/// ARZ stream header
///
/// The fields are kept in their raw form so that a header can be read before it is known to be
/// valid. Use [`ArzHeader::parse`] to read and validate in one step.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ArzHeader {
    /// The three magic bytes
    pub magic: [u8; 3],

    /// The mode as an ASCII hex digit
    pub mode: u8,

    /// The size of the payload after decompression
    pub raw_size: u32,
}

impl ArzHeader {
    /// Create a header for a payload of `raw_size` bytes
    pub fn new(variant: ArzVariant, mode: ArzMode, raw_size: u32) -> Self {
        Self {
            magic: variant.magic(),
            mode: mode.as_char(),
            raw_size,
        }
    }

    /// Read the header from the start of `data` and check every field
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedHeader(data.len()));
        }

        let header = ArzHeader::read(&mut Cursor::new(&data[..HEADER_SIZE]))?;
        header.validate()?;
        Ok(header)
    }

    /// Check the magic, mode and raw size of this header
    pub fn validate(&self) -> Result<()> {
        if ArzVariant::from_magic(self.magic).is_none() {
            return Err(Error::InvalidMagic(self.magic));
        }
        if ArzMode::from_char(self.mode).is_none() {
            return Err(Error::InvalidMode(self.mode));
        }
        if self.raw_size == 0 || self.raw_size > MAX_RAW_SIZE {
            return Err(Error::InvalidRawSize(self.raw_size));
        }
        Ok(())
    }

    /// The magic variant, if known
    pub fn variant(&self) -> Option<ArzVariant> {
        ArzVariant::from_magic(self.magic)
    }

    /// The payload mode, if known
    pub fn payload_mode(&self) -> Option<ArzMode> {
        ArzMode::from_char(self.mode)
    }

    /// Serialize the header into its 8 byte form
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buffer = Cursor::new([0u8; HEADER_SIZE]);
        self.write(&mut buffer)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::types::{ArzHeader, ArzMode, ArzVariant};

    #[test]
    fn read_lzss_header() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x41, 0x52, 0x5A, 0x31,
            0x0C, 0x00, 0x00, 0x00,
        ];

        let header = ArzHeader::parse(&input)?;
        assert_eq!(header, ArzHeader::new(ArzVariant::Arz, ArzMode::Lzss, 12));
        assert_eq!(header.variant(), Some(ArzVariant::Arz));
        assert_eq!(header.payload_mode(), Some(ArzMode::Lzss));

        Ok(())
    }

    #[test]
    fn read_legacy_stored_header() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x20, 0x33, 0x3B, 0x30,
            0x00, 0x01, 0x00, 0x00,
        ];

        let header = ArzHeader::parse(&input)?;
        assert_eq!(header.variant(), Some(ArzVariant::Legacy));
        assert_eq!(header.payload_mode(), Some(ArzMode::Stored));
        assert_eq!(header.raw_size, 256);

        Ok(())
    }

    #[test]
    fn write_header() -> Result<()> {
        let header = ArzHeader::new(ArzVariant::Arz, ArzMode::Stored, 0x0102_0304);
        assert_eq!(
            header.to_bytes()?,
            [0x41, 0x52, 0x5A, 0x30, 0x04, 0x03, 0x02, 0x01]
        );

        Ok(())
    }

    #[test]
    fn reject_short_header() {
        assert!(matches!(
            ArzHeader::parse(b"ARZ1"),
            Err(Error::TruncatedHeader(4))
        ));
    }

    #[test]
    fn reject_bad_magic() {
        assert!(matches!(
            ArzHeader::parse(b"ZIP1\x01\x00\x00\x00"),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn reject_unknown_mode() {
        assert!(matches!(
            ArzHeader::parse(b"ARZA\x01\x00\x00\x00"),
            Err(Error::InvalidMode(b'A'))
        ));
        assert!(matches!(
            ArzHeader::parse(b"ARZ?\x01\x00\x00\x00"),
            Err(Error::InvalidMode(b'?'))
        ));
    }

    #[test]
    fn reject_zero_and_oversized_raw_size() {
        assert!(matches!(
            ArzHeader::parse(b"ARZ1\x00\x00\x00\x00"),
            Err(Error::InvalidRawSize(0))
        ));
        assert!(matches!(
            ArzHeader::parse(b"ARZ1\x00\x00\x00\x80"),
            Err(Error::InvalidRawSize(0x8000_0000))
        ));
    }

    #[test]
    fn hex_digits_beyond_one_are_not_modes() {
        assert_eq!(ArzMode::from_char(b'1'), Some(ArzMode::Lzss));
        assert_eq!(ArzMode::from_char(b'f'), None);
        assert_eq!(ArzMode::from_char(b'g'), None);
    }
}
