//! Shift_JIS string handling for container string pools.

use std::{
    borrow::Cow,
    collections::HashMap,
    io::{Read, Seek, SeekFrom},
};

use byteorder::ReadBytesExt;
use encoding_rs::SHIFT_JIS;

use crate::error::Result;

/// Decode Shift_JIS bytes, replacing invalid sequences
pub fn decode(bytes: &[u8]) -> String {
    let (text, _) = SHIFT_JIS.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Encode a string as Shift_JIS
///
/// Characters without a Shift_JIS mapping are written as HTML numeric references.
pub fn encode(text: &str) -> Cow<'_, [u8]> {
    let (bytes, _, _) = SHIFT_JIS.encode(text);
    bytes
}

/// Reads NUL terminated strings at absolute offsets, caching by offset.
///
/// Offsets at or past the end of the data decode to an empty string, and a string running into the
/// end of the data is cut short there.
#[derive(Debug)]
pub(crate) struct StringReader {
    len: u64,
    cache: HashMap<u64, String>,
}

impl StringReader {
    pub(crate) fn new(len: u64) -> Self {
        Self {
            len,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn read_at<R: Read + Seek>(&mut self, reader: &mut R, offset: u64) -> Result<String> {
        if offset >= self.len {
            return Ok(String::new());
        }
        if let Some(cached) = self.cache.get(&offset) {
            return Ok(cached.clone());
        }

        reader.seek(SeekFrom::Start(offset))?;
        let mut raw = Vec::new();
        for _ in offset..self.len {
            let char = reader.read_u8()?;
            if char == b'\0' {
                break;
            }
            raw.push(char);
        }

        let text = decode(&raw);
        self.cache.insert(offset, text.clone());
        Ok(text)
    }
}

/// String pool under construction
///
/// Identical strings are stored once and share an offset.
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string, returning its offset
    pub fn insert(&mut self, text: &str) -> u32 {
        if let Some(offset) = self.offsets.get(text) {
            return *offset;
        }

        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(&encode(text));
        self.bytes.push(0);
        self.offsets.insert(text.to_owned(), offset);
        offset
    }

    /// Offset of a previously inserted string
    pub fn offset_of(&self, text: &str) -> Option<u32> {
        self.offsets.get(text).copied()
    }

    /// Size of the pool in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been inserted
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The encoded pool
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::{decode, encode, StringPool, StringReader};
    use crate::error::Result;

    #[test]
    fn shift_jis_round_trip() {
        // "テスト"
        let bytes = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67];
        assert_eq!(decode(&bytes), "テスト");
        assert_eq!(encode("テスト").as_ref(), &bytes);
    }

    #[test]
    fn pool_deduplicates() {
        let mut pool = StringPool::new();
        assert_eq!(pool.insert("adv.dat"), 0);
        assert_eq!(pool.insert("scn"), 8);
        assert_eq!(pool.insert("adv.dat"), 0);
        assert_eq!(pool.offset_of("scn"), Some(8));
        assert_eq!(pool.offset_of("SCN"), None);
        assert_eq!(pool.as_bytes(), b"adv.dat\0scn\0");
    }

    #[test]
    fn read_strings() -> Result<()> {
        let data = b"first\0second\0tail";
        let mut cursor = Cursor::new(data);
        let mut strings = StringReader::new(data.len() as u64);

        assert_eq!(strings.read_at(&mut cursor, 0)?, "first");
        assert_eq!(strings.read_at(&mut cursor, 6)?, "second");
        assert_eq!(strings.read_at(&mut cursor, 8)?, "cond");
        assert_eq!(strings.read_at(&mut cursor, 13)?, "tail");
        assert_eq!(strings.read_at(&mut cursor, 100)?, "");
        assert_eq!(strings.read_at(&mut cursor, 0)?, "first");

        Ok(())
    }
}
