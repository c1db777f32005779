//! Compression into ARZ streams
//!

use bon::Builder;
use tracing::{instrument, trace};

use crate::{
    error::{Error, Result},
    lzss,
    types::{ArzHeader, ArzMode, ArzVariant, HEADER_SIZE, MAX_RAW_SIZE, XOR_KEY},
};

/// Options for how a stream should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct CompressOptions {
    /// The magic to start the stream with
    #[builder(default)]
    pub variant: ArzVariant,

    /// The requested payload mode
    ///
    /// [`ArzMode::Lzss`] still falls back to [`ArzMode::Stored`] when encoding would not shrink
    /// the data.
    #[builder(default)]
    pub mode: ArzMode,
}

/// Compress `data` into an `"ARZ"` stream using LZSS where it helps.
///
/// ```
/// let stream = ga2_arz::compress(&[0u8; 64])?;
/// assert_eq!(&stream[..4], b"ARZ1");
/// assert!(stream.len() < 64);
/// # Ok::<(), ga2_arz::error::Error>(())
/// ```
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with(data, CompressOptions::default())
}

/// The raw size a header records for `len` bytes
fn raw_size(len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|size| *size <= MAX_RAW_SIZE)
        .ok_or(Error::InputTooLarge(len))
}

/// Compress `data` with explicit options.
///
/// An empty input produces an empty stream. Fails with [`Error::InputTooLarge`] when the size
/// does not fit a header.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn compress_with(data: &[u8], options: CompressOptions) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let declared = raw_size(data.len())?;

    let mut mode = options.mode;
    let encoded = match mode {
        ArzMode::Lzss => Some(lzss::encode(data)).filter(|encoded| encoded.len() < data.len()),
        ArzMode::Stored => None,
    };
    if encoded.is_none() && mode == ArzMode::Lzss {
        trace!("lzss did not shrink the data, storing instead");
        mode = ArzMode::Stored;
    }
    let payload = encoded.as_deref().unwrap_or(data);

    let header = ArzHeader::new(options.variant, mode, declared);

    let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
    output.extend_from_slice(&header.magic);
    output.push(header.mode);
    output.extend_from_slice(&header.raw_size.to_le_bytes());
    output.extend(payload.iter().map(|b| b ^ XOR_KEY));
    Ok(output)
}
