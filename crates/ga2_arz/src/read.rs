//! Decompression of ARZ streams
//!

use std::borrow::Cow;

use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    lzss,
    types::{ArzHeader, ArzMode, HEADER_SIZE, XOR_KEY},
};

/// Check whether `data` starts with a valid ARZ header, without decoding anything.
pub fn peek_header(data: &[u8]) -> Option<ArzHeader> {
    ArzHeader::parse(data).ok()
}

/// Decompress a complete ARZ stream.
///
/// An empty input decodes to an empty payload.
///
/// ```
/// let stream = ga2_arz::compress(b"Hello, Hello, Hello!")?;
/// assert_eq!(ga2_arz::decompress(&stream)?, b"Hello, Hello, Hello!");
/// # Ok::<(), ga2_arz::error::Error>(())
/// ```
#[instrument(skip_all, err, fields(size = data.len()))]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let header = ArzHeader::parse(data)?;
    let expected = header.raw_size as usize;
    let payload = data[HEADER_SIZE..].iter().map(|b| b ^ XOR_KEY);

    let output = match header.payload_mode() {
        Some(ArzMode::Stored) => payload.take(expected).collect::<Vec<_>>(),
        Some(ArzMode::Lzss) => lzss::decode(payload, expected),
        None => return Err(Error::InvalidMode(header.mode)),
    };

    if output.len() < expected {
        return Err(Error::TruncatedStream {
            expected,
            actual: output.len(),
        });
    }

    Ok(output)
}

/// Decompress `data` if it is an ARZ stream, otherwise hand it back untouched.
pub fn decompress_or_raw(data: &[u8]) -> Cow<'_, [u8]> {
    match decompress(data) {
        Ok(output) => Cow::Owned(output),
        Err(err) => {
            debug!("treating block as raw bytes: {err}");
            Cow::Borrowed(data)
        }
    }
}
