//! This library handles compressing and decompressing **ARZ** streams used by *Galaxy Angel II*.
//!
//! # ARZ Stream Format Documentation
//!
//! Every payload stored inside a PIDX container (see the `ga2_pidx` crate) may be wrapped in an ARZ
//! stream. The stream is a small fixed header followed by an obfuscated payload which is either a
//! verbatim copy of the data or an LZSS encoding of it.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic                  | 3 bytes: `"ARZ"`, or the legacy `" 3;"`                    |
//! | 0x0003         | Mode                   | 1 byte: ASCII hex digit, `'0'` stored or `'1'` LZSS        |
//! | 0x0004         | Raw Size               | 4 bytes: Size of the payload once decompressed             |
//! | 0x0008         | Payload                | Every byte XOR-ed with `0x72`                              |
//!
//! ### Stored Payload
//!
//! With mode `'0'` the payload holds exactly **Raw Size** bytes, obfuscated but otherwise untouched.
//!
//! ### LZSS Payload
//!
//! With mode `'1'` the payload is a sequence of groups. Each group starts with a flag byte whose bits,
//! read from the least significant one, describe up to eight tokens:
//!
//! - **bit set**: one literal byte follows.
//! - **bit clear**: a two byte back-reference `lo, hi` follows. The window offset is
//!   `lo | (hi & 0xF0) << 4` and the length is `(hi & 0x0F) + 3`, so matches span 3 to 18 bytes.
//!
//! References address a 4096 byte ring buffer, zero filled, whose write cursor starts at `0xFEE`.
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Empty payloads**: an empty stream stands for an empty payload, as a header with a raw size
//!   of zero is rejected
//!

pub mod error;
mod lzss;
pub mod read;
pub mod types;
pub mod write;

pub use read::{decompress, decompress_or_raw, peek_header};
pub use types::{ArzHeader, ArzMode, ArzVariant};
pub use write::{compress, compress_with, CompressOptions};
