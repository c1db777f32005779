//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// stream is shorter than the 8 byte header
    #[error("stream is shorter than the 8 byte header ({0} bytes)")]
    TruncatedHeader(usize),

    /// stream does not start with a known magic
    #[error("stream does not start with a known magic ({0:02X?})")]
    InvalidMagic([u8; 3]),

    /// stream declares an unknown mode
    #[error("stream declares an unknown mode {0:#04x}")]
    InvalidMode(u8),

    /// stream declares an unusable raw size
    #[error("stream declares an unusable raw size {0}")]
    InvalidRawSize(u32),

    /// input is too large for a header to describe
    #[error("input of {0} bytes is too large for an ARZ stream")]
    InputTooLarge(usize),

    /// stream payload ended early
    #[error("stream payload ended after {actual} of {expected} bytes")]
    TruncatedStream {
        /// Raw size declared in the header
        expected: usize,
        /// Bytes actually produced
        actual: usize,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
