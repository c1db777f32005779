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

    /// Transparent warpper for [`ga2_arz::error::Error`]
    #[error(transparent)]
    Codec(#[from] ga2_arz::error::Error),

    /// Workspace manifest could not be read or written
    #[error("invalid workspace manifest")]
    Manifest(#[from] serde_json::Error),

    /// Unable to build the worker pool
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// file is an invalid pidx container
    #[error("file is an invalid pidx container")]
    MalformedContainer(#[from] MalformedContainer),

    /// no original or replacement data exists for a path
    #[error("no original or replacement data for {0}")]
    MissingSource(String),

    /// the data for a path could not be prepared
    #[error("unable to prepare {path}: {reason}")]
    SourceFailed {
        /// Path inside the container
        path: String,
        /// What went wrong while resolving it
        reason: String,
    },

    /// rebuilt container does not fit 32-bit offsets
    #[error("rebuilt container would be {0} bytes, which does not fit 32-bit offsets")]
    ContainerTooLarge(u64),

    /// file is not a global index
    #[error("file is not a global index")]
    NotAnIndex,

    /// the operation was cancelled
    #[error("the operation was cancelled")]
    Cancelled,

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a container is rejected
#[derive(Error, Diagnostic, Debug)]
#[error("file is an invalid pidx container")]
pub enum MalformedContainer {
    /// file is too short to hold a header
    #[error("file is too short to hold a header ({0} bytes)")]
    TooShort(u64),

    /// header magic is not PIDX
    #[error("header magic is not PIDX")]
    BadMagic,

    /// a table lies outside the file
    #[error("{table} spans {start:#x}..{end:#x} but the file is {len:#x} bytes")]
    OutOfBounds {
        /// Which region failed the check
        table: &'static str,
        /// First byte of the region
        start: u64,
        /// One past the last byte of the region
        end: u64,
        /// Length of the file
        len: u64,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
