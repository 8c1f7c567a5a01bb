//! Closed error taxonomy for NSF notation extraction.

use thiserror::Error;

/// All failures the crate can produce.
///
/// The taxonomy is intentionally small and closed: every operation either
/// succeeds or fails with one of these variants, never a bare string.
#[derive(Error, Debug)]
pub enum NotationError {
    #[error("failed to load emulator library at {path}: {detail}")]
    LibraryLoadFailed { path: String, detail: String },

    #[error("emulator could not open NSF file: {0}")]
    NsfOpenFailed(String),

    #[error("container header does not start with NSFN: saw {0:02x?}")]
    InvalidMagic(Vec<u8>),

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u32),

    #[error("{where_} truncated: need {need} bytes, have {have}")]
    Truncated {
        where_: &'static str,
        need: usize,
        have: usize,
    },

    #[error("unknown channel type in container: {0}")]
    UnknownChannelType(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("play routine was never invoked within {0} frames")]
    PlayNotInvoked(u32),
}

pub type Result<T> = std::result::Result<T, NotationError>;

impl From<serde_json::Error> for NotationError {
    fn from(e: serde_json::Error) -> Self {
        NotationError::EncodingError(e.to_string())
    }
}

impl From<std::str::Utf8Error> for NotationError {
    fn from(e: std::str::Utf8Error) -> Self {
        NotationError::EncodingError(e.to_string())
    }
}
