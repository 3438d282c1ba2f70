//! Error types for image file operations.

use std::io;
use thiserror::Error;

/// Image file error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Extension or header names a format this crate does not handle.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid or corrupted file.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// PNG encoder failure.
    #[error("PNG encode error: {0}")]
    PngEncode(#[from] png::EncodingError),

    /// PNG decoder failure.
    #[error("PNG decode error: {0}")]
    PngDecode(#[from] png::DecodingError),

    /// Decoded data does not form a valid image.
    #[error(transparent)]
    Image(#[from] datmo_core::Error),
}

impl IoError {
    /// Shorthand for [`IoError::InvalidFile`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidFile(msg.into())
    }
}

/// Result type for image file operations.
pub type IoResult<T> = Result<T, IoError>;
