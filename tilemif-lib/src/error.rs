use std::io;

use thiserror::Error;

/// Everything that can go wrong while converting assets.
///
/// The only silent behaviours in this crate are the blank tile fallback of the
/// renderer and the trailing group truncation of the group reversal. Both are
/// opt-in through explicit parameters, everything else ends up here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("image is {width}x{height} but {expected}")]
    InputDimensionMismatch {
        width: u32,
        height: u32,
        expected: String,
    },

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("tile index {index} is outside the atlas ({len} tiles)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("address {address:#X} does not fit in a 16 bit address field")]
    AddressOverflow { address: usize },

    #[error("parse error on line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("could not persist output: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        return Error::MalformedRecord {
            line,
            reason: reason.into(),
        };
    }

    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        return Error::ParseError {
            line,
            reason: reason.into(),
        };
    }
}
