//! Error types for voltra-parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: unknown directive {directive:?}")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: unsupported device {designator:?}")]
    UnsupportedDevice { line: usize, designator: String },

    #[error(transparent)]
    Device(#[from] voltra_devices::Error),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
