//! Infrastructure errors: journal storage, parsing and configuration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("journal encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("journal storage failed: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed address, hash or tag text
    #[error("invalid value: {0}")]
    InvalidArgument(String),

    /// A stored block does not hash or link as recorded
    #[error("chain integrity violated: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }
}
