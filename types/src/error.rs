//! Error type for primitive parsing.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}
