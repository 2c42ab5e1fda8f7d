//! Error types for the unit model and the main-chain resolver.

use thiserror::Error;
use weave_types::{Address, Hash};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing {} parent unit(s)", .0.len())]
    MissingParents(Vec<Hash>),

    #[error("author {0} is not an active mediator")]
    UnauthorizedAuthor(Address),

    #[error("corruption detected: stored hash {expected}, recomputed {actual}")]
    CorruptionDetected { expected: Hash, actual: Hash },

    #[error("invalid author signature on unit {0}")]
    InvalidSignature(Hash),

    #[error("unit {0} already in the DAG")]
    Duplicate(Hash),

    #[error("not found: {0}")]
    NotFound(Hash),

    #[error("genesis configuration error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl DagError {
    /// Errors after which the same unit may still be accepted later.
    pub fn is_transient(&self) -> bool {
        matches!(self, DagError::MissingParents(_))
    }
}
