//! Crate-wide error taxonomy and result alias.
//!
//! Every error here is deterministic given the same inputs and stored
//! state, except [`LumenError::Storage`] which wraps transient driver
//! failures. Callers may retry `Storage` with backoff; nothing in this
//! crate retries automatically.

use thiserror::Error;

/// Errors surfaced by Lumen services and routes
#[derive(Debug, Error)]
pub enum LumenError {
    /// Referenced entity does not exist (404-equivalent, terminal)
    #[error("{0} not found")]
    NotFound(String),

    /// Debit rejected: the balance cannot cover the amount (400-equivalent)
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Malformed or out-of-range input (400-equivalent)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// State conflict, e.g. duplicate connection request (409-equivalent)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure (503-equivalent, caller may retry)
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl LumenError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        LumenError::NotFound(entity.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        LumenError::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        LumenError::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        LumenError::Storage(msg.into())
    }
}

impl From<mongodb::error::Error> for LumenError {
    fn from(err: mongodb::error::Error) -> Self {
        LumenError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for LumenError {
    fn from(err: std::io::Error) -> Self {
        LumenError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LumenError>;
