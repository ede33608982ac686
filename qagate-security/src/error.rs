use std::fmt;

use qagate_core::AccessError;

/// Errors surfaced by a data client.
#[derive(Debug)]
pub enum DataError {
    /// The operation was blocked before reaching storage: no verified identity.
    AuthRequired(String),
    /// The table, bucket or object does not exist.
    NotFound(String),
    /// Storage refused the operation (constraint violation, bad request).
    Rejected(String),
    /// Storage could not be reached.
    Transport(String),
    /// A returned row could not be decoded.
    Decode(String),
}

impl DataError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, DataError::AuthRequired(_))
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::AuthRequired(msg) => write!(f, "Authentication required: {msg}"),
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Rejected(msg) => write!(f, "Rejected by storage: {msg}"),
            DataError::Transport(msg) => write!(f, "Storage unreachable: {msg}"),
            DataError::Decode(msg) => write!(f, "Could not decode row: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<DataError> for AccessError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::AuthRequired(msg) => AccessError::AuthRequired(msg),
            other => AccessError::storage(other),
        }
    }
}
