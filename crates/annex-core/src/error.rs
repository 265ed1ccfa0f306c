use thiserror::Error;

/// Protocol-wide error types for the Annex workspace.
///
/// Accrual-specific failures live in `annex_flywheel::FlywheelError`; this
/// type covers the plumbing around it (storage, encoding, configuration).
#[derive(Debug, Error)]
pub enum AnnexError {
    /// Storage layer error (RocksDB, snapshot store).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed caller input (bad identifier, bad number).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for AnnexError {
    fn from(e: serde_json::Error) -> Self {
        AnnexError::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for AnnexError {
    fn from(e: hex::FromHexError) -> Self {
        AnnexError::InvalidInput(e.to_string())
    }
}
