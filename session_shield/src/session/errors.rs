use thiserror::Error;

use crate::shield::ShieldError;
use crate::storage::StorageError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    /// The stored record could not be decoded
    #[error("Corrupt session record: {0}")]
    Corrupt(String),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<SessionError> for ShieldError {
    fn from(err: SessionError) -> Self {
        ShieldError::Storage(err.to_string())
    }
}
