use thiserror::Error;

use crate::utils::UtilError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShieldError {
    /// Another request on the same session changed the verifiers mid-rotation
    #[error("Shield rotation aborted by a concurrent rotation")]
    RaceAbort,

    /// Cookies can no longer be written because the response already started
    #[error("Shield cookies cannot be written: response already started")]
    TransportUnavailable,

    #[error("CSRF token mismatch")]
    CsrfMismatch,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
