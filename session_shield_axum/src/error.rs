use http::{Result as HttpResponse, StatusCode};
use session_shield::{SessionError, ShieldError};

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

impl<T> IntoResponseError<T> for Result<T, ShieldError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = match e {
                ShieldError::CsrfMismatch => StatusCode::FORBIDDEN,
                ShieldError::RaceAbort => StatusCode::CONFLICT,
                ShieldError::TransportUnavailable
                | ShieldError::Storage(_)
                | ShieldError::Cookie(_)
                | ShieldError::Utils(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })
    }
}

impl<T> IntoResponseError<T> for Result<T, SessionError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| match e {
            SessionError::Storage(msg) if msg == "Session not found" => {
                (StatusCode::UNAUTHORIZED, msg)
            }
            e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })
    }
}

/// Implementation for http::Error (used by Response::builder())
impl<T> IntoResponseError<T> for HttpResponse<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ShieldError) -> StatusCode {
        let result: Result<(), ShieldError> = Err(err);
        result.into_response_error().unwrap_err().0
    }

    #[test]
    fn test_shield_error_status_codes() {
        assert_eq!(status_of(ShieldError::CsrfMismatch), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ShieldError::RaceAbort), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ShieldError::Storage("down".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_csrf_message_is_kept() {
        let result: Result<(), ShieldError> = Err(ShieldError::CsrfMismatch);
        let (_, message) = result.into_response_error().unwrap_err();
        assert_eq!(message, "CSRF token mismatch");
    }

    #[test]
    fn test_session_error_status_codes() {
        let missing: Result<(), SessionError> =
            Err(SessionError::Storage("Session not found".to_string()));
        assert_eq!(
            missing.into_response_error().unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );

        let corrupt: Result<(), SessionError> = Err(SessionError::Corrupt("x".to_string()));
        assert_eq!(
            corrupt.into_response_error().unwrap_err().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_ok_passes_through() {
        let result: Result<u8, ShieldError> = Ok(7);
        assert_eq!(result.into_response_error(), Ok(7));
    }
}
