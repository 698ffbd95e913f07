//! Service error taxonomy.
//!
//! Every use case returns [`ServiceError`]; the HTTP layer maps each
//! variant onto a status code and the JSON error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user already registered")]
    AlreadyRegistered,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// The aggregate changed between read and write.
    #[error("aggregate was modified concurrently")]
    ConcurrencyConflict,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_)
            | ServiceError::AlreadyRegistered
            | ServiceError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidRefreshToken => StatusCode::FORBIDDEN,
            ServiceError::ConcurrencyConflict => StatusCode::CONFLICT,
            ServiceError::Persistence(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Persistence(_) | ServiceError::Internal(_) => {
                "something went wrong".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Persistence(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed with server error");
        }
        let body = json!({
            "error": self.public_message(),
            "status": status.as_u16(),
            "data": null,
        });

        (status, Json(body)).into_response()
    }
}

/// Run `f` under a plain-text subscriber and return what it logged.
#[cfg(test)]
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::AlreadyRegistered.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::NotFound("u".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Unauthorized("t".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ServiceError::InvalidRefreshToken.status(), StatusCode::FORBIDDEN);
        assert_eq!(ServiceError::ConcurrencyConflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::Persistence("db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_storage_details() {
        let err = ServiceError::Persistence("disk I/O error at /var/db".into());
        assert_eq!(err.public_message(), "something went wrong");

        let err = ServiceError::NotFound("user a@b.c".into());
        assert_eq!(err.public_message(), "not found: user a@b.c");
    }

    #[test]
    fn test_server_errors_are_logged_with_detail() {
        let mut response = None;
        let logs = capture_logs(|| {
            response = Some(ServiceError::Persistence("disk I/O error at /var/db".into()).into_response());
        });

        assert_eq!(
            response.map(|r| r.status()),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("disk I/O error at /var/db"));
    }

    #[test]
    fn test_client_errors_are_not_logged_as_errors() {
        let logs = capture_logs(|| {
            let _ = ServiceError::NotFound("user a@b.c".into()).into_response();
        });
        assert!(!logs.contains("ERROR"));
    }
}
