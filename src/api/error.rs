//! API error handling.
//!
//! Every failure becomes a JSON body whose `detail` starts with a
//! machine-parsable code, e.g. `COOKIES_REQUIRED: ...`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::downloader::{DownloadError, ErrorKind};

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// `<code>: <message>`
    pub detail: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn detail(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            detail: self.detail(),
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::AuthenticationRequired => StatusCode::BAD_GATEWAY,
            ErrorKind::NetworkUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::FormatUnavailable => StatusCode::BAD_REQUEST,
            ErrorKind::ArtifactMissing | ErrorKind::ExtractionFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(
                kind = %kind,
                operator_action = kind.is_operator_retryable(),
                error = %err.raw_message(),
                "request failed"
            );
        } else {
            tracing::warn!(
                kind = %kind,
                operator_action = kind.is_operator_retryable(),
                "request failed"
            );
        }

        ApiError::new(status, kind.code(), err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_maps_to_bad_gateway() {
        let err: ApiError = DownloadError::AuthenticationRequired("Sign in".into()).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(err.detail().starts_with("COOKIES_REQUIRED: "));
    }

    #[test]
    fn test_format_unavailable_is_client_error() {
        let err: ApiError = DownloadError::FormatUnavailable("nope".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "FORMAT_NOT_AVAILABLE");
    }

    #[test]
    fn test_extraction_failure_keeps_raw_message() {
        let err: ApiError = DownloadError::ExtractionFailed("ERROR: weird".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail().contains("ERROR: weird"));
    }

    #[test]
    fn test_network_is_service_unavailable() {
        let err: ApiError = DownloadError::NetworkUnreachable("Timed out after 5s".into()).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
