//! Mapping of failures to HTTP responses.
//!
//! Bodies are JSON `{"detail": "..."}` with short, fixed messages. The only
//! diagnostic detail that reaches a caller is the bounded stderr tail of a
//! failed search.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::gateway::GatewayError;
use crate::query::ValidationError;
use crate::search::SearchError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("invalid form data: {0}")]
    Multipart(#[from] MultipartError),

    #[error("invalid form data: {0}")]
    NotMultipart(#[from] MultipartRejection),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Search(SearchError::Validation(ValidationError::TooLarge { .. })) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Search(SearchError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Search(SearchError::Gateway(GatewayError::Timeout(_))) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Search(SearchError::Gateway(_) | SearchError::Staging(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::NotMultipart(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// What the caller is told.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Search(SearchError::Validation(e)) => match e {
                ValidationError::Empty => "No FASTA provided.".to_string(),
                ValidationError::TooLarge { .. } => "FASTA too large.".to_string(),
                ValidationError::MalformedFormat => {
                    "FASTA should start with '>' header line.".to_string()
                }
                ValidationError::Encoding => "Uploaded file must be UTF-8 text FASTA.".to_string(),
            },
            ApiError::Search(SearchError::Gateway(e)) => match e {
                GatewayError::Timeout(_) => "Search timed out.".to_string(),
                GatewayError::ToolExecution { code, stderr_tail } => {
                    format!("Search tool failed (code {code}): {stderr_tail}")
                }
                GatewayError::Launch(_) => "Search tool could not be started.".to_string(),
            },
            ApiError::Search(SearchError::Staging(_)) => "Failed to stage query.".to_string(),
            ApiError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "FASTA too large.".to_string()
            }
            ApiError::Multipart(_) | ApiError::NotMultipart(_) => "Invalid form data.".to_string(),
        }
    }
}

/// Error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        let body = ErrorResponse {
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::StagingError;
    use crate::gateway::ExitCode;
    use std::io;
    use std::time::Duration;

    fn validation(e: ValidationError) -> ApiError {
        ApiError::Search(SearchError::Validation(e))
    }

    fn gateway(e: GatewayError) -> ApiError {
        ApiError::Search(SearchError::Gateway(e))
    }

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(validation(ValidationError::Empty).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            validation(ValidationError::MalformedFormat).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            validation(ValidationError::Encoding).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            validation(ValidationError::TooLarge { len: 2, max: 1 }).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn gateway_errors_map_to_server_errors() {
        assert_eq!(
            gateway(GatewayError::Timeout(Duration::from_secs(1))).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            gateway(GatewayError::ToolExecution {
                code: ExitCode(Some(1)),
                stderr_tail: String::new()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            gateway(GatewayError::Launch(io::Error::from(io::ErrorKind::NotFound))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn staging_error_is_internal_and_opaque() {
        let err = ApiError::Search(SearchError::Staging(StagingError::from(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "/secret/tmp: permission denied",
        ))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "Failed to stage query.");
    }

    #[test]
    fn launch_error_does_not_leak_paths() {
        let err = gateway(GatewayError::Launch(io::Error::new(
            io::ErrorKind::NotFound,
            "/opt/diamond: not found",
        )));
        assert!(!err.detail().contains("/opt"));
    }

    #[test]
    fn tool_failure_detail_includes_code_and_tail() {
        let err = gateway(GatewayError::ToolExecution {
            code: ExitCode(Some(2)),
            stderr_tail: "Error: database not found".to_string(),
        });
        assert_eq!(
            err.detail(),
            "Search tool failed (code 2): Error: database not found"
        );
    }

    #[test]
    fn messages_are_short_and_fixed() {
        assert_eq!(validation(ValidationError::Empty).detail(), "No FASTA provided.");
        assert_eq!(
            validation(ValidationError::TooLarge { len: 2, max: 1 }).detail(),
            "FASTA too large."
        );
        assert_eq!(
            gateway(GatewayError::Timeout(Duration::from_secs(1))).detail(),
            "Search timed out."
        );
    }
}
