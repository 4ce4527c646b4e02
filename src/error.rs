//! Error types for the drive_gateway crate.

use thiserror::Error;

use crate::models::GraphErrorResponse;

/// Errors that can occur while serving drive operations.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Folder \"{segment}\" is ambiguous in path \"{path}\": {matches} folders share that name")]
    AmbiguousFolder {
        segment: String,
        path: String,
        matches: usize,
    },

    #[error("Remote operation failed ({status}): {message}")]
    RemoteOperation { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriveError {
    /// Classify a failed Graph response from its status and raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<GraphErrorResponse>(body)
            .map(|e| format!("{} ({})", e.error.message, e.error.code))
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                }
            });

        match status {
            401 => DriveError::Authentication(message),
            404 => DriveError::NotFound(message),
            _ => DriveError::RemoteOperation { status, message },
        }
    }

    /// Prefix the message of a remote failure with what was being attempted.
    pub fn context(self, prefix: &str) -> Self {
        match self {
            DriveError::RemoteOperation { status, message } => DriveError::RemoteOperation {
                status,
                message: format!("{}: {}", prefix, message),
            },
            other => other,
        }
    }

    /// HTTP status used when this error is reported to a caller.
    pub fn status_code(&self) -> u16 {
        match self {
            DriveError::Validation(_) => 400,
            DriveError::Authentication(_) => 401,
            DriveError::NotFound(_) => 404,
            DriveError::AmbiguousFolder { .. } => 409,
            DriveError::RemoteOperation { status, .. } if *status >= 400 => *status,
            DriveError::RemoteOperation { .. } => 502,
            DriveError::HttpError(_) | DriveError::Json(_) => 502,
            DriveError::Io(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DriveError::Validation(_) => "VALIDATION_ERROR",
            DriveError::Authentication(_) => "AUTHENTICATION_ERROR",
            DriveError::NotFound(_) => "NOT_FOUND",
            DriveError::AmbiguousFolder { .. } => "AMBIGUOUS_FOLDER",
            DriveError::RemoteOperation { .. } | DriveError::HttpError(_) | DriveError::Json(_) => {
                "REMOTE_OPERATION_FAILED"
            }
            DriveError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_classification() {
        let body = r#"{"error":{"code":"itemNotFound","message":"The resource could not be found."}}"#;
        let err = DriveError::from_response(404, body);
        assert!(matches!(err, DriveError::NotFound(ref m) if m.contains("itemNotFound")));

        let err = DriveError::from_response(401, "");
        assert!(matches!(err, DriveError::Authentication(ref m) if m == "HTTP 401"));

        let err = DriveError::from_response(507, "quota exceeded");
        assert_eq!(err.status_code(), 507);
        assert_eq!(err.code(), "REMOTE_OPERATION_FAILED");
    }

    #[test]
    fn test_context_only_touches_remote_failures() {
        let err = DriveError::RemoteOperation {
            status: 500,
            message: "boom".to_string(),
        }
        .context("Failed to upload file");
        assert_eq!(
            err.to_string(),
            "Remote operation failed (500): Failed to upload file: boom"
        );

        let err = DriveError::NotFound("x".to_string()).context("ignored");
        assert_eq!(err.to_string(), "Not found: x");
    }
}
