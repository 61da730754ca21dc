use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the index builder, the authoring service and the
/// content resolver.
#[derive(Debug, Error)]
pub enum NotesError {
    /// The request resolves outside the content root or contains a traversal
    /// segment. Raised before any filesystem access.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An underlying filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize notes index: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The requested content path does not correspond to a real note.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Transport failure or a non-success status not caused by the routing
    /// fallback.
    #[error("Failed to load note: {0}")]
    Network(String),

    /// Authoring endpoint called from a non-local origin.
    #[error("Authoring is only available from localhost: {0}")]
    Forbidden(String),
}

pub type Result<T> = std::result::Result<T, NotesError>;

impl NotesError {
    /// Wraps an io error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        NotesError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        NotesError::InvalidPath(message.into())
    }

    /// HTTP status reported by the control endpoints for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            NotesError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            NotesError::Io { .. } | NotesError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NotesError::NotFound(_) => StatusCode::NOT_FOUND,
            NotesError::Network(_) => StatusCode::BAD_GATEWAY,
            NotesError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_native_message() {
        let err = NotesError::io(
            "Failed to create directory",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to create directory: permission denied"
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            NotesError::invalid_path("..").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NotesError::Forbidden("10.0.0.2".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            NotesError::NotFound("a.md".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
