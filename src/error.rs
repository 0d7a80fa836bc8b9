//! Error type shared by the sync actions and the plant stores.

/// Errors that can occur while syncing plants.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored base64 image text is malformed
    #[error("Invalid base64 image for plant {guid}: {source}")]
    Base64 {
        guid: String,
        #[source]
        source: base64::DecodeError,
    },

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// Returns the HTTP status if the server rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Status { status, .. } => Some(*status),
            SyncError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = SyncError::Status {
            status: 404,
            message: "plant not found".to_string(),
        };
        assert_eq!(err.to_string(), "Server returned status 404: plant not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_base64_error_names_plant() {
        let source = base64::DecodeError::InvalidLength(3);
        let err = SyncError::Base64 {
            guid: "abc".to_string(),
            source,
        };
        assert!(err.to_string().contains("plant abc"));
        assert_eq!(err.status(), None);
    }
}
