//! Error types for image2sdr.

use thiserror::Error;

/// Result type alias using SdrError.
pub type Result<T> = std::result::Result<T, SdrError>;

/// Errors that can occur in image2sdr.
///
/// The merge core itself never fails; these cover parameter validation,
/// the upstream services and the HTTP surface.
#[derive(Error, Debug)]
pub enum SdrError {
    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Upload request carried no image files.
    #[error("Missing files")]
    MissingFiles,

    /// Upstream service could not be reached or returned garbage.
    #[error("{service} request failed: {message}")]
    Upstream { service: String, message: String },

    /// Upstream service answered with a non-success status.
    #[error("{service} returned HTTP {status}")]
    UpstreamStatus { service: String, status: u16 },

    /// Request did not complete in time.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upload exceeded the configured body limit.
    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },
}

impl SdrError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an upstream error for the named service.
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the caller is at fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::MissingFiles | Self::PayloadTooLarge { .. }
        )
    }

    /// Get the error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::MissingFiles => "MISSING_FILES",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::UpstreamStatus { .. } => "UPSTREAM_STATUS",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SdrError::UpstreamStatus {
            service: "cortical.io".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("cortical.io"));
        assert!(err.to_string().contains("503"));
        assert_eq!(SdrError::MissingFiles.to_string(), "Missing files");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SdrError::MissingFiles.error_code(), "MISSING_FILES");
        assert_eq!(
            SdrError::upstream("clarifai", "connection refused").error_code(),
            "UPSTREAM_ERROR"
        );
        assert_eq!(SdrError::Timeout { secs: 5 }.error_code(), "TIMEOUT");
        assert_eq!(SdrError::config("bad").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_client_errors() {
        assert!(SdrError::MissingFiles.is_client_error());
        assert!(SdrError::invalid_argument("sparsity").is_client_error());
        assert!(SdrError::PayloadTooLarge {
            message: "limit".to_string()
        }
        .is_client_error());
        assert!(!SdrError::upstream("clarifai", "boom").is_client_error());
        assert!(!SdrError::Timeout { secs: 1 }.is_client_error());
    }
}
