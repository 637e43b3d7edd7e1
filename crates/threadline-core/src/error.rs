//! Error types for the Threadline client engine

use thiserror::Error;

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Main error type for the client engine
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request errors
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// The event stream broke or produced something unreadable
    #[error("Stream error: {0}")]
    Stream(String),

    /// The remote run reported a failure through the event feed
    #[error("Run failed: {0}")]
    Run(String),

    /// Upload transfer errors
    #[error("Upload error: {file}: {message}")]
    Upload { file: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A new human turn was submitted while an interrupt awaits a decision
    #[error("An interrupt is pending; resume it before sending a new message")]
    InterruptPending,

    /// The session is busy with an in-flight run
    #[error("Session busy: {0}")]
    Busy(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,
}

impl ClientError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new HTTP error
    pub fn http(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status_code,
        }
    }

    /// Create a new stream error
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Create a new run error
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run(message.into())
    }

    /// Create a new upload error
    pub fn upload(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new busy error
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }

    /// Create a new not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Whether the error came from the network layer rather than from the run itself
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Stream(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http {
            message: error.to_string(),
            status_code: error.status().map(|s| s.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::http("connection refused", Some(502));
        assert_eq!(err.to_string(), "HTTP error: connection refused");

        let err = ClientError::upload("cat.png", "too large");
        assert_eq!(err.to_string(), "Upload error: cat.png: too large");
    }

    #[test]
    fn test_transport_classification() {
        assert!(ClientError::stream("reset").is_transport());
        assert!(ClientError::http("boom", None).is_transport());
        assert!(!ClientError::run("node failed").is_transport());
        assert!(!ClientError::InterruptPending.is_transport());
    }

    #[test]
    fn test_from_json_error() {
        let err: ClientError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ClientError::Json(_)));
    }
}
