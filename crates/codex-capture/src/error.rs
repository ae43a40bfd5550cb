//! Error types for codex-capture

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Configuration errors (unreadable config file, uncreatable capture dir)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure writing one of the capture artifacts
    #[error("Failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Proxy/HTTP errors
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CaptureError {
    pub(crate) fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Persist {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(e: serde_json::Error) -> Self {
        CaptureError::Serialization(e.to_string())
    }
}

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let cases = [
            (CaptureError::Config("bad dir".into()), "Configuration error: bad dir"),
            (CaptureError::Proxy("refused".into()), "Proxy error: refused"),
            (CaptureError::Serialization("eof".into()), "Serialization error: eof"),
            (
                CaptureError::persist("/tmp/latest.json", std::io::Error::other("disk full")),
                "Failed to persist /tmp/latest.json: disk full",
            ),
        ];
        for (error, expected) in cases {
            // Exhaustive so a new variant has to be given a message here
            match &error {
                CaptureError::Config(_)
                | CaptureError::Persist { .. }
                | CaptureError::Proxy(_)
                | CaptureError::Io(_)
                | CaptureError::Serialization(_) => {}
            }
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let err: CaptureError = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(err, CaptureError::Serialization(_)));
    }
}
