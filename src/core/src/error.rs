use std::path::PathBuf;

use thiserror::Error;

/// ocibundle error types
#[derive(Error, Debug)]
pub enum BundleError {
    /// Caller supplied an argument that cannot be acted upon
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required file does not exist
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Persisted metadata or blob content could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// The storage collaborator failed to fetch or decode a blob
    #[error("Resolution failed: {digest} - {message}")]
    Resolution { digest: String, message: String },

    /// Image data is internally inconsistent
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::Parse(err.to_string())
    }
}

impl BundleError {
    /// Build a resolution error for the blob identified by `digest`.
    pub fn resolution(digest: impl Into<String>, message: impl Into<String>) -> Self {
        BundleError::Resolution {
            digest: digest.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BundleError::NotFound { .. })
    }
}

/// Result type alias for ocibundle operations
pub type Result<T> = std::result::Result<T, BundleError>;
