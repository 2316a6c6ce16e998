//! Error types for manifest import and update merging

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Malformed or unsupported manifest, or unsupported media type
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),
    /// Malformed image configuration blob
    #[error("Config parse error: {0}")]
    ConfigParse(String),
    /// Content does not hash to the digest it is bound to
    #[error("Digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),
    /// A manifest list arrived where a single manifest was required
    #[error("Manifest list {digest} could not be resolved: {reason}")]
    UnresolvedManifestList { digest: String, reason: String },
    #[error("Validation error: {0}")]
    Validation(String),
    /// Child manifest or blob retrieval failed
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Optimistic concurrency check failed
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// True for errors that reject the candidate record itself, as opposed to
    /// failures of the surrounding store or its collaborators.
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            ImportError::ManifestParse(_)
                | ImportError::ConfigParse(_)
                | ImportError::DigestMismatch { .. }
                | ImportError::UnsupportedDigestAlgorithm(_)
                | ImportError::UnresolvedManifestList { .. }
                | ImportError::Validation(_)
        )
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Fetch(err.to_string())
    }
}

impl From<url::ParseError> for ImportError {
    fn from(err: url::ParseError) -> Self {
        ImportError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Configuration(format!("JSON error: {}", err))
    }
}
