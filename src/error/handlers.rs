//! Mapping of import errors onto request rejections

use crate::error::ImportError;
use serde::Serialize;

/// A rejected Create/Update request, shaped like an API status object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub status: u16,
    pub reason: &'static str,
    /// Field path the failure is attributed to, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub message: String,
}

/// Standard handler turning errors into request rejections
pub struct RejectionHandler;

impl RejectionHandler {
    pub fn reject(err: &ImportError) -> Rejection {
        let (status, reason, field) = match err {
            ImportError::ManifestParse(_) => (422, "Invalid", Some("dockerImageManifest")),
            ImportError::DigestMismatch { .. } | ImportError::UnsupportedDigestAlgorithm(_) => {
                (422, "Invalid", Some("dockerImageManifest"))
            }
            ImportError::UnresolvedManifestList { .. } => {
                (422, "Invalid", Some("dockerImageManifest"))
            }
            ImportError::ConfigParse(_) => (422, "Invalid", Some("dockerImageConfig")),
            ImportError::Validation(_) => (422, "Invalid", None),
            ImportError::NotFound(_) => (404, "NotFound", None),
            ImportError::AlreadyExists(_) => (409, "AlreadyExists", None),
            ImportError::Conflict(_) => (409, "Conflict", None),
            ImportError::Fetch(msg) if msg.contains("timed out") => (504, "Timeout", None),
            ImportError::Fetch(_) => (502, "BadGateway", None),
            ImportError::Configuration(_) | ImportError::Io(_) => (500, "InternalError", None),
        };

        Rejection {
            status,
            reason,
            field,
            message: err.to_string(),
        }
    }
}
