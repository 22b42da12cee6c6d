//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the object store
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the resource version is stale
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ClusterError {
    /// True if the store rejected a write on a stale resource version
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Kube(e) => api_error_code(e) == Some(409),
            _ => false,
        }
    }
}

/// HTTP status code of an API error response, if the error is one
pub(crate) fn api_error_code(error: &kube::Error) -> Option<u16> {
    match error {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}
