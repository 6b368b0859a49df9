use thiserror::Error;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Network, quota or overload. Worth retrying.
    #[error("transient service failure: {0}")]
    Transient(String),
    /// Malformed or refused request. Retrying will not help.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Device or capability is not present (camera, microphone, GPS).
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("operation timed out")]
    Timeout,
    /// The owning interaction was superseded. Never surfaced to the user.
    #[error("operation aborted")]
    Aborted,
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient(_) | ServiceError::Timeout)
    }
}
