//! Error types for the permission engine

use thiserror::Error;

/// Permission engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Grant rejected before reaching the store
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Grant not found
    #[error("Grant not found: {0}")]
    GrantNotFound(String),

    /// Permission check resolved to deny
    #[error("Forbidden: {reason}")]
    Forbidden {
        reason: String,
        grant_id: Option<String>,
    },

    /// Permission store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Audit sink failure
    #[error("Audit error: {0}")]
    Audit(String),
}

impl AuthzError {
    /// True for the error produced by a deny decision
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthzError::Forbidden { .. })
    }
}

/// Result type for permission engine operations
pub type Result<T> = std::result::Result<T, AuthzError>;
