//! Error Types
//!
//! One closed set of error kinds crosses subsystem boundaries. Handlers
//! never expose these types on the wire; the dispatch layer folds them
//! into the uniform `{status: "error", error: ...}` envelope.

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    /// Schema validation failure, empty query, missing required field
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown document ID, initiative, or task
    #[error("not found: {0}")]
    NotFound(String),

    /// Wrong document type for the operation
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Conflicting write (e.g. supersession already points elsewhere)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store, LLM, or git unreachable / timed out
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Unhandled internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngramError {
    /// Short kind name for the error envelope
    pub fn kind(&self) -> &'static str {
        match self {
            EngramError::InvalidArgument(_) => "invalid_argument",
            EngramError::NotFound(_) => "not_found",
            EngramError::PreconditionFailed(_) => "precondition_failed",
            EngramError::Conflict(_) => "conflict",
            EngramError::Unavailable(_) => "unavailable",
            EngramError::Internal(_) => "internal",
        }
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngramError>;

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for EngramError {
    fn from(e: rusqlite::Error) -> Self {
        EngramError::Unavailable(format!("store: {}", e))
    }
}

impl From<std::io::Error> for EngramError {
    fn from(e: std::io::Error) -> Self {
        EngramError::Unavailable(format!("io: {}", e))
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(e: serde_json::Error) -> Self {
        EngramError::Internal(format!("serialization: {}", e))
    }
}

impl From<git2::Error> for EngramError {
    fn from(e: git2::Error) -> Self {
        EngramError::Unavailable(format!("git: {}", e))
    }
}

/// Map a poisoned lock into an internal error without dragging the guard
/// type into signatures.
pub fn lock_poisoned(what: &str) -> EngramError {
    EngramError::Internal(format!("{} lock poisoned", what))
}

// ============================================================================
// TESTS
// ============================================================================
