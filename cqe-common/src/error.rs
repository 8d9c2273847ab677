//! Common error types for the content quality engine

use thiserror::Error;

/// Common result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error taxonomy
///
/// Each variant is caller-distinguishable. Audit tables (approval_attempts,
/// escalations) are the authoritative record of failures visible to humans;
/// this enum is the in-process signal.
#[derive(Error, Debug)]
pub enum Error {
    /// Input violates a contract. Surfaced to the caller, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Constraint race (duplicate version_number, duplicate score row).
    /// The caller may retry with refreshed state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A non-human principal attempted a human-only action, or a
    /// co-signature is required.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// State-machine or review-timer violation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Version/blog mismatch.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// The rewrite orchestrator found the blog approved after queuing.
    #[error("Approved content: {0}")]
    ApprovedContent(String),

    /// Rewrite cap hit.
    #[error("Cap exceeded: {0}")]
    CapExceeded(String),

    /// External call exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Storage or external dependency down. Bubbled up, no silent recovery.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error (bad file, unknown key, invalid value).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant violation inside the core. Fatal for the operation.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl Error {
    /// Short machine-readable kind string, used when a failure crosses a
    /// task boundary or lands in an audit row.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidState(_) => "invalid_state",
            Error::InvalidVersion(_) => "invalid_version",
            Error::ApprovedContent(_) => "approved_content",
            Error::CapExceeded(_) => "cap_exceeded",
            Error::Timeout(_) => "timeout",
            Error::Unavailable(_) => "unavailable",
            Error::NotFound(_) => "not_found",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
            Error::Database(_) => "unavailable",
            Error::Io(_) => "unavailable",
            Error::Uuid(_) => "internal",
            Error::Timestamp(_) => "internal",
        }
    }

    /// Rebuild an error from a kind string that crossed a task boundary.
    pub fn from_kind(kind: &str, message: String) -> Self {
        match kind {
            "validation" => Error::Validation(message),
            "conflict" => Error::Conflict(message),
            "forbidden" => Error::Forbidden(message),
            "invalid_state" => Error::InvalidState(message),
            "invalid_version" => Error::InvalidVersion(message),
            "approved_content" => Error::ApprovedContent(message),
            "cap_exceeded" => Error::CapExceeded(message),
            "timeout" => Error::Timeout(message),
            "unavailable" => Error::Unavailable(message),
            "not_found" => Error::NotFound(message),
            "config" => Error::Config(message),
            _ => Error::Internal(message),
        }
    }

    /// True when the underlying database error is a UNIQUE constraint
    /// violation (a lost insert race the caller may retry after refresh).
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => {
                db.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }

    /// Map a UNIQUE violation to `Conflict`, leaving other errors intact.
    pub fn into_conflict(self, what: &str) -> Self {
        if self.is_unique_violation() {
            Error::Conflict(what.to_string())
        } else {
            self
        }
    }
}
