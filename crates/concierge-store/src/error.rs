//! Error types for the concierge-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A job state transition was rejected.
    ///
    /// Terminal states are immutable, and `Pending -> Processing` is the
    /// only legal start transition.
    #[error("illegal job transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The tenant data directory could not be created or opened.
    #[error("tenant storage unavailable for `{tenant}`: {reason}")]
    TenantUnavailable { tenant: String, reason: String },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
