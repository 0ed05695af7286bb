//! Error types for store operations.

use thiserror::Error;

/// Errors returned by [`crate::MessageStore`] implementations.
///
/// `NotFound`, `Conflict` and `AlreadyRegistered` are business outcomes the
/// dispatcher turns into spoken replies; every other variant is a technical
/// failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested user or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The identity is already bound to `username`. Usernames are permanent,
    /// so retrying with another name cannot succeed.
    #[error("identity '{identity}' already registered as '{username}'")]
    AlreadyRegistered { identity: String, username: String },

    /// A SQLite statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The pool could not be built at startup.
    #[error(transparent)]
    PoolInit(#[from] alexios_db::PoolError),

    /// Schema migrations failed at startup.
    #[error(transparent)]
    Migration(#[from] alexios_db::MigrationError),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The blocking worker running the query panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),

    /// The in-memory state lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}
