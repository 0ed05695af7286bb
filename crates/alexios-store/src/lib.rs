//! Mailbox and user persistence for the Alexios mailbox skill.
//!
//! The dispatcher talks to storage exclusively through [`MessageStore`].
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: process-local, used by tests and throwaway deployments.
//! - [`SqliteStore`]: SQLite via the `alexios-db` connection pool.
//!
//! # Guarantees every implementation must provide
//!
//! - All methods are safe to call concurrently from unrelated requests.
//! - [`MessageStore::register_user`] is atomic with respect to username
//!   uniqueness: when two callers race for the same name exactly one
//!   succeeds and the other observes [`StoreError::Conflict`].
//! - Message ids are assigned by the store, increase monotonically and are
//!   never reused.
//! - Read-your-writes: once `append_message` returns, a subsequent
//!   `list_mailbox` for that recipient includes the message.
//! - Mailbox listings are in insertion order and listing never removes
//!   anything.

mod error;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use alexios_types::{Message, MessageSummary, NewMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Capability interface over user registration and mailboxes.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Looks up the identity token bound to `username`.
    ///
    /// Returns [`StoreError::NotFound`] if nobody has registered the name.
    async fn resolve_user(&self, username: &str) -> StoreResult<String>;

    /// Lists the undelivered messages addressed to `identity`, oldest first.
    async fn list_mailbox(&self, identity: &str) -> StoreResult<Vec<MessageSummary>>;

    /// Fetches a full message by its store-assigned id.
    ///
    /// Returns [`StoreError::NotFound`] if the id is unknown or was purged.
    async fn get_message(&self, id: i64) -> StoreResult<Message>;

    /// Appends a message to the recipient's mailbox and returns its new id.
    async fn append_message(&self, recipient: &str, message: NewMessage) -> StoreResult<i64>;

    /// Binds `identity` to `username`.
    ///
    /// Returns [`StoreError::AlreadyRegistered`] if the identity already
    /// holds a username, otherwise [`StoreError::Conflict`] if the username
    /// is taken.
    async fn register_user(&self, identity: &str, username: &str) -> StoreResult<()>;

    /// Deletes messages sent strictly before `cutoff`. Returns the number
    /// of messages removed.
    async fn purge_messages_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}
