//! Process-local store.
//!
//! All state sits behind a single mutex, so every operation (including the
//! check-and-insert in `register_user`) is atomic. Locks are never held
//! across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use alexios_types::{Message, MessageSummary, NewMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{MessageStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    /// username -> identity
    identities: HashMap<String, String>,
    /// identity -> username
    usernames: HashMap<String, String>,
    /// id -> (recipient, message); BTreeMap keeps insertion order by id.
    messages: BTreeMap<i64, (String, Message)>,
    last_id: i64,
}

/// In-memory [`MessageStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            tracing::error!("memory store lock poisoned");
            StoreError::Poisoned
        })
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn resolve_user(&self, username: &str) -> StoreResult<String> {
        self.lock()?
            .identities
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user '{}'", username)))
    }

    async fn list_mailbox(&self, identity: &str) -> StoreResult<Vec<MessageSummary>> {
        let inner = self.lock()?;
        Ok(inner
            .messages
            .values()
            .filter(|(recipient, _)| recipient == identity)
            .map(|(_, message)| MessageSummary::from(message))
            .collect())
    }

    async fn get_message(&self, id: i64) -> StoreResult<Message> {
        self.lock()?
            .messages
            .get(&id)
            .map(|(_, message)| message.clone())
            .ok_or_else(|| StoreError::NotFound(format!("message {}", id)))
    }

    async fn append_message(&self, recipient: &str, message: NewMessage) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        inner.last_id += 1;
        let id = inner.last_id;
        inner
            .messages
            .insert(id, (recipient.to_string(), message.into_message(id)));
        Ok(id)
    }

    async fn register_user(&self, identity: &str, username: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.usernames.get(identity) {
            return Err(StoreError::AlreadyRegistered {
                identity: identity.to_string(),
                username: existing.clone(),
            });
        }
        if inner.identities.contains_key(username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already registered",
                username
            )));
        }
        inner
            .identities
            .insert(username.to_string(), identity.to_string());
        inner
            .usernames
            .insert(identity.to_string(), username.to_string());
        Ok(())
    }

    async fn purge_messages_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut inner = self.lock()?;
        let before = inner.messages.len();
        inner
            .messages
            .retain(|_, (_, message)| message.sent_at >= cutoff);
        Ok(before - inner.messages.len())
    }
}
