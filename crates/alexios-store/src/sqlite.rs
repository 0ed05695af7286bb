//! SQLite-backed store.
//!
//! Each operation borrows a pooled connection on the blocking thread pool.
//! Writes are single autocommit statements, so they are durable and visible
//! to later reads as soon as the call returns. Read-your-writes holds for
//! file-backed databases; an in-memory path is only consistent with a pool
//! of size one.

use alexios_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use alexios_types::{Message, MessageSummary, NewMessage};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::{MessageStore, StoreError, StoreResult};

/// [`MessageStore`] over an `alexios-db` connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Wraps an existing, already migrated pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates a pool for `db_path` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the pool cannot be built or a migration
    /// fails.
    pub fn open(db_path: &str, settings: DbRuntimeSettings) -> StoreResult<Self> {
        let pool = create_pool(db_path, settings)?;
        {
            let conn = pool.get()?;
            let applied = run_migrations(&conn)?;
            if applied > 0 {
                tracing::info!(count = applied, "applied database migrations");
            }
        }
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("{}: {}", op, e)))?
    }
}

fn encode_time(time: DateTime<Utc>) -> String {
    // Fixed-width UTC so lexical order in SQL matches chronological order.
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn resolve_user(&self, username: &str) -> StoreResult<String> {
        let username = username.to_string();
        self.with_conn("resolve_user", move |conn| {
            conn.query_row(
                "SELECT identity FROM users WHERE username = ?1",
                [&username],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("user '{}'", username)))
        })
        .await
    }

    async fn list_mailbox(&self, identity: &str) -> StoreResult<Vec<MessageSummary>> {
        let identity = identity.to_string();
        self.with_conn("list_mailbox", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender, sent_at FROM messages
                 WHERE recipient = ?1
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([&identity], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                let (id, sender, sent_at) = row?;
                summaries.push(MessageSummary {
                    id,
                    sender,
                    sent_at: decode_time(&sent_at)?,
                });
            }
            Ok(summaries)
        })
        .await
    }

    async fn get_message(&self, id: i64) -> StoreResult<Message> {
        self.with_conn("get_message", move |conn| {
            let row = conn
                .query_row(
                    "SELECT sender, sent_at, payload FROM messages WHERE id = ?1",
                    [id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            let (sender, sent_at, payload) =
                row.ok_or_else(|| StoreError::NotFound(format!("message {}", id)))?;
            Ok(Message {
                id,
                sender,
                sent_at: decode_time(&sent_at)?,
                payload,
            })
        })
        .await
    }

    async fn append_message(&self, recipient: &str, message: NewMessage) -> StoreResult<i64> {
        let recipient = recipient.to_string();
        self.with_conn("append_message", move |conn| {
            let id = conn.query_row(
                "INSERT INTO messages (recipient, sender, sent_at, payload)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![
                    recipient,
                    message.sender,
                    encode_time(message.sent_at),
                    message.payload,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn register_user(&self, identity: &str, username: &str) -> StoreResult<()> {
        let identity = identity.to_string();
        let username = username.to_string();
        self.with_conn("register_user", move |conn| {
            // A single INSERT; the UNIQUE and PRIMARY KEY constraints decide
            // the race, never a prior SELECT.
            let inserted = conn.execute(
                "INSERT INTO users (identity, username) VALUES (?1, ?2)",
                params![identity, username],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    // Bindings are never deleted, so the row that won is
                    // still there to tell the two constraints apart.
                    let existing: Option<String> = conn
                        .query_row(
                            "SELECT username FROM users WHERE identity = ?1",
                            [&identity],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match existing {
                        Some(existing) => Err(StoreError::AlreadyRegistered {
                            identity,
                            username: existing,
                        }),
                        None => Err(StoreError::Conflict(format!(
                            "username '{}' already registered",
                            username
                        ))),
                    }
                }
                Err(e) => Err(StoreError::Database(e)),
            }
        })
        .await
    }

    async fn purge_messages_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        self.with_conn("purge_messages_before", move |conn| {
            let deleted = conn.execute(
                "DELETE FROM messages WHERE sent_at < ?1",
                [encode_time(cutoff)],
            )?;
            Ok(deleted)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_encoding_round_trips_and_sorts() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::nanoseconds(7);
        let late = Utc.with_ymd_and_hms(2024, 11, 2, 3, 4, 5).unwrap();

        let early_raw = encode_time(early);
        assert_eq!(decode_time(&early_raw).unwrap(), early);
        assert!(early_raw < encode_time(late));
    }

    #[test]
    fn corrupt_timestamp_is_reported() {
        assert!(matches!(
            decode_time("yesterday"),
            Err(StoreError::Corrupt(_))
        ));
    }
}
