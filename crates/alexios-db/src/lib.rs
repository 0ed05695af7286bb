//! Database layer for the Alexios mailbox skill.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. The `users` and `messages` tables are created
//! through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process is required, and
//!   WAL allows concurrent readers alongside a single writer.
//! - **Uniqueness in the schema**: username uniqueness is a `UNIQUE`
//!   constraint, so registration is a single atomic `INSERT`.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` and cannot drift from the code that depends on them.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY_PATH};
