//! Database layer for the lingua platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table — threads, messages, the credits
//! ledger, phoneme statistics, and the usage event log — is created through
//! versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: single-process deployment, no external database
//!   server. WAL allows concurrent readers with a single writer, which matches
//!   the access pattern: many thread/history reads, one writer per turn.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so migrations ship with the server and cannot drift from
//!   the code that depends on them.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
