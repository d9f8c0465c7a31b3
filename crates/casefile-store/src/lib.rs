//! Durable storage for Casefile.
//!
//! Sessions, players and the append-only event log live in SQLite. The
//! rest of the system only sees the [`SessionStore`] trait, so the hub,
//! the API and the tests never touch SQL.
//!
//! # Key types
//!
//! - [`SessionStore`] — the persistence seam
//! - [`SqliteStore`] — the `rusqlite` implementation
//! - [`StoreConfig`] — code length and collision retry budget
//! - [`CodeGenerator`] — where session codes come from ([`RandomCodes`]
//!   in production, something deterministic in tests)
//! - [`NewEvent`] / [`SessionEffects`] — the input to an event append
//! - [`run_blocking`] — how async code calls the store
//!
//! # Atomicity
//!
//! Every write runs as a single statement or a single transaction on one
//! connection. The two races that matter are closed by SQLite itself:
//! two phones claiming the same suspect hit `UNIQUE(session_id,
//! suspect_id)`, and two phones acting on the same turn hit the
//! compare-and-set on the session's event head in
//! [`SessionStore::append_event`].

mod config;
mod error;
mod schema;
mod sqlite;
mod store;

pub use config::{CodeGenerator, RandomCodes, StoreConfig};
pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use store::{
    NewEvent, NewPlayer, PlayerUpdate, SessionEffects, SessionStore, SharedStore,
    run_blocking,
};
