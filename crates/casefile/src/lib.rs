//! # Casefile
//!
//! Server for a party mystery game: one shared host screen, a phone per
//! player, and a server that keeps the only durable copy of the game.
//!
//! The server is a thin pipeline over the layer crates:
//!
//! ```text
//! REST request → authenticate (session) → fold + check (turn)
//!              → append with compare-and-set (store) → broadcast (hub)
//! ```
//!
//! Phones and the host also hold a live WebSocket on
//! `/sessions/{code}/live` for snapshots and log events, and fall back to
//! `GET /sessions/{code}/events?since=` when it drops.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use casefile::prelude::*;
//!
//! # async fn start() -> Result<(), CasefileError> {
//! let server = CasefileServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .database("casefile.db")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod actions;
mod api;
mod config;
mod error;
mod live;
mod server;

pub use config::ServerConfig;
pub use error::{CasefileError, ErrorKind};
pub use server::{AppState, CasefileServer, CasefileServerBuilder, router};

/// Everything needed to run or embed a server.
pub mod prelude {
    pub use crate::{
        AppState, CasefileError, CasefileServer, CasefileServerBuilder,
        ServerConfig, router,
    };
    pub use casefile_protocol::*;
    pub use casefile_session::ReconnectionConfig;
    pub use casefile_store::{SharedStore, SqliteStore, StoreConfig};
    pub use casefile_turn::{GameRules, InterruptionSchedule};
}
