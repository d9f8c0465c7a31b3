//! Live fan-out for Casefile sessions.
//!
//! Each session code that has at least one open live connection gets a
//! coordinator: an isolated Tokio task (actor model) that owns the list
//! of connections and the per-connection replay watermark. REST handlers
//! never talk to sockets directly; they persist first and then ask the
//! coordinator to broadcast.
//!
//! # Key types
//!
//! - [`HubRegistry`] — spawns coordinators lazily, routes by code
//! - [`HubHandle`] — send commands to a running coordinator
//! - [`Broadcast`] — what to push after a mutation
//! - [`ConnectionId`] / [`ConnectionSender`] — one live connection
//!
//! # Durability
//!
//! A coordinator holds nothing that isn't in the store. It can be dropped
//! and respawned at any time; a client that missed frames sends
//! `resume` with its last seen event id and catches up from the log.

mod error;
mod hub;
mod registry;

pub use error::HubError;
pub use hub::{Broadcast, ConnectionId, ConnectionSender, HubHandle};
pub use registry::HubRegistry;
