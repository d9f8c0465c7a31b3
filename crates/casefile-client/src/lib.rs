//! Client side of Casefile: what a phone or the host screen runs.
//!
//! The server is the source of truth; a client keeps a disposable cache
//! of it. Everything here is an explicitly constructed service object so
//! a UI can own one per screen and tests can build as many as they like.
//!
//! # Key types
//!
//! - [`SessionView`] — snapshot + event log + folded [`TurnState`]
//!   (from `casefile-turn`), fed by live frames or polled batches
//! - [`IdentityStore`] — where a phone remembers who it is between
//!   launches ([`MemoryIdentityStore`], [`JsonFileIdentityStore`])
//! - [`LiveConnection`] — WebSocket client for `/sessions/{code}/live`
//! - [`HostConsole`] — the host screen's clock, interruption queue and
//!   accusation feedback
//!
//! [`TurnState`]: casefile_turn::TurnState

mod error;
mod host;
mod identity;
mod live;
mod view;

pub use error::ClientError;
pub use host::HostConsole;
pub use identity::{
    Identity, IdentityStore, JsonFileIdentityStore, MemoryIdentityStore,
};
pub use live::LiveConnection;
pub use view::{SessionView, ViewUpdate};
