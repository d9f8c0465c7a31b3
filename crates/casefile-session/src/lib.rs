//! Player identity for Casefile.
//!
//! A phone becomes a player by *enrolling*: it picks a suspect from the
//! roster, gets a player row and receives a secret reconnect token. That
//! token is the only credential there is. A phone that refreshes, loses
//! Wi-Fi or gets locked presents it again and comes back as the same
//! player.
//!
//! # How it fits in the stack
//!
//! ```text
//! API (above)      ← authenticates every mutating player call here
//!     ↕
//! Session layer    ← enroll / authenticate / reconnect
//!     ↕
//! Store (below)    ← players, tokens, sessions
//! ```

mod config;
mod error;
mod manager;

pub use config::ReconnectionConfig;
pub use error::SessionError;
pub use manager::{Enrollment, ReconnectionManager};
