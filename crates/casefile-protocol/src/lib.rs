//! Wire protocol for Casefile.
//!
//! This crate defines the "language" that the host screen, the phones,
//! and the server speak:
//!
//! - **Identity types** ([`SessionId`], [`PlayerId`], [`EventId`],
//!   [`SessionCode`], [`SuspectId`]) — newtypes so ids can't be mixed up.
//! - **Data model** ([`Session`], [`Player`], [`Event`]) — the rows the
//!   server persists and ships to clients.
//! - **Actions** ([`GameAction`], [`TurnAction`], [`Accusation`]) — the
//!   closed vocabulary of things a phone can do, parsed from the untyped
//!   event payload at the boundary.
//! - **Messages** ([`ServerMessage`], [`ClientMessage`]) — what travels
//!   over the live connection.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become
//!   text frames.
//!
//! # Architecture
//!
//! ```text
//! Store (rows) → Protocol (typed model + messages) → Hub / API / Client
//! ```

mod action;
mod codec;
mod error;
mod ids;
mod message;
mod model;

pub use action::{
    Accusation, GameAction, PassageDraw, PassageOutcome, TurnAction,
};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use ids::{EventId, PlayerId, SessionCode, SessionId, SuspectId};
pub use message::{ClientMessage, LiveErrorCode, ServerMessage, SessionSnapshot};
pub use model::{
    AccusationResult, Eliminations, Event, EventKind, Interruption,
    InterruptionKind, Player, Session, SessionStatus, Solution, TurnSlot,
};
