//! The reconnection manager: issues and checks player tokens.
//!
//! ```text
//! enroll() ──→ [player + token] ──→ authenticate() on every mutation
//!                    │
//!                    └──→ reconnect(code, token) after a refresh
//! ```
//!
//! Tokens are never reissued. The token returned by [`enroll`] is the one
//! [`reconnect`] hands back, for the lifetime of the session.
//!
//! [`enroll`]: ReconnectionManager::enroll
//! [`reconnect`]: ReconnectionManager::reconnect

use casefile_protocol::{
    Player, PlayerId, Session, SessionCode, SuspectId,
};
use casefile_store::{NewPlayer, SharedStore};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{ReconnectionConfig, SessionError};

/// A player identity together with its secret, as returned to the phone
/// that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub session: Session,
    pub player: Player,
    pub reconnect_token: String,
}

/// Enrolls players and validates their tokens against the store.
pub struct ReconnectionManager {
    store: SharedStore,
    config: ReconnectionConfig,
}

impl ReconnectionManager {
    pub fn new(store: SharedStore, config: ReconnectionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReconnectionConfig {
        &self.config
    }

    /// A fresh random secret, hex encoded.
    pub fn issue_token(&self) -> String {
        generate_token(self.config.token_bytes)
    }

    /// Claims `suspect` in the lobby of session `code` for a new player.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — no session with that code
    /// - [`SessionError::SessionClosed`] — the session is closed
    /// - [`SessionError::Conflict`] — the game started or the suspect is
    ///   already claimed
    /// - [`SessionError::InvalidPayload`] — blank name, or a suspect not in
    ///   the roster
    pub fn enroll(
        &self,
        code: &SessionCode,
        name: &str,
        suspect: &SuspectId,
    ) -> Result<Enrollment, SessionError> {
        let session = self.store.session_by_code(code)?;
        if session.status.is_closed() {
            return Err(SessionError::SessionClosed(code.clone()));
        }
        if !session.status.is_joinable() {
            return Err(SessionError::Conflict(format!(
                "session {code} has already started"
            )));
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidPayload(
                "name must not be empty".into(),
            ));
        }
        if !self.config.roster.contains(suspect) {
            return Err(SessionError::InvalidPayload(format!(
                "unknown suspect {suspect}"
            )));
        }

        let reconnect_token = self.issue_token();
        let player = self.store.create_player(NewPlayer {
            session_id: session.id,
            name: name.to_owned(),
            suspect_id: suspect.clone(),
            reconnect_token: reconnect_token.clone(),
        })?;

        tracing::info!(
            player_id = %player.id,
            %code,
            suspect = %player.suspect_id,
            "player enrolled"
        );

        Ok(Enrollment {
            session,
            player,
            reconnect_token,
        })
    }

    /// Checks that `token` belongs to `player_id` and stamps the player
    /// as seen.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — no such player
    /// - [`SessionError::Unauthorized`] — the token doesn't match
    pub fn authenticate(
        &self,
        player_id: PlayerId,
        token: &str,
    ) -> Result<Player, SessionError> {
        let expected = self.store.player_token(player_id)?;
        if !tokens_match(expected.as_bytes(), token.as_bytes()) {
            tracing::warn!(%player_id, "rejected request with wrong token");
            return Err(SessionError::Unauthorized);
        }
        Ok(self.store.touch_player(player_id)?)
    }

    /// Resumes the player that owns `token` in session `code`.
    ///
    /// The session is resolved through the player, not the code, so a
    /// code reused by a newer session never matches an old token.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — unknown token, or the token belongs
    ///   to a different session
    /// - [`SessionError::SessionClosed`] — the player's session is closed
    pub fn reconnect(
        &self,
        code: &SessionCode,
        token: &str,
    ) -> Result<Enrollment, SessionError> {
        let player = self.store.player_by_token(token)?;
        let session = self.store.session(player.session_id)?;
        if &session.code != code {
            tracing::debug!(
                player_id = %player.id,
                %code,
                "token presented for a different session"
            );
            return Err(SessionError::NotFound(format!(
                "player for token in session {code}"
            )));
        }
        if session.status.is_closed() {
            return Err(SessionError::SessionClosed(code.clone()));
        }

        let player = self.store.touch_player(player.id)?;
        tracing::info!(player_id = %player.id, %code, "player reconnected");

        Ok(Enrollment {
            session,
            player,
            reconnect_token: token.to_owned(),
        })
    }
}

/// `len` random bytes as lowercase hex.
fn generate_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}

/// Compares two secrets without an early exit on the first differing
/// byte.
fn tokens_match(expected: &[u8], given: &[u8]) -> bool {
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

// =========================================================================
// Tests
// =========================================================================
