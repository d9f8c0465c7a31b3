//! The persistence seam.

use std::sync::Arc;

use casefile_protocol::{
    AccusationResult, Eliminations, Event, EventId, EventKind, Interruption,
    Player, PlayerId, Session, SessionCode, SessionId, SessionStatus,
    Solution, SuspectId,
};
use serde_json::Value;

use crate::StoreError;

/// The store as the server and hub hold it.
pub type SharedStore = Arc<dyn SessionStore>;

/// Runs `f` against the store on Tokio's blocking pool.
///
/// Store calls block on SQLite. Async callers go through here so a slow
/// disk parks a blocking-pool thread instead of a runtime worker.
///
/// # Errors
/// Whatever `f` returns, or [`StoreError::Internal`] if the task panicked.
pub async fn run_blocking<T, E, F>(store: &SharedStore, f: F) -> Result<T, E>
where
    F: FnOnce(&dyn SessionStore) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| E::from(StoreError::Internal(format!("store task failed: {e}"))))?
}

/// An event about to be appended. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub kind: EventKind,
    pub payload: Value,
}

/// Session columns written in the same transaction as an event.
#[derive(Debug, Clone, Default)]
pub struct SessionEffects {
    /// New status, if the event changes it. Must move forward.
    pub status: Option<SessionStatus>,

    /// Whose turn it is once the event is applied. Always written:
    /// `None` clears the pointer (lobby, or a solved game).
    pub current_turn_suspect_id: Option<SuspectId>,
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub session_id: SessionId,
    pub name: String,
    pub suspect_id: SuspectId,
    pub reconnect_token: String,
}

/// Partial player update. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct PlayerUpdate {
    pub notes: Option<String>,
    pub eliminations: Option<Eliminations>,
}

/// Durable storage for sessions, players and the event log.
///
/// Methods are synchronous: a call is one short SQLite statement or
/// transaction. Every mutation is visible to the next read.
pub trait SessionStore: Send + Sync + 'static {
    // -- Sessions --

    /// Creates a lobby session under a fresh code.
    ///
    /// # Errors
    /// [`StoreError::CodesExhausted`] if every candidate code collided.
    fn create_session(
        &self,
        solution: Option<&Solution>,
    ) -> Result<Session, StoreError>;

    fn session(&self, id: SessionId) -> Result<Session, StoreError>;

    /// Looks up a session by code. A live (not closed) session wins;
    /// otherwise the most recently created closed one.
    fn session_by_code(
        &self,
        code: &SessionCode,
    ) -> Result<Session, StoreError>;

    /// The secret answer, if the host provided one.
    fn solution(&self, id: SessionId) -> Result<Option<Solution>, StoreError>;

    fn update_session_turn(
        &self,
        id: SessionId,
        suspect: Option<&SuspectId>,
    ) -> Result<Session, StoreError>;

    fn update_session_interruption(
        &self,
        id: SessionId,
        interruption: Option<&Interruption>,
    ) -> Result<Session, StoreError>;

    /// Adds (`available = true`) or removes a note from the readable set.
    fn update_session_inspector_note(
        &self,
        id: SessionId,
        note_id: &str,
        available: bool,
    ) -> Result<Session, StoreError>;

    fn update_session_notes_availability(
        &self,
        id: SessionId,
        available: bool,
    ) -> Result<Session, StoreError>;

    fn update_session_accusation_result(
        &self,
        id: SessionId,
        result: Option<&AccusationResult>,
    ) -> Result<Session, StoreError>;

    /// Closes the session. Closing a closed session is a no-op.
    fn close_session(&self, id: SessionId) -> Result<Session, StoreError>;

    // -- Players --

    /// # Errors
    /// [`StoreError::Conflict`] if the suspect is already claimed in this
    /// session.
    fn create_player(&self, player: NewPlayer) -> Result<Player, StoreError>;

    fn player(&self, id: PlayerId) -> Result<Player, StoreError>;

    /// Players of a session in join order.
    fn players(&self, session_id: SessionId)
    -> Result<Vec<Player>, StoreError>;

    fn player_by_token(&self, token: &str) -> Result<Player, StoreError>;

    fn player_token(&self, id: PlayerId) -> Result<String, StoreError>;

    fn update_player(
        &self,
        id: PlayerId,
        update: PlayerUpdate,
    ) -> Result<Player, StoreError>;

    /// Stamps `last_seen_at`.
    fn touch_player(&self, id: PlayerId) -> Result<Player, StoreError>;

    // -- Events --

    /// Appends an event and applies `effects`, atomically.
    ///
    /// `expected_head` is the last event id the caller folded (`None` for
    /// an empty log). If the log has moved on, nothing is written.
    ///
    /// # Errors
    /// - [`StoreError::StaleHead`] on a head mismatch
    /// - [`StoreError::SessionClosed`] if the session is closed
    /// - [`StoreError::InvalidTransition`] if `effects.status` moves
    ///   backwards
    fn append_event(
        &self,
        event: NewEvent,
        expected_head: Option<EventId>,
        effects: SessionEffects,
    ) -> Result<Event, StoreError>;

    /// Events with `id > since` (all of them for `None`), oldest first.
    fn list_events(
        &self,
        session_id: SessionId,
        since: Option<EventId>,
    ) -> Result<Vec<Event>, StoreError>;

    /// Id of the newest event, `None` for an empty log.
    fn head_event_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<EventId>, StoreError>;
}
