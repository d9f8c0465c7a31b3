//! The local gameplay cache.
//!
//! A [`SessionView`] holds the last snapshot, every event seen so far and
//! the [`TurnState`] folded from them. It accepts frames from the live
//! connection and batches from the polling endpoint alike; an event at or
//! below the last seen id is ignored, so overlapping sources are safe.

use casefile_protocol::{
    ClientMessage, Event, EventId, LiveErrorCode, Player, PlayerId,
    ServerMessage, Session, SessionSnapshot, SessionStatus, SuspectId,
};
use casefile_turn::TurnState;

use crate::{ClientError, Identity, IdentityStore};

/// What applying a frame did to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// A new snapshot replaced session and players.
    Snapshot,
    /// An event was folded in.
    Event(EventId),
    /// The event was already known.
    Ignored,
    /// The session is closed. Local state and identity are gone.
    Closed,
}

/// Local cache of one session, built around an injected identity store.
pub struct SessionView<S: IdentityStore> {
    identities: S,
    identity: Option<Identity>,
    session: Option<Session>,
    players: Vec<Player>,
    events: Vec<Event>,
    state: TurnState,
}

impl<S: IdentityStore> SessionView<S> {
    /// Builds a view, loading any identity already stored.
    pub fn new(identities: S) -> Result<Self, ClientError> {
        let identity = identities.load()?;
        Ok(Self {
            identities,
            identity,
            session: None,
            players: Vec::new(),
            events: Vec::new(),
            state: TurnState::new(),
        })
    }

    /// Stores the identity returned by join or reconnect.
    pub fn remember(&mut self, identity: Identity) -> Result<(), ClientError> {
        self.identities.save(&identity)?;
        self.identity = Some(identity);
        Ok(())
    }

    /// Applies one frame from the live connection.
    ///
    /// # Errors
    /// [`ClientError::Server`] for error frames other than
    /// `session_closed`, [`ClientError::Turn`] for an event that does
    /// not fold.
    pub fn apply(&mut self, msg: ServerMessage) -> Result<ViewUpdate, ClientError> {
        match msg {
            ServerMessage::Session { session, players } => {
                self.apply_snapshot(SessionSnapshot { session, players })
            }
            ServerMessage::Event { event } => self.apply_event(event),
            ServerMessage::Error {
                code: LiveErrorCode::SessionClosed,
                ..
            } => {
                self.discard()?;
                Ok(ViewUpdate::Closed)
            }
            ServerMessage::Error { code, message } => {
                Err(ClientError::Server { code, message })
            }
        }
    }

    /// Replaces session and players. A closed session discards everything.
    pub fn apply_snapshot(
        &mut self,
        snapshot: SessionSnapshot,
    ) -> Result<ViewUpdate, ClientError> {
        if snapshot.session.status.is_closed() {
            self.discard()?;
            return Ok(ViewUpdate::Closed);
        }

        // Same code, new session: the old log no longer applies.
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.id != snapshot.session.id)
        {
            tracing::debug!(session_id = %snapshot.session.id, "session changed, dropping log");
            self.events.clear();
            self.state = TurnState::new();
        }

        self.session = Some(snapshot.session);
        self.players = snapshot.players;
        Ok(ViewUpdate::Snapshot)
    }

    /// Folds in one event unless it is already known.
    pub fn apply_event(&mut self, event: Event) -> Result<ViewUpdate, ClientError> {
        if !self.state.apply_event(&event)? {
            return Ok(ViewUpdate::Ignored);
        }
        let id = event.id;
        self.events.push(event);
        Ok(ViewUpdate::Event(id))
    }

    /// Folds in a batch from `GET /sessions/{code}/events`. Returns how
    /// many events were new.
    pub fn apply_events(
        &mut self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<usize, ClientError> {
        let mut applied = 0;
        for event in events {
            if let ViewUpdate::Event(_) = self.apply_event(event)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// The frame to send after (re)connecting, once the connect snapshot
    /// has been applied.
    ///
    /// A view that has folded nothing of a game already under way asks
    /// for the whole log; otherwise it asks for what follows its last
    /// seen event.
    pub fn resume_message(&self) -> ClientMessage {
        let in_progress = self
            .session
            .as_ref()
            .is_some_and(|s| s.status == SessionStatus::Active);
        let last_event_id = match self.last_event_id() {
            None if in_progress => Some(EventId(0)),
            last => last,
        };
        ClientMessage::Resume { last_event_id }
    }

    /// Drops all local state and forgets the stored identity.
    pub fn discard(&mut self) -> Result<(), ClientError> {
        tracing::info!(player_id = ?self.identity.as_ref().map(|i| i.player_id), "session closed, discarding local state");
        self.session = None;
        self.players.clear();
        self.events.clear();
        self.state = TurnState::new();
        self.identity = None;
        self.identities.clear()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.state
    }

    pub fn last_event_id(&self) -> Option<EventId> {
        self.state.last_event_id()
    }

    /// This device's player, once the snapshot lists it.
    pub fn me(&self) -> Option<&Player> {
        let id = self.identity.as_ref()?.player_id;
        self.player(id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Whose turn it is according to the local fold.
    pub fn current_suspect(&self) -> Option<&SuspectId> {
        self.state.current_suspect()
    }

    pub fn is_my_turn(&self) -> bool {
        match (self.identity.as_ref(), self.state.current_slot()) {
            (Some(me), Some(slot)) => slot.player_id == me.player_id,
            _ => false,
        }
    }
}
