//! [`SessionStore`] on a single SQLite connection.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use casefile_protocol::{
    AccusationResult, Eliminations, Event, EventId, EventKind, Interruption,
    Player, PlayerId, Session, SessionCode, SessionId, SessionStatus,
    Solution, SuspectId,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};

use crate::schema::{CREATE_TABLES, FILE_PRAGMAS, PRAGMAS, SCHEMA_VERSION};
use crate::{
    CodeGenerator, NewEvent, NewPlayer, PlayerUpdate, RandomCodes,
    SessionEffects, SessionStore, StoreConfig, StoreError,
};

const SESSION_COLUMNS: &str = "id, code, status, current_turn_suspect_id, \
     notes_available, interruption, inspector_notes, accusation_result, \
     created_at, updated_at";

const PLAYER_COLUMNS: &str = "id, session_id, name, suspect_id, notes, \
     eliminations, created_at, last_seen_at";

const EVENT_COLUMNS: &str =
    "id, session_id, player_id, type, payload, created_at";

/// SQLite-backed store.
///
/// One connection behind a mutex. Calls are short, and serializing them
/// means a transaction never observes a half-applied write from another
/// handler.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: StoreConfig,
    codes: Box<dyn CodeGenerator>,
}

impl SqliteStore {
    /// Opens (or creates) a database file in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(FILE_PRAGMAS)?;
        tracing::info!(path = %path.display(), "opened session database");
        Self::init(conn)
    }

    /// A private database that disappears with the store. Used by tests
    /// and by the demo server when no path is configured.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(CREATE_TABLES)?;
        conn.execute(
            "INSERT INTO schema_version (version)
             SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
            params![SCHEMA_VERSION],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            config: StoreConfig::default(),
            codes: Box::new(RandomCodes),
        })
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_code_generator(
        mut self,
        codes: impl CodeGenerator,
    ) -> Self {
        self.codes = Box::new(codes);
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("connection lock poisoned".into()))
    }

    /// Writes one session column and stamps `updated_at`.
    fn set_session_column(
        &self,
        id: SessionId,
        column: &str,
        value: &dyn ToSql,
    ) -> Result<Session, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            &format!(
                "UPDATE sessions SET {column} = ?1, updated_at = ?2 WHERE id = ?3"
            ),
            params![value, Utc::now(), id.0],
        )?;
        if changed == 0 {
            return Err(session_not_found(id));
        }
        load_session(&conn, id)
    }
}

impl SessionStore for SqliteStore {
    fn create_session(
        &self,
        solution: Option<&Solution>,
    ) -> Result<Session, StoreError> {
        let solution = solution.map(serde_json::to_string).transpose()?;
        let len = self.config.effective_code_length();
        let attempts = self.config.max_code_attempts;
        let conn = self.conn()?;

        for attempt in 1..=attempts {
            let candidate = self.codes.generate(len);
            let code = SessionCode::parse(&candidate)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let now = Utc::now();
            let inserted = conn.execute(
                "INSERT INTO sessions (code, status, solution, created_at, updated_at)
                 VALUES (?1, 'lobby', ?2, ?3, ?3)",
                params![code.as_str(), solution, now],
            );
            match inserted {
                Ok(_) => {
                    let id = SessionId(conn.last_insert_rowid());
                    tracing::info!(session_id = %id, %code, "session created");
                    return load_session(&conn, id);
                }
                Err(e) if StoreError::is_constraint(&e) => {
                    tracing::debug!(%code, attempt, "session code collision");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(attempts, "session code space exhausted");
        Err(StoreError::CodesExhausted { attempts })
    }

    fn session(&self, id: SessionId) -> Result<Session, StoreError> {
        let conn = self.conn()?;
        load_session(&conn, id)
    }

    fn session_by_code(
        &self,
        code: &SessionCode,
    ) -> Result<Session, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE code = ?1
                     ORDER BY (status = 'closed') ASC, id DESC LIMIT 1"
                ),
                params![code.as_str()],
                SessionRow::from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("session {code}")))?;
        row.into_session()
    }

    fn solution(&self, id: SessionId) -> Result<Option<Solution>, StoreError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT solution FROM sessions WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| session_not_found(id))?;
        raw.map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(StoreError::from)
    }

    fn update_session_turn(
        &self,
        id: SessionId,
        suspect: Option<&SuspectId>,
    ) -> Result<Session, StoreError> {
        let value = suspect.map(SuspectId::as_str);
        self.set_session_column(id, "current_turn_suspect_id", &value)
    }

    fn update_session_interruption(
        &self,
        id: SessionId,
        interruption: Option<&Interruption>,
    ) -> Result<Session, StoreError> {
        let value = interruption.map(serde_json::to_string).transpose()?;
        self.set_session_column(id, "interruption", &value)
    }

    fn update_session_inspector_note(
        &self,
        id: SessionId,
        note_id: &str,
        available: bool,
    ) -> Result<Session, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let raw: String = tx
            .query_row(
                "SELECT inspector_notes FROM sessions WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| session_not_found(id))?;

        let mut notes: BTreeSet<String> = serde_json::from_str(&raw)?;
        if available {
            notes.insert(note_id.to_owned());
        } else {
            notes.remove(note_id);
        }

        tx.execute(
            "UPDATE sessions SET inspector_notes = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(&notes)?, Utc::now(), id.0],
        )?;
        let session = load_session(&tx, id)?;
        tx.commit()?;
        Ok(session)
    }

    fn update_session_notes_availability(
        &self,
        id: SessionId,
        available: bool,
    ) -> Result<Session, StoreError> {
        self.set_session_column(id, "notes_available", &available)
    }

    fn update_session_accusation_result(
        &self,
        id: SessionId,
        result: Option<&AccusationResult>,
    ) -> Result<Session, StoreError> {
        let value = result.map(serde_json::to_string).transpose()?;
        self.set_session_column(id, "accusation_result", &value)
    }

    fn close_session(&self, id: SessionId) -> Result<Session, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET status = 'closed', updated_at = ?1
             WHERE id = ?2 AND status != 'closed'",
            params![Utc::now(), id.0],
        )?;
        if changed > 0 {
            tracing::info!(session_id = %id, "session closed");
        }
        load_session(&conn, id)
    }

    fn create_player(&self, player: NewPlayer) -> Result<Player, StoreError> {
        let conn = self.conn()?;
        // Surfaces an unknown session as NotFound rather than a foreign
        // key violation.
        load_session(&conn, player.session_id)?;

        let now = Utc::now();
        let inserted = conn.execute(
            "INSERT INTO players
                (session_id, name, suspect_id, reconnect_token, created_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                player.session_id.0,
                player.name,
                player.suspect_id.as_str(),
                player.reconnect_token,
                now,
            ],
        );
        match inserted {
            Ok(_) => {
                let id = PlayerId(conn.last_insert_rowid());
                tracing::debug!(
                    player_id = %id,
                    session_id = %player.session_id,
                    suspect = %player.suspect_id,
                    "player created"
                );
                load_player(&conn, id)
            }
            Err(e) if StoreError::is_constraint(&e) => {
                Err(StoreError::Conflict(format!(
                    "suspect {} is already claimed",
                    player.suspect_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn player(&self, id: PlayerId) -> Result<Player, StoreError> {
        let conn = self.conn()?;
        load_player(&conn, id)
    }

    fn players(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Player>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE session_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![session_id.0], PlayerRow::from_row)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(PlayerRow::into_player))
            .collect()
    }

    fn player_by_token(&self, token: &str) -> Result<Player, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players WHERE reconnect_token = ?1"
            ),
            params![token],
            PlayerRow::from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound("player for token".into()))?
        .into_player()
    }

    fn player_token(&self, id: PlayerId) -> Result<String, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT reconnect_token FROM players WHERE id = ?1",
            params![id.0],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| player_not_found(id))
    }

    fn update_player(
        &self,
        id: PlayerId,
        update: PlayerUpdate,
    ) -> Result<Player, StoreError> {
        let eliminations =
            update.eliminations.as_ref().map(serde_json::to_string).transpose()?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE players SET
                notes = COALESCE(?1, notes),
                eliminations = COALESCE(?2, eliminations),
                last_seen_at = ?3
             WHERE id = ?4",
            params![update.notes, eliminations, Utc::now(), id.0],
        )?;
        if changed == 0 {
            return Err(player_not_found(id));
        }
        load_player(&conn, id)
    }

    fn touch_player(&self, id: PlayerId) -> Result<Player, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE players SET last_seen_at = ?1 WHERE id = ?2",
            params![Utc::now(), id.0],
        )?;
        if changed == 0 {
            return Err(player_not_found(id));
        }
        load_player(&conn, id)
    }

    fn append_event(
        &self,
        event: NewEvent,
        expected_head: Option<EventId>,
        effects: SessionEffects,
    ) -> Result<Event, StoreError> {
        let payload = serde_json::to_string(&event.payload)?;
        let session_id = event.session_id;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (status, head): (String, Option<i64>) = tx
            .query_row(
                "SELECT status, head_event_id FROM sessions WHERE id = ?1",
                params![session_id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| session_not_found(session_id))?;
        let status = parse_status(&status)?;

        if status.is_closed() {
            return Err(StoreError::SessionClosed(session_id));
        }

        let actual = head.map(EventId);
        if actual != expected_head {
            tracing::debug!(
                %session_id,
                ?expected_head,
                ?actual,
                "append rejected: stale head"
            );
            return Err(StoreError::StaleHead {
                expected: expected_head,
                actual,
            });
        }

        let next_status = match effects.status {
            Some(to) if to != status => {
                if !status.can_transition_to(to) {
                    return Err(StoreError::InvalidTransition { from: status, to });
                }
                to
            }
            _ => status,
        };

        let owner: Option<i64> = tx
            .query_row(
                "SELECT session_id FROM players WHERE id = ?1",
                params![event.player_id.0],
                |row| row.get(0),
            )
            .optional()?;
        if owner != Some(session_id.0) {
            return Err(StoreError::NotFound(format!(
                "player {} in session {session_id}",
                event.player_id
            )));
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO events (session_id, player_id, type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id.0,
                event.player_id.0,
                event.kind.as_str(),
                payload,
                now,
            ],
        )?;
        let id = EventId(tx.last_insert_rowid());

        tx.execute(
            "UPDATE sessions SET
                head_event_id = ?1,
                status = ?2,
                current_turn_suspect_id = ?3,
                updated_at = ?4
             WHERE id = ?5",
            params![
                id.0,
                next_status.as_str(),
                effects.current_turn_suspect_id.as_ref().map(SuspectId::as_str),
                now,
                session_id.0,
            ],
        )?;

        let stored = load_event(&tx, id)?;
        tx.commit()?;

        tracing::debug!(
            event_id = %id,
            %session_id,
            kind = event.kind.as_str(),
            "event appended"
        );
        if next_status != status {
            tracing::info!(%session_id, from = %status, to = %next_status, "session status changed");
        }
        Ok(stored)
    }

    fn list_events(
        &self,
        session_id: SessionId,
        since: Option<EventId>,
    ) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE session_id = ?1 AND id > ?2 ORDER BY id ASC"
        ))?;
        let since = since.map_or(0, |e| e.0);
        let rows = stmt.query_map(params![session_id.0, since], EventRow::from_row)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(EventRow::into_event))
            .collect()
    }

    fn head_event_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<EventId>, StoreError> {
        let conn = self.conn()?;
        let head: Option<i64> = conn
            .query_row(
                "SELECT head_event_id FROM sessions WHERE id = ?1",
                params![session_id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| session_not_found(session_id))?;
        Ok(head.map(EventId))
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn session_not_found(id: SessionId) -> StoreError {
    StoreError::NotFound(format!("session {id}"))
}

fn player_not_found(id: PlayerId) -> StoreError {
    StoreError::NotFound(format!("player {id}"))
}

fn parse_status(raw: &str) -> Result<SessionStatus, StoreError> {
    SessionStatus::parse(raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown status {raw:?}")))
}

fn load_session(conn: &Connection, id: SessionId) -> Result<Session, StoreError> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
        params![id.0],
        SessionRow::from_row,
    )
    .optional()?
    .ok_or_else(|| session_not_found(id))?
    .into_session()
}

fn load_player(conn: &Connection, id: PlayerId) -> Result<Player, StoreError> {
    conn.query_row(
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
        params![id.0],
        PlayerRow::from_row,
    )
    .optional()?
    .ok_or_else(|| player_not_found(id))?
    .into_player()
}

fn load_event(conn: &Connection, id: EventId) -> Result<Event, StoreError> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
        params![id.0],
        EventRow::from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?
    .into_event()
}

/// Raw `sessions` columns, before JSON decoding.
struct SessionRow {
    id: i64,
    code: String,
    status: String,
    current_turn_suspect_id: Option<String>,
    notes_available: bool,
    interruption: Option<String>,
    inspector_notes: String,
    accusation_result: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            code: row.get(1)?,
            status: row.get(2)?,
            current_turn_suspect_id: row.get(3)?,
            notes_available: row.get(4)?,
            interruption: row.get(5)?,
            inspector_notes: row.get(6)?,
            accusation_result: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_session(self) -> Result<Session, StoreError> {
        Ok(Session {
            id: SessionId(self.id),
            code: SessionCode::parse(&self.code)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            status: parse_status(&self.status)?,
            current_turn_suspect_id: self.current_turn_suspect_id.map(SuspectId),
            notes_available: self.notes_available,
            interruption: self
                .interruption
                .map(|raw| serde_json::from_str::<Interruption>(&raw))
                .transpose()?,
            inspector_notes: serde_json::from_str(&self.inspector_notes)?,
            accusation_result: self
                .accusation_result
                .map(|raw| serde_json::from_str::<AccusationResult>(&raw))
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

struct PlayerRow {
    id: i64,
    session_id: i64,
    name: String,
    suspect_id: String,
    notes: String,
    eliminations: String,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl PlayerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            name: row.get(2)?,
            suspect_id: row.get(3)?,
            notes: row.get(4)?,
            eliminations: row.get(5)?,
            created_at: row.get(6)?,
            last_seen_at: row.get(7)?,
        })
    }

    fn into_player(self) -> Result<Player, StoreError> {
        Ok(Player {
            id: PlayerId(self.id),
            session_id: SessionId(self.session_id),
            name: self.name,
            suspect_id: SuspectId(self.suspect_id),
            notes: self.notes,
            eliminations: serde_json::from_str::<Eliminations>(&self.eliminations)?,
            created_at: self.created_at,
            last_seen_at: self.last_seen_at,
        })
    }
}

struct EventRow {
    id: i64,
    session_id: i64,
    player_id: i64,
    kind: String,
    payload: String,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            player_id: row.get(2)?,
            kind: row.get(3)?,
            payload: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_event(self) -> Result<Event, StoreError> {
        Ok(Event {
            id: EventId(self.id),
            session_id: SessionId(self.session_id),
            player_id: PlayerId(self.player_id),
            kind: EventKind::parse(&self.kind).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown event type {:?}", self.kind))
            })?,
            payload: serde_json::from_str(&self.payload)?,
            created_at: self.created_at,
        })
    }
}
