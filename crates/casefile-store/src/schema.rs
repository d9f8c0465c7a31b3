/// SQL DDL for the Casefile database.
///
/// JSON-shaped fields (eliminations, interruption, the solution) are
/// stored as TEXT and decoded by the store. Timestamps are RFC 3339 TEXT
/// through rusqlite's `chrono` support.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'lobby'
        CHECK (status IN ('lobby', 'active', 'closed')),
    current_turn_suspect_id TEXT,
    head_event_id INTEGER,
    notes_available INTEGER NOT NULL DEFAULT 0,
    interruption TEXT,
    inspector_notes TEXT NOT NULL DEFAULT '[]',
    accusation_result TEXT,
    solution TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    name TEXT NOT NULL,
    suspect_id TEXT NOT NULL,
    reconnect_token TEXT NOT NULL UNIQUE,
    notes TEXT NOT NULL DEFAULT '',
    eliminations TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    UNIQUE (session_id, suspect_id)
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    player_id INTEGER NOT NULL REFERENCES players(id),
    type TEXT NOT NULL CHECK (type IN ('turn_action', 'accusation')),
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_live_code
    ON sessions(code) WHERE status != 'closed';
CREATE INDEX IF NOT EXISTS idx_sessions_code ON sessions(code);
CREATE INDEX IF NOT EXISTS idx_players_session ON players(session_id);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Applied to every connection.
pub const PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
"#;

/// Applied to file-backed connections only.
pub const FILE_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
"#;
