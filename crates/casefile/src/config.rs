//! Server configuration.
//!
//! Defaults suit a laptop on the living-room TV. Deployments override
//! them through environment variables:
//!
//! | Variable               | Meaning                                  |
//! |------------------------|------------------------------------------|
//! | `CASEFILE_BIND`        | listen address, e.g. `0.0.0.0:8080`      |
//! | `CASEFILE_DATABASE`    | SQLite file; unset or `:memory:` for RAM |
//! | `CASEFILE_TOTAL_CLUES` | size of the clue deck                    |
//! | `CASEFILE_ROSTER`      | comma-separated claimable suspects       |

use std::path::PathBuf;

use casefile_session::ReconnectionConfig;
use casefile_store::StoreConfig;
use casefile_turn::GameRules;

use crate::CasefileError;

pub const BIND_VAR: &str = "CASEFILE_BIND";
pub const DATABASE_VAR: &str = "CASEFILE_DATABASE";
pub const TOTAL_CLUES_VAR: &str = "CASEFILE_TOTAL_CLUES";
pub const ROSTER_VAR: &str = "CASEFILE_ROSTER";

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// SQLite database file. `None` keeps everything in memory.
    pub database: Option<PathBuf>,

    pub rules: GameRules,
    pub reconnection: ReconnectionConfig,
    pub store: StoreConfig,

    /// How many times an action is re-folded and retried when another
    /// write moved the log head first.
    pub action_retry_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            database: None,
            rules: GameRules::default(),
            reconnection: ReconnectionConfig::default(),
            store: StoreConfig::default(),
            action_retry_limit: 3,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, CasefileError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// # Errors
    /// [`CasefileError::Config`] for a value that doesn't parse.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CasefileError> {
        let mut config = Self::default();

        if let Some(bind) = lookup(BIND_VAR) {
            config.bind_addr = bind.trim().to_string();
        }

        if let Some(db) = lookup(DATABASE_VAR) {
            let db = db.trim();
            config.database = match db {
                "" | ":memory:" => None,
                path => Some(PathBuf::from(path)),
            };
        }

        if let Some(raw) = lookup(TOTAL_CLUES_VAR) {
            let total: u32 = raw.trim().parse().map_err(|_| {
                CasefileError::Config(format!(
                    "{TOTAL_CLUES_VAR} must be a positive integer, got {raw:?}"
                ))
            })?;
            if total == 0 {
                return Err(CasefileError::Config(format!(
                    "{TOTAL_CLUES_VAR} must be at least 1"
                )));
            }
            config.rules.total_clues = total;
        }

        if let Some(raw) = lookup(ROSTER_VAR) {
            let roster: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if roster.is_empty() {
                return Err(CasefileError::Config(format!(
                    "{ROSTER_VAR} names no suspects"
                )));
            }
            config.reconnection.roster =
                ReconnectionConfig::with_roster(roster).roster;
        }

        Ok(config)
    }
}
