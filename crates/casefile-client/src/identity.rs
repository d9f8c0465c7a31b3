//! Where a device remembers which player it is.
//!
//! A phone that is reloaded, locked or briefly offline comes back with
//! the stored identity and calls `POST /sessions/{code}/reconnect`. When
//! the session turns out to be closed the identity is cleared so the
//! phone lands back on the join screen.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use casefile_protocol::{PlayerId, SessionCode};
use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Everything needed to reclaim a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub code: SessionCode,
    pub player_id: PlayerId,
    pub reconnect_token: String,
}

/// Persistent storage for at most one [`Identity`].
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<Option<Identity>, ClientError>;

    fn save(&self, identity: &Identity) -> Result<(), ClientError>;

    /// Forgets the stored identity. Clearing an empty store is a no-op.
    fn clear(&self) -> Result<(), ClientError>;
}

/// Keeps the identity in memory only. For the host screen and tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    slot: Mutex<Option<Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Identity>>, ClientError> {
        self.slot
            .lock()
            .map_err(|e| ClientError::Identity(format!("poisoned: {e}")))
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<Identity>, ClientError> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, identity: &Identity) -> Result<(), ClientError> {
        *self.slot()? = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Stores the identity as a small JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileIdentityStore {
    path: PathBuf,
}

impl JsonFileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for JsonFileIdentityStore {
    fn load(&self) -> Result<Option<Identity>, ClientError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, identity: &Identity) -> Result<(), ClientError> {
        // Write beside the target and rename so a crash never leaves a
        // half-written file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(identity)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), player_id = %identity.player_id, "identity saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "identity cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
