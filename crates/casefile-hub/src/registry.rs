//! Hub registry: finds or spawns the coordinator for a session code.

use std::collections::HashMap;

use casefile_protocol::SessionCode;
use casefile_store::{SharedStore, run_blocking};
use tokio::sync::Mutex;

use crate::hub::spawn_hub;
use crate::{Broadcast, ConnectionId, ConnectionSender, HubError, HubHandle};

/// Default command channel size for coordinators.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// A coordinator may stop between lookup and connect when its last
/// connection leaves; connecting then retries against a fresh one.
const CONNECT_ATTEMPTS: usize = 2;

/// Tracks the running coordinator of every session code.
///
/// Coordinators are spawned on the first connection to a code and stop
/// on their own when the last connection leaves. A stopped coordinator's
/// handle stays in the map until the next lookup replaces it.
pub struct HubRegistry {
    store: SharedStore,
    hubs: Mutex<HashMap<SessionCode, HubHandle>>,
    channel_size: usize,
}

impl HubRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            hubs: Mutex::new(HashMap::new()),
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Sets the command channel size for coordinators spawned from now on.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    /// Registers a live connection for `code`.
    ///
    /// On success the connection has been sent a `session` snapshot and
    /// the caller gets the handle to use for `resume` and `disconnect`.
    ///
    /// # Errors
    /// - [`HubError::NotFound`] for an unknown code
    /// - [`HubError::SessionClosed`] if the session is closed
    pub async fn connect(
        &self,
        code: &SessionCode,
        sender: ConnectionSender,
    ) -> Result<(ConnectionId, HubHandle), HubError> {
        let id = ConnectionId::next();
        for attempt in 1..=CONNECT_ATTEMPTS {
            let handle = self.live_handle(code).await?;
            match handle.connect(id, sender.clone()).await {
                Ok(()) => return Ok((id, handle)),
                Err(HubError::Unavailable(_)) => {
                    tracing::debug!(%code, attempt, "hub stopped during connect, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(HubError::Unavailable(code.clone()))
    }

    /// Asks the coordinator for `code` to push to its connections.
    ///
    /// Best effort: with no running coordinator this does nothing, and
    /// failures are logged rather than returned. Returns how many
    /// connections were reached.
    pub async fn broadcast(&self, code: &SessionCode, kind: Broadcast) -> usize {
        let handle = {
            let hubs = self.hubs.lock().await;
            hubs.get(code).filter(|h| !h.is_closed()).cloned()
        };
        let Some(handle) = handle else {
            tracing::trace!(%code, ?kind, "no live hub, broadcast skipped");
            return 0;
        };
        match handle.broadcast(kind).await {
            Ok(reached) => reached,
            Err(e) => {
                tracing::debug!(%code, ?kind, error = %e, "broadcast dropped");
                0
            }
        }
    }

    /// Number of coordinators still running.
    pub async fn hub_count(&self) -> usize {
        let mut hubs = self.hubs.lock().await;
        hubs.retain(|_, h| !h.is_closed());
        hubs.len()
    }

    /// Returns the running coordinator for the code's current session,
    /// spawning one if needed.
    async fn live_handle(&self, code: &SessionCode) -> Result<HubHandle, HubError> {
        let lookup = code.clone();
        let session = run_blocking(&self.store, move |store| store.session_by_code(&lookup))
            .await
            .map_err(|e| HubError::from_store(code, e))?;
        if session.status.is_closed() {
            return Err(HubError::SessionClosed(code.clone()));
        }

        let mut hubs = self.hubs.lock().await;
        if let Some(handle) = hubs.get(code) {
            if !handle.is_closed() && handle.session_id() == session.id {
                return Ok(handle.clone());
            }
        }

        let handle = spawn_hub(
            code.clone(),
            session.id,
            self.store.clone(),
            self.channel_size,
        );
        hubs.insert(code.clone(), handle.clone());
        tracing::debug!(%code, session_id = %session.id, "hub spawned");
        Ok(handle)
    }
}
