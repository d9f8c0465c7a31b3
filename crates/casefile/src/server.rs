//! `CasefileServer` builder, shared state and the router.
//!
//! This is the entry point for running a Casefile server. It ties the
//! layers together: store → session → turn → hub, behind one axum
//! router that serves both REST and the live endpoint.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use casefile_hub::HubRegistry;
use casefile_session::{ReconnectionConfig, ReconnectionManager};
use casefile_store::{SharedStore, SqliteStore, StoreError};
use casefile_turn::{GameRules, PassageDeck};
use tokio::net::TcpListener;

use crate::{CasefileError, ServerConfig, actions, api, live};

/// Shared server state handed to every request handler.
///
/// Cheap to clone: every field is an `Arc` or `Copy`.
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: SharedStore,
    pub(crate) sessions: Arc<ReconnectionManager>,
    pub(crate) hubs: Arc<HubRegistry>,
    pub(crate) rules: Arc<GameRules>,
    pub(crate) passages: Arc<PassageDeck>,
    pub(crate) action_retry_limit: u32,
}

impl AppState {
    pub fn new(store: SharedStore, config: &ServerConfig) -> Self {
        Self {
            sessions: Arc::new(ReconnectionManager::new(
                store.clone(),
                config.reconnection.clone(),
            )),
            hubs: Arc::new(HubRegistry::new(store.clone())),
            store,
            rules: Arc::new(config.rules.clone()),
            passages: Arc::new(PassageDeck::default()),
            action_retry_limit: config.action_retry_limit.max(1),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Runs synchronous store work for a handler on the blocking pool.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T, CasefileError>
    where
        F: FnOnce(&AppState) -> Result<T, CasefileError> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| StoreError::Internal(format!("handler task failed: {e}")))?
    }

    pub fn hubs(&self) -> &HubRegistry {
        &self.hubs
    }
}

/// All routes. Path segments in braces are axum captures.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(api::create_session))
        .route("/sessions/{code}", get(api::get_session))
        .route("/sessions/{code}/join", post(api::join_session))
        .route("/sessions/{code}/reconnect", post(api::reconnect))
        .route("/sessions/{code}/events", get(api::list_events))
        .route("/sessions/{code}/live", get(live::upgrade))
        // Host control plane.
        .route("/sessions/{code}/turn", post(api::set_turn))
        .route(
            "/sessions/{code}/accusation-result",
            post(api::set_accusation_result),
        )
        .route(
            "/sessions/{code}/notes-availability",
            post(api::set_notes_availability),
        )
        .route("/sessions/{code}/interruption", post(api::set_interruption))
        .route("/sessions/{code}/inspector-note", post(api::set_inspector_note))
        .route("/sessions/{code}/close", post(api::close_session))
        // Players.
        .route("/players/{id}", patch(api::update_player))
        .route("/players/{id}/actions", post(actions::submit_action))
        .with_state(state)
}

/// Builder for configuring and starting a Casefile server.
///
/// # Example
///
/// ```rust,ignore
/// let server = CasefileServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct CasefileServerBuilder {
    config: ServerConfig,
    store: Option<SharedStore>,
}

impl CasefileServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Persists to a SQLite file instead of memory.
    pub fn database(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database = Some(path.into());
        self
    }

    pub fn rules(mut self, rules: GameRules) -> Self {
        self.config.rules = rules;
        self
    }

    /// Sets the claimable suspects.
    pub fn roster<I, S>(mut self, roster: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.reconnection.roster =
            ReconnectionConfig::with_roster(roster).roster;
        self
    }

    pub fn action_retry_limit(mut self, limit: u32) -> Self {
        self.config.action_retry_limit = limit;
        self
    }

    /// Uses an already opened store instead of opening one from the
    /// config.
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Opens the store and binds the listener.
    pub async fn build(self) -> Result<CasefileServer, CasefileError> {
        let store = match self.store {
            Some(store) => store,
            None => open_store(&self.config)?,
        };
        let state = AppState::new(store, &self.config);

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "casefile server bound");

        Ok(CasefileServer {
            listener,
            router: router(state),
        })
    }
}

impl Default for CasefileServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn open_store(config: &ServerConfig) -> Result<SharedStore, CasefileError> {
    let store = match &config.database {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening database");
            SqliteStore::open(path)?
        }
        None => {
            tracing::warn!("no database configured, sessions live in memory only");
            SqliteStore::open_in_memory()?
        }
    };
    let store: SharedStore = Arc::new(store.with_config(config.store.clone()));
    Ok(store)
}

/// A bound Casefile server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct CasefileServer {
    listener: TcpListener,
    router: Router,
}

impl CasefileServer {
    /// Creates a new builder.
    pub fn builder() -> CasefileServerBuilder {
        CasefileServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until the process is terminated.
    pub async fn run(self) -> Result<(), CasefileError> {
        tracing::info!("casefile server running");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
