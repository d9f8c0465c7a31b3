//! Session coordinator: an isolated Tokio task per live session code.
//!
//! The coordinator owns every live connection for its session and the
//! replay watermark of each one (the highest event id that connection has
//! been sent). Because all broadcasts for a session go through one task,
//! a connection sees event ids in ascending order with no gaps and no
//! duplicates, however many REST handlers are writing concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use casefile_protocol::{
    Event, EventId, ServerMessage, SessionCode, SessionId, SessionSnapshot,
};
use casefile_store::{SessionStore, SharedStore, StoreError, run_blocking};
use tokio::sync::{mpsc, oneshot};

use crate::HubError;

/// Counter for generating unique connection ids.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Channel sender for delivering frames to one connection's writer task.
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

/// What a coordinator should push after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Broadcast {
    /// Re-read the session and its players and push them to everyone.
    Snapshot,
    /// Push the log tail past each connection's watermark.
    Events,
}

/// Commands sent to a coordinator through its channel.
pub(crate) enum HubCommand {
    Connect {
        id: ConnectionId,
        sender: ConnectionSender,
        reply: oneshot::Sender<Result<(), HubError>>,
    },

    Resume {
        id: ConnectionId,
        last_event_id: Option<EventId>,
        reply: oneshot::Sender<Result<usize, HubError>>,
    },

    /// Reply carries the number of connections reached.
    Broadcast {
        kind: Broadcast,
        reply: oneshot::Sender<usize>,
    },

    Disconnect { id: ConnectionId },
}

/// Handle to a running coordinator.
///
/// Cheap to clone. The registry keeps one per code, and each live socket
/// keeps its own copy so it always talks to the coordinator it joined.
#[derive(Clone, Debug)]
pub struct HubHandle {
    code: SessionCode,
    session_id: SessionId,
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// The session this coordinator serves. A code can be reused after
    /// its session closes, so this is what identifies the coordinator.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Whether the coordinator task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Completes once the coordinator task has stopped.
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }

    /// Registers a connection. On success the connection has already been
    /// sent a `session` snapshot. Event broadcasts reach it once it has
    /// resumed.
    pub async fn connect(
        &self,
        id: ConnectionId,
        sender: ConnectionSender,
    ) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Connect {
            id,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Replays every event after `last_event_id` to one connection, or
    /// the events appended since connect when there is none. Returns how
    /// many were sent.
    pub async fn resume(
        &self,
        id: ConnectionId,
        last_event_id: Option<EventId>,
    ) -> Result<usize, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Resume {
            id,
            last_event_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Pushes to every connection. Returns how many were reached.
    pub async fn broadcast(&self, kind: Broadcast) -> Result<usize, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Broadcast {
            kind,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Removes a connection (fire-and-forget).
    pub async fn disconnect(&self, id: ConnectionId) {
        let _ = self.send(HubCommand::Disconnect { id }).await;
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> HubError {
        HubError::Unavailable(self.code.clone())
    }
}

/// One registered connection.
struct Connection {
    sender: ConnectionSender,
    /// Highest event id this connection has been sent. Starts at the log
    /// head as of connect.
    watermark: Option<EventId>,
    /// No `resume` yet. Event broadcasts wait so the replay goes out
    /// first; snapshots are still sent.
    awaiting_resume: bool,
}

/// The internal coordinator state. Runs inside a Tokio task.
struct HubActor {
    code: SessionCode,
    session_id: SessionId,
    store: SharedStore,
    connections: HashMap<ConnectionId, Connection>,
    /// Set once a connect has been handled. Until then an empty
    /// connection map means "not joined yet", not "everyone left".
    joined: bool,
    receiver: mpsc::Receiver<HubCommand>,
}

impl HubActor {
    /// Runs the actor loop until the last connection leaves.
    async fn run(mut self) {
        tracing::info!(code = %self.code, session_id = %self.session_id, "hub started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Connect { id, sender, reply } => {
                    self.joined = true;
                    let result = self.handle_connect(id, sender).await;
                    let _ = reply.send(result);
                }
                HubCommand::Resume {
                    id,
                    last_event_id,
                    reply,
                } => {
                    let result = self.handle_resume(id, last_event_id).await;
                    let _ = reply.send(result);
                }
                HubCommand::Broadcast { kind, reply } => {
                    let reached = self.handle_broadcast(kind).await;
                    let _ = reply.send(reached);
                }
                HubCommand::Disconnect { id } => {
                    if self.connections.remove(&id).is_some() {
                        tracing::debug!(
                            code = %self.code,
                            connection = %id,
                            remaining = self.connections.len(),
                            "connection left"
                        );
                    }
                }
            }

            if self.joined && self.connections.is_empty() {
                break;
            }
        }

        tracing::info!(code = %self.code, session_id = %self.session_id, "hub stopped");
    }

    async fn handle_connect(
        &mut self,
        id: ConnectionId,
        sender: ConnectionSender,
    ) -> Result<(), HubError> {
        let (snapshot, watermark) = self
            .read(|store, session_id| {
                Ok((
                    load_snapshot(store, session_id)?,
                    store.head_event_id(session_id)?,
                ))
            })
            .await?;
        if snapshot.session.status.is_closed() {
            return Err(HubError::SessionClosed(self.code.clone()));
        }

        if sender.send(ServerMessage::snapshot(snapshot)).is_err() {
            tracing::debug!(code = %self.code, connection = %id, "connection gone before snapshot");
            return Ok(());
        }
        self.connections.insert(
            id,
            Connection {
                sender,
                watermark,
                awaiting_resume: true,
            },
        );
        tracing::info!(
            code = %self.code,
            connection = %id,
            connections = self.connections.len(),
            ?watermark,
            "connection joined"
        );
        Ok(())
    }

    /// Replays the log to one connection and releases its held
    /// broadcasts.
    ///
    /// The first resume starts at `last_event_id`, or at the connect head
    /// when there is none. A later resume only sends what lies above the
    /// watermark, so nothing is sent twice.
    async fn handle_resume(
        &mut self,
        id: ConnectionId,
        last_event_id: Option<EventId>,
    ) -> Result<usize, HubError> {
        let Some(conn) = self.connections.get(&id) else {
            tracing::warn!(code = %self.code, connection = %id, "resume from unknown connection");
            return Ok(0);
        };
        let floor = match (conn.awaiting_resume, last_event_id) {
            (true, Some(since)) => Some(since),
            (true, None) => conn.watermark,
            (false, since) => since.max(conn.watermark),
        };

        let (session, events) = self
            .read(move |store, session_id| {
                Ok((
                    store.session(session_id)?,
                    store.list_events(session_id, floor)?,
                ))
            })
            .await?;
        if session.status.is_closed() {
            return Err(HubError::SessionClosed(self.code.clone()));
        }

        let sent = match self.connections.get_mut(&id) {
            Some(conn) => {
                conn.awaiting_resume = false;
                push_events(conn, &events, floor)
            }
            None => Some(0),
        };
        match sent {
            Some(count) => {
                tracing::debug!(code = %self.code, connection = %id, ?last_event_id, ?floor, count, "resumed");
                Ok(count)
            }
            None => {
                self.drop_connections(vec![id]);
                Ok(0)
            }
        }
    }

    async fn handle_broadcast(&mut self, kind: Broadcast) -> usize {
        let result = match kind {
            Broadcast::Snapshot => self.broadcast_snapshot().await,
            Broadcast::Events => self.broadcast_events().await,
        };
        match result {
            Ok(reached) => reached,
            Err(e) => {
                tracing::warn!(code = %self.code, ?kind, error = %e, "broadcast failed");
                0
            }
        }
    }

    async fn broadcast_snapshot(&mut self) -> Result<usize, HubError> {
        let snapshot = self.read(load_snapshot).await?;
        let msg = ServerMessage::snapshot(snapshot);
        let mut dead = Vec::new();
        for (id, conn) in &self.connections {
            if conn.sender.send(msg.clone()).is_err() {
                dead.push(*id);
            }
        }
        Ok(self.drop_connections(dead))
    }

    async fn broadcast_events(&mut self) -> Result<usize, HubError> {
        let since = {
            let mut live = self
                .connections
                .values()
                .filter(|c| !c.awaiting_resume)
                .peekable();
            if live.peek().is_none() {
                return Ok(self.connections.len());
            }
            // One read covers every connection: start at the lowest watermark.
            live.map(|c| c.watermark).min().flatten()
        };
        let events = self
            .read(move |store, session_id| store.list_events(session_id, since))
            .await?;

        let mut dead = Vec::new();
        for (id, conn) in self.connections.iter_mut() {
            if conn.awaiting_resume {
                continue;
            }
            let floor = conn.watermark;
            if push_events(conn, &events, floor).is_none() {
                dead.push(*id);
            }
        }
        Ok(self.drop_connections(dead))
    }

    /// Removes connections whose receiver is gone. Returns how many
    /// connections remain.
    fn drop_connections(&mut self, dead: Vec<ConnectionId>) -> usize {
        for id in dead {
            self.connections.remove(&id);
            tracing::debug!(code = %self.code, connection = %id, "dropped dead connection");
        }
        self.connections.len()
    }

    /// Runs a store read for this session off the runtime threads.
    async fn read<T, F>(&self, f: F) -> Result<T, HubError>
    where
        F: FnOnce(&dyn SessionStore, SessionId) -> Result<T, StoreError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let session_id = self.session_id;
        run_blocking(&self.store, move |store| f(store, session_id))
            .await
            .map_err(|e| HubError::from_store(&self.code, e))
    }
}

fn load_snapshot(
    store: &dyn SessionStore,
    session_id: SessionId,
) -> Result<SessionSnapshot, StoreError> {
    Ok(SessionSnapshot {
        session: store.session(session_id)?,
        players: store.players(session_id)?,
    })
}

/// Sends the events with `id > floor` to `conn` and moves its watermark.
/// Returns the number sent, or `None` if the receiver is gone.
fn push_events(
    conn: &mut Connection,
    events: &[Event],
    floor: Option<EventId>,
) -> Option<usize> {
    let mut sent = 0;
    for event in events.iter().filter(|e| Some(e.id) > floor) {
        conn.sender
            .send(ServerMessage::Event {
                event: event.clone(),
            })
            .ok()?;
        if Some(event.id) > conn.watermark {
            conn.watermark = Some(event.id);
        }
        sent += 1;
    }
    Some(sent)
}

/// Spawns a coordinator task for one session and returns its handle.
///
/// `channel_size` bounds the command queue; senders wait when it fills.
pub(crate) fn spawn_hub(
    code: SessionCode,
    session_id: SessionId,
    store: SharedStore,
    channel_size: usize,
) -> HubHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = HubActor {
        code: code.clone(),
        session_id,
        store,
        connections: HashMap::new(),
        joined: false,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    HubHandle {
        code,
        session_id,
        sender: tx,
    }
}
