//! The live endpoint over a real socket, with REST calls going through the
//! same router so broadcasts reach the connected clients.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use casefile::{AppState, CasefileServer, ServerConfig, router};
use casefile_client::{
    Identity, LiveConnection, MemoryIdentityStore, SessionView, ViewUpdate,
};
use casefile_protocol::{
    ClientMessage, EventId, LiveErrorCode, ServerMessage, SessionCode,
    SessionStatus, SuspectId,
};
use casefile_session::Enrollment;
use casefile_store::{SessionStore, SharedStore, SqliteStore};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

// =========================================================================
// Helpers
// =========================================================================

struct TestServer {
    app: Router,
    base: String,
}

async fn serve() -> TestServer {
    let store: SharedStore = Arc::new(SqliteStore::open_in_memory().unwrap());
    let app = router(AppState::new(store, &ServerConfig::default()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = app.clone();
    tokio::spawn(async move { axum::serve(listener, served).await });
    TestServer {
        app,
        base: format!("ws://{addr}"),
    }
}

impl TestServer {
    async fn post(&self, uri: &str, body: Value) -> Value {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(status == StatusCode::OK || status == StatusCode::CREATED, "{status}: {value}");
        value
    }

    async fn create(&self) -> SessionCode {
        let value = self.post("/sessions", json!({})).await;
        SessionCode::parse(value["session"]["code"].as_str().unwrap()).unwrap()
    }

    async fn join(&self, code: &SessionCode, name: &str, suspect: &str) -> Enrollment {
        let value = self
            .post(
                &format!("/sessions/{code}/join"),
                json!({ "name": name, "suspectId": suspect }),
            )
            .await;
        serde_json::from_value(value).unwrap()
    }

    async fn act(&self, who: &Enrollment, payload: Value) {
        self.post(
            &format!("/players/{}/actions", who.player.id.0),
            json!({
                "reconnectToken": who.reconnect_token,
                "type": "turn_action",
                "payload": payload,
            }),
        )
        .await;
    }

    async fn connect(&self, code: &SessionCode) -> LiveConnection {
        LiveConnection::connect(&self.base, code).await.unwrap()
    }
}

async fn next(conn: &mut LiveConnection) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("timed out waiting for a frame")
        .unwrap()
        .expect("socket closed")
}

/// A lobby with Ada (plum) and Bert (mustard) and a started game:
/// events 1 (start) and 2 (reveal).
async fn started(server: &TestServer) -> (SessionCode, Enrollment) {
    let code = server.create().await;
    let ada = server.join(&code, "Ada", "plum").await;
    server.join(&code, "Bert", "mustard").await;
    server.act(&ada, json!({ "action": "start_game" })).await;
    server
        .act(&ada, json!({ "action": "reveal_clue", "clueIndex": 0 }))
        .await;
    (code, ada)
}

fn event_id(msg: &ServerMessage) -> EventId {
    match msg {
        ServerMessage::Event { event } => event.id,
        other => panic!("expected an event frame, got {other:?}"),
    }
}

// =========================================================================
// Connect and resume
// =========================================================================

#[tokio::test]
async fn test_connect_sends_snapshot_first() {
    let server = serve().await;
    let code = server.create().await;
    server.join(&code, "Ada", "plum").await;

    let mut conn = server.connect(&code).await;
    match next(&mut conn).await {
        ServerMessage::Session { session, players } => {
            assert_eq!(session.code, code);
            assert_eq!(players.len(), 1);
        }
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resume_after_k_sends_later_events_in_order() {
    let server = serve().await;
    let (code, ada) = started(&server).await;
    server
        .act(&ada, json!({ "action": "reveal_clue", "clueIndex": 1 }))
        .await;

    let mut conn = server.connect(&code).await;
    next(&mut conn).await;
    conn.send(&ClientMessage::Resume {
        last_event_id: Some(EventId(1)),
    })
    .await
    .unwrap();

    assert_eq!(event_id(&next(&mut conn).await), EventId(2));
    assert_eq!(event_id(&next(&mut conn).await), EventId(3));
}

#[tokio::test]
async fn test_resume_without_id_sends_nothing() {
    let server = serve().await;
    let (code, _) = started(&server).await;

    let mut conn = server.connect(&code).await;
    next(&mut conn).await;
    conn.send(&ClientMessage::Resume { last_event_id: None })
        .await
        .unwrap();

    // The next frame is the one the host triggers, not a replay.
    server
        .post(
            &format!("/sessions/{code}/notes-availability"),
            json!({ "available": true }),
        )
        .await;
    match next(&mut conn).await {
        ServerMessage::Session { session, .. } => assert!(session.notes_available),
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_action_broadcasts_event_then_snapshot() {
    let server = serve().await;
    let code = server.create().await;
    let ada = server.join(&code, "Ada", "plum").await;
    server.join(&code, "Bert", "mustard").await;

    let mut conn = server.connect(&code).await;
    next(&mut conn).await;
    conn.send(&ClientMessage::Resume { last_event_id: None })
        .await
        .unwrap();

    // The resume and the action race; the event waits for the resume, so
    // it may land on either side of the snapshot.
    server.act(&ada, json!({ "action": "start_game" })).await;
    let mut events = Vec::new();
    let mut statuses = Vec::new();
    for _ in 0..2 {
        match next(&mut conn).await {
            ServerMessage::Event { event } => events.push(event.id),
            ServerMessage::Session { session, .. } => statuses.push(session.status),
            other => panic!("unexpected frame {other:?}"),
        }
    }
    assert_eq!(events, vec![EventId(1)]);
    assert_eq!(statuses, vec![SessionStatus::Active]);
}

#[tokio::test]
async fn test_fresh_view_of_active_game_backfills_log() {
    let server = serve().await;
    let (code, ada) = started(&server).await;

    let mut view = SessionView::new(MemoryIdentityStore::new()).unwrap();
    view.remember(Identity {
        code: code.clone(),
        player_id: ada.player.id,
        reconnect_token: ada.reconnect_token.clone(),
    })
    .unwrap();

    let mut conn = server.connect(&code).await;
    assert_eq!(view.apply(next(&mut conn).await).unwrap(), ViewUpdate::Snapshot);
    let resume = view.resume_message();
    assert_eq!(
        resume,
        ClientMessage::Resume {
            last_event_id: Some(EventId(0))
        }
    );
    conn.send(&resume).await.unwrap();

    assert_eq!(view.apply(next(&mut conn).await).unwrap(), ViewUpdate::Event(EventId(1)));
    assert_eq!(view.apply(next(&mut conn).await).unwrap(), ViewUpdate::Event(EventId(2)));
    assert!(view.is_my_turn());
    assert_eq!(view.current_suspect(), Some(&SuspectId::new("plum")));
}

#[tokio::test]
async fn test_bad_frame_gets_bad_message_error() {
    let server = serve().await;
    let code = server.create().await;

    let url = format!("{}/sessions/{code}/live", server.base);
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    ws.next().await.unwrap().unwrap(); // snapshot
    ws.send(Message::Text("{\"type\":\"subscribe\"}".into()))
        .await
        .unwrap();

    let frame = ws.next().await.unwrap().unwrap();
    let msg: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert!(matches!(
        msg,
        ServerMessage::Error {
            code: LiveErrorCode::BadMessage,
            ..
        }
    ));
}

// =========================================================================
// Closed and unknown sessions
// =========================================================================

#[tokio::test]
async fn test_connect_unknown_code_is_not_found_error() {
    let server = serve().await;
    let mut conn = server.connect(&SessionCode::parse("ZZZZ").unwrap()).await;
    assert!(matches!(
        next(&mut conn).await,
        ServerMessage::Error {
            code: LiveErrorCode::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn test_connect_closed_session_is_session_closed_error() {
    let server = serve().await;
    let code = server.create().await;
    server.post(&format!("/sessions/{code}/close"), json!({})).await;

    let mut conn = server.connect(&code).await;
    assert!(matches!(
        next(&mut conn).await,
        ServerMessage::Error {
            code: LiveErrorCode::SessionClosed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_close_pushes_closed_snapshot_and_clients_forget_identity() {
    let server = serve().await;
    let code = server.create().await;
    let ada = server.join(&code, "Ada", "plum").await;

    let mut view = SessionView::new(MemoryIdentityStore::new()).unwrap();
    view.remember(Identity {
        code: code.clone(),
        player_id: ada.player.id,
        reconnect_token: ada.reconnect_token.clone(),
    })
    .unwrap();

    let mut conn = server.connect(&code).await;
    assert_eq!(view.apply(next(&mut conn).await).unwrap(), ViewUpdate::Snapshot);

    server.post(&format!("/sessions/{code}/close"), json!({})).await;
    assert_eq!(view.apply(next(&mut conn).await).unwrap(), ViewUpdate::Closed);
    assert!(view.identity().is_none());

    // Nothing more is said on a closed session.
    let rest = tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .unwrap();
    assert!(matches!(rest, Ok(None) | Err(_)));
}

// =========================================================================
// Builder
// =========================================================================

#[tokio::test]
async fn test_builder_serves_live_endpoint() {
    let store: SharedStore = Arc::new(SqliteStore::open_in_memory().unwrap());
    let session = store.create_session(None).unwrap();

    let server = CasefileServer::builder()
        .bind("127.0.0.1:0")
        .store(store)
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut conn = LiveConnection::connect(&format!("ws://{addr}"), &session.code)
        .await
        .unwrap();
    match next(&mut conn).await {
        ServerMessage::Session { session: got, .. } => assert_eq!(got.id, session.id),
        other => panic!("expected a snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_builder_reopens_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casefile.db");
    let session = {
        let store = SqliteStore::open(&path).unwrap();
        store.create_session(None).unwrap()
    };

    let server = CasefileServer::builder()
        .bind("127.0.0.1:0")
        .database(&path)
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut conn = LiveConnection::connect(&format!("ws://{addr}"), &session.code)
        .await
        .unwrap();
    match next(&mut conn).await {
        ServerMessage::Session { session: got, .. } => {
            assert_eq!(got.code, session.code);
            assert_eq!(got.status, SessionStatus::Lobby);
        }
        other => panic!("expected a snapshot, got {other:?}"),
    }
}
