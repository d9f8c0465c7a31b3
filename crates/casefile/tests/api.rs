//! REST endpoints driven through the router, against an in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use casefile::{AppState, ServerConfig, router};
use casefile_protocol::{
    Event, EventKind, GameAction, PlayerId, SessionSnapshot, SessionStatus,
    SuspectId, TurnAction,
};
use casefile_session::Enrollment;
use casefile_store::{SharedStore, SqliteStore};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

// =========================================================================
// Helpers
// =========================================================================

fn app() -> Router {
    let store: SharedStore = Arc::new(SqliteStore::open_in_memory().unwrap());
    router(AppState::new(store, &ServerConfig::default()))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(body)).await
}

fn solution() -> Value {
    json!({
        "suspect": "white",
        "item": "rope",
        "location": "library",
        "time": "midnight",
    })
}

async fn create(app: &Router, body: Option<Value>) -> SessionSnapshot {
    let (status, value) = call(app, Method::POST, "/sessions", body).await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    serde_json::from_value(value).unwrap()
}

async fn join(app: &Router, code: &str, name: &str, suspect: &str) -> Enrollment {
    let (status, value) = post(
        app,
        &format!("/sessions/{code}/join"),
        json!({ "name": name, "suspectId": suspect }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    serde_json::from_value(value).unwrap()
}

async fn act(
    app: &Router,
    who: &Enrollment,
    kind: &str,
    payload: Value,
) -> (StatusCode, Value) {
    post(
        app,
        &format!("/players/{}/actions", who.player.id.0),
        json!({
            "reconnectToken": who.reconnect_token,
            "type": kind,
            "payload": payload,
        }),
    )
    .await
}

async fn act_ok(app: &Router, who: &Enrollment, kind: &str, payload: Value) -> Event {
    let (status, value) = act(app, who, kind, payload).await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    serde_json::from_value(value["event"].clone()).unwrap()
}

async fn get_session(app: &Router, code: &str) -> SessionSnapshot {
    let (status, value) = call(app, Method::GET, &format!("/sessions/{code}"), None).await;
    assert_eq!(status, StatusCode::OK, "{value}");
    serde_json::from_value(value).unwrap()
}

async fn event_ids(app: &Router, uri: &str) -> Vec<i64> {
    let (status, value) = call(app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK, "{value}");
    let events: Vec<Event> = serde_json::from_value(value["events"].clone()).unwrap();
    events.iter().map(|e| e.id.0).collect()
}

/// A session with Ada (plum), Bert (mustard) and Cleo (white), in that
/// join order.
async fn three_players(app: &Router) -> (String, Enrollment, Enrollment, Enrollment) {
    let created = create(app, Some(json!({ "solution": solution() }))).await;
    let code = created.session.code.to_string();
    let ada = join(app, &code, "Ada", "plum").await;
    let bert = join(app, &code, "Bert", "mustard").await;
    let cleo = join(app, &code, "Cleo", "white").await;
    (code, ada, bert, cleo)
}

fn suspect(id: &str) -> Option<SuspectId> {
    Some(SuspectId::new(id))
}

// =========================================================================
// Sessions and joining
// =========================================================================

#[tokio::test]
async fn test_create_session_without_body_is_lobby() {
    let app = app();
    let created = create(&app, None).await;
    assert_eq!(created.session.status, SessionStatus::Lobby);
    assert!(created.players.is_empty());

    let fetched = get_session(&app, created.session.code.as_str()).await;
    assert_eq!(fetched.session.id, created.session.id);
}

#[tokio::test]
async fn test_create_session_malformed_body_is_400() {
    let app = app();
    let (status, value) = call(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({ "solution": "plum" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "invalid_payload");
}

#[tokio::test]
async fn test_get_session_unknown_code_is_404() {
    let app = app();
    let (status, value) = call(&app, Method::GET, "/sessions/ZZZZ", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"], "not_found");

    let (status, _) = call(&app, Method::GET, "/sessions/no!", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_claimed_suspect_is_409() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    join(&app, &code, "Ada", "plum").await;

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/join"),
        json!({ "name": "Bert", "suspectId": "plum" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(value["error"], "conflict");
}

#[tokio::test]
async fn test_join_unknown_suspect_is_400() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/join"),
        json!({ "name": "Ada", "suspectId": "the-butler" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_join_after_start_is_409() {
    let app = app();
    let (code, ada, _, _) = three_players(&app).await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/join"),
        json!({ "name": "Late", "suspectId": "green" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_join_lists_players_in_join_order() {
    let app = app();
    let (code, ada, bert, cleo) = three_players(&app).await;
    let snapshot = get_session(&app, &code).await;
    let ids: Vec<PlayerId> = snapshot.players.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![ada.player.id, bert.player.id, cleo.player.id]);
}

// =========================================================================
// Reconnect and player updates
// =========================================================================

#[tokio::test]
async fn test_reconnect_returns_same_identity() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let ada = join(&app, &code, "Ada", "plum").await;

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/reconnect"),
        json!({ "reconnectToken": ada.reconnect_token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    let again: Enrollment = serde_json::from_value(value).unwrap();
    assert_eq!(again.player.id, ada.player.id);
    assert_eq!(again.reconnect_token, ada.reconnect_token);
}

#[tokio::test]
async fn test_reconnect_unknown_token_is_404() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/reconnect"),
        json!({ "reconnectToken": "not-a-token" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reconnect_closed_session_is_410() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let ada = join(&app, &code, "Ada", "plum").await;
    let (status, _) = post(&app, &format!("/sessions/{code}/close"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/reconnect"),
        json!({ "reconnectToken": ada.reconnect_token }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(value["error"], "session_closed");
}

#[tokio::test]
async fn test_update_player_wrong_token_is_403() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let ada = join(&app, &code, "Ada", "plum").await;
    let bert = join(&app, &code, "Bert", "mustard").await;

    let (status, value) = call(
        &app,
        Method::PATCH,
        &format!("/players/{}", ada.player.id.0),
        Some(json!({ "reconnectToken": bert.reconnect_token, "notes": "mine" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(value["error"], "unauthorized");
}

#[tokio::test]
async fn test_update_player_saves_notes_and_eliminations() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let ada = join(&app, &code, "Ada", "plum").await;

    let (status, value) = call(
        &app,
        Method::PATCH,
        &format!("/players/{}", ada.player.id.0),
        Some(json!({
            "reconnectToken": ada.reconnect_token,
            "notes": "the butler lied",
            "eliminations": { "suspects": ["green"], "items": [], "locations": [], "times": [] },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["player"]["notes"], "the butler lied");

    // Omitted fields are left alone.
    let (status, value) = call(
        &app,
        Method::PATCH,
        &format!("/players/{}", ada.player.id.0),
        Some(json!({ "reconnectToken": ada.reconnect_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["player"]["notes"], "the butler lied");
}

#[tokio::test]
async fn test_update_player_non_numeric_id_is_404() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::PATCH,
        "/players/abc",
        Some(json!({ "reconnectToken": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =========================================================================
// Actions
// =========================================================================

#[tokio::test]
async fn test_full_three_player_game() {
    let app = app();
    let (code, ada, bert, cleo) = three_players(&app).await;

    // Nothing happens before the game starts.
    let (status, _) = act(&app, &ada, "turn_action", json!({ "action": "suggestion",
        "suspect": "plum", "item": "rope", "location": "hall", "time": "dawn" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let start = act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;
    let GameAction::Turn(TurnAction::StartGame { turn_order }) = start.action().unwrap() else {
        panic!("expected start_game, got {start:?}");
    };
    let order: Vec<PlayerId> = turn_order.iter().map(|s| s.player_id).collect();
    assert_eq!(order, vec![ada.player.id, bert.player.id, cleo.player.id]);

    let session = get_session(&app, &code).await.session;
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.current_turn_suspect_id, suspect("plum"));

    // Bert is out of turn.
    let (status, value) =
        act(&app, &bert, "turn_action", json!({ "action": "reveal_clue", "clueIndex": 0 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(value["error"], "illegal_turn_action");

    act_ok(&app, &ada, "turn_action", json!({ "action": "reveal_clue", "clueIndex": 0 })).await;
    let (status, _) =
        act(&app, &ada, "turn_action", json!({ "action": "reveal_clue", "clueIndex": 0 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // The passage draw is the server's, and only one per turn.
    let passage =
        act_ok(&app, &ada, "turn_action", json!({ "action": "secret_passage" })).await;
    assert!(passage.payload["passage"]["text"].is_string(), "{:?}", passage.payload);
    let (status, _) = act(&app, &ada, "turn_action", json!({ "action": "secret_passage" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    act_ok(&app, &ada, "turn_action", json!({ "action": "suggestion",
        "suspect": "plum", "item": "rope", "location": "hall", "time": "dawn" })).await;
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("mustard")
    );

    // A wrong accusation is graded by the server, whatever the phone claims.
    let wrong = act_ok(&app, &bert, "accusation", json!({
        "suspect": "white", "item": "rope", "location": "library", "time": "dawn",
        "correctCount": 4,
    }))
    .await;
    assert_eq!(wrong.kind, EventKind::Accusation);
    assert_eq!(wrong.payload["correctCount"], 3);
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("white")
    );

    let right = act_ok(&app, &cleo, "accusation", json!({
        "suspect": "White", "item": "rope", "location": "library", "time": "midnight",
    }))
    .await;
    assert_eq!(right.payload["correctCount"], 4);
    assert_eq!(get_session(&app, &code).await.session.current_turn_suspect_id, None);

    let (status, _) =
        act(&app, &ada, "turn_action", json!({ "action": "reveal_clue", "clueIndex": 1 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // The log is gapless and in storage order.
    let ids = event_ids(&app, &format!("/sessions/{code}/events")).await;
    assert_eq!(ids.len(), 6);
    assert!(ids.windows(2).all(|w| w[1] == w[0] + 1), "{ids:?}");
    let tail = event_ids(&app, &format!("/sessions/{code}/events?since={}", ids[3])).await;
    assert_eq!(tail, ids[4..].to_vec());
}

#[tokio::test]
async fn test_accusation_grades_wrong_then_right() {
    let app = app();
    let (code, ada, bert, _) = three_players(&app).await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    let all_wrong = json!({
        "suspect": "green", "item": "candlestick", "location": "hall", "time": "dawn",
    });
    let (status, _) = act(&app, &bert, "accusation", all_wrong.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let graded = act_ok(&app, &ada, "accusation", all_wrong).await;
    assert_eq!(graded.payload["correctCount"], 0);
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("mustard")
    );

    let solved = act_ok(&app, &bert, "accusation", solution()).await;
    assert_eq!(solved.payload["correctCount"], 4);

    // Solving happens once: nobody can accuse afterwards.
    let (status, _) = act(&app, &ada, "accusation", solution()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_action_wrong_token_is_403() {
    let app = app();
    let (_, ada, bert, _) = three_players(&app).await;
    let (status, _) = post(
        &app,
        &format!("/players/{}/actions", ada.player.id.0),
        json!({
            "reconnectToken": bert.reconnect_token,
            "type": "turn_action",
            "payload": { "action": "start_game" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_action_unknown_type_is_400() {
    let app = app();
    let (_, ada, _, _) = three_players(&app).await;
    let (status, _) = act(&app, &ada, "turn_action", json!({ "action": "teleport" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = act(&app, &ada, "confession", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_accusation_without_solution_is_400() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let ada = join(&app, &code, "Ada", "plum").await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    let (status, value) = act(&app, &ada, "accusation", json!({
        "suspect": "plum", "item": "rope", "location": "hall", "time": "dawn",
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(event_ids(&app, &format!("/sessions/{code}/events")).await.len(), 1);
}

#[tokio::test]
async fn test_inspector_note_needs_host_then_rereads_are_free() {
    let app = app();
    let (code, ada, _, _) = three_players(&app).await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    let read = json!({ "action": "read_inspector_note", "noteId": "inspector-1" });
    let (status, _) = act(&app, &ada, "turn_action", read.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/inspector-note"),
        json!({ "noteId": "inspector-1", "available": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");

    // The first read ends Ada's turn; reading it again later is allowed.
    act_ok(&app, &ada, "turn_action", read.clone()).await;
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("mustard")
    );
    act_ok(&app, &ada, "turn_action", read).await;
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("mustard")
    );
}

#[tokio::test]
async fn test_events_bad_since_is_400() {
    let app = app();
    let code = create(&app, None).await.session.code.to_string();
    let (status, _) =
        call(&app, Method::GET, &format!("/sessions/{code}/events?since=abc"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =========================================================================
// Host control plane
// =========================================================================

#[tokio::test]
async fn test_host_toggles_show_in_snapshot() {
    let app = app();
    let (code, ada, _, _) = three_players(&app).await;

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/notes-availability"),
        json!({ "available": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["session"]["notesAvailable"], true);
    assert_eq!(value["players"].as_array().map(Vec::len), Some(3));

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/interruption"),
        json!({ "interruption": { "id": "blackout", "kind": "timed", "message": "Lights out." } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["session"]["interruption"]["id"], "blackout");

    let (_, value) = post(
        &app,
        &format!("/sessions/{code}/interruption"),
        json!({ "interruption": null }),
    )
    .await;
    assert!(value["session"]["interruption"].is_null());

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/accusation-result"),
        json!({ "playerId": ada.player.id, "correctCount": 2, "feedback": "Warm." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["session"]["accusationResult"]["feedback"], "Warm.");

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/turn"),
        json!({ "currentTurnSuspectId": "white" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["session"]["currentTurnSuspectId"], "white");
}

#[tokio::test]
async fn test_host_rejects_bad_values() {
    let app = app();
    let (code, ada, _, _) = three_players(&app).await;

    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/accusation-result"),
        json!({ "playerId": ada.player.id, "correctCount": 5, "feedback": "?" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/accusation-result"),
        json!({ "playerId": 9999, "correctCount": 1, "feedback": "?" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/turn"),
        json!({ "currentTurnSuspectId": "green" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/inspector-note"),
        json!({ "noteId": "  ", "available": true }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_host_turn_override_moves_who_may_act() {
    let app = app();
    let (code, ada, bert, _) = three_players(&app).await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    let (status, value) = post(
        &app,
        &format!("/sessions/{code}/turn"),
        json!({ "currentTurnSuspectId": "mustard" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{value}");
    assert_eq!(value["session"]["currentTurnSuspectId"], "mustard");

    // Ada no longer holds the turn; the refusal names who does.
    let (status, value) =
        act(&app, &ada, "turn_action", json!({ "action": "reveal_clue", "clueIndex": 0 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        value["message"],
        format!("player {} acted out of turn (current: mustard)", ada.player.id)
    );

    act_ok(&app, &bert, "turn_action", json!({ "action": "suggestion",
        "suspect": "plum", "item": "rope", "location": "hall", "time": "dawn" })).await;
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("white")
    );

    // The override is in the log for every device to fold.
    let (_, value) = call(&app, Method::GET, &format!("/sessions/{code}/events"), None).await;
    let events: Vec<Event> = serde_json::from_value(value["events"].clone()).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].payload["action"], "set_turn");
    assert_eq!(events[1].player_id, bert.player.id);
}

#[tokio::test]
async fn test_player_cannot_submit_set_turn() {
    let app = app();
    let (code, ada, _, _) = three_players(&app).await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    let (status, value) =
        act(&app, &ada, "turn_action", json!({ "action": "set_turn", "suspectId": "white" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{value}");
    assert_eq!(
        get_session(&app, &code).await.session.current_turn_suspect_id,
        suspect("plum")
    );
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_writes() {
    let app = app();
    let (code, ada, _, _) = three_players(&app).await;
    act_ok(&app, &ada, "turn_action", json!({ "action": "start_game" })).await;

    for _ in 0..2 {
        let (status, value) = post(&app, &format!("/sessions/{code}/close"), json!({})).await;
        assert_eq!(status, StatusCode::OK, "{value}");
        assert_eq!(value["session"]["status"], "closed");
    }

    let (status, _) = post(
        &app,
        &format!("/sessions/{code}/notes-availability"),
        json!({ "available": true }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _) = act(&app, &ada, "turn_action", json!({ "action": "suggestion",
        "suspect": "plum", "item": "rope", "location": "hall", "time": "dawn" })).await;
    assert_eq!(status, StatusCode::GONE);

    // The closed session is still readable.
    assert_eq!(get_session(&app, &code).await.session.status, SessionStatus::Closed);
}
