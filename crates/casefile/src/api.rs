//! REST handlers: session lifecycle, player identity and the host control
//! plane.
//!
//! Handlers are thin. They parse, call one layer crate, and answer with the
//! resulting snapshot. Anything that changes what connected screens show is
//! followed by a snapshot broadcast on the session's hub.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use casefile_hub::Broadcast;
use casefile_protocol::{
    AccusationResult, Eliminations, Event, EventId, GameAction, Interruption,
    Player, PlayerId, Session, SessionCode, SessionSnapshot, SessionStatus,
    Solution, SuspectId, TurnAction,
};
use casefile_session::Enrollment;
use casefile_store::{PlayerUpdate, SharedStore, StoreError};
use casefile_turn::{SOLVED_COUNT, TurnState};
use serde::{Deserialize, Serialize};

use crate::actions::{Recorded, record};
use crate::{AppState, CasefileError};

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CreateSessionRequest {
    #[serde(default)]
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinRequest {
    name: String,
    suspect_id: SuspectId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReconnectRequest {
    reconnect_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdatePlayerRequest {
    reconnect_token: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    eliminations: Option<Eliminations>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TurnRequest {
    #[serde(default)]
    current_turn_suspect_id: Option<SuspectId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotesAvailabilityRequest {
    available: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InterruptionRequest {
    #[serde(default)]
    interruption: Option<Interruption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InspectorNoteRequest {
    note_id: String,
    available: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsQuery {
    since: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlayerResponse {
    player: Player,
}

#[derive(Debug, Serialize)]
pub(crate) struct EventsResponse {
    events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A code that isn't well-formed can't name a session.
fn parse_code(raw: &str) -> Result<SessionCode, CasefileError> {
    SessionCode::parse(raw)
        .map_err(|_| CasefileError::NotFound(format!("session {raw}")))
}

fn snapshot(
    store: &SharedStore,
    session: Session,
) -> Result<SessionSnapshot, CasefileError> {
    let players = store.players(session.id)?;
    Ok(SessionSnapshot { session, players })
}

/// The live session for `code`, refusing closed ones.
fn open_session(
    store: &SharedStore,
    code: &SessionCode,
) -> Result<Session, CasefileError> {
    let session = store.session_by_code(code)?;
    if session.status.is_closed() {
        return Err(StoreError::SessionClosed(session.id).into());
    }
    Ok(session)
}

/// Runs one host mutation against an open session, then pushes the new
/// snapshot to every screen.
async fn host_update<F>(
    state: &AppState,
    raw_code: &str,
    update: F,
) -> Result<Json<SessionSnapshot>, CasefileError>
where
    F: FnOnce(&SharedStore, &Session) -> Result<Session, CasefileError>
        + Send
        + 'static,
{
    let code = parse_code(raw_code)?;
    let lookup = code.clone();
    let snapshot = state
        .blocking(move |state| {
            let session = open_session(&state.store, &lookup)?;
            let session = update(&state.store, &session)?;
            snapshot(&state.store, session)
        })
        .await?;
    state.hubs.broadcast(&code, Broadcast::Snapshot).await;
    Ok(Json(snapshot))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// `POST /sessions`. The body is optional; an empty one creates a session
/// without a solution.
pub(crate) async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionSnapshot>), CasefileError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| CasefileError::InvalidPayload(e.to_string()))?
    };

    let with_solution = request.solution.is_some();
    let session = state
        .blocking(move |state| {
            Ok(state.store.create_session(request.solution.as_ref())?)
        })
        .await?;
    tracing::info!(
        code = %session.code,
        session_id = %session.id,
        with_solution,
        "session created"
    );
    Ok((
        StatusCode::CREATED,
        Json(SessionSnapshot {
            session,
            players: Vec::new(),
        }),
    ))
}

/// `GET /sessions/{code}`. Closed sessions are returned too, so clients can
/// see that theirs ended.
pub(crate) async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let code = parse_code(&code)?;
    let snapshot = state
        .blocking(move |state| {
            let session = state.store.session_by_code(&code)?;
            snapshot(&state.store, session)
        })
        .await?;
    Ok(Json(snapshot))
}

pub(crate) async fn join_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Enrollment>), CasefileError> {
    let code = parse_code(&code)?;
    let Json(request) = body?;
    let lookup = code.clone();
    let enrollment = state
        .blocking(move |state| {
            Ok(state
                .sessions
                .enroll(&lookup, &request.name, &request.suspect_id)?)
        })
        .await?;
    state.hubs.broadcast(&code, Broadcast::Snapshot).await;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub(crate) async fn reconnect(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<ReconnectRequest>, JsonRejection>,
) -> Result<Json<Enrollment>, CasefileError> {
    let code = parse_code(&code)?;
    let Json(request) = body?;
    let enrollment = state
        .blocking(move |state| {
            Ok(state.sessions.reconnect(&code, &request.reconnect_token)?)
        })
        .await?;
    Ok(Json(enrollment))
}

/// `GET /sessions/{code}/events?since=<id>`, the polling fallback for
/// clients whose live connection keeps dropping.
pub(crate) async fn list_events(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, CasefileError> {
    let code = parse_code(&code)?;
    let Query(query) = query?;
    let events = state
        .blocking(move |state| {
            let session = state.store.session_by_code(&code)?;
            Ok(state
                .store
                .list_events(session.id, query.since.map(EventId))?)
        })
        .await?;
    Ok(Json(EventsResponse { events }))
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// `PATCH /players/{id}`: private notes and the elimination grid.
pub(crate) async fn update_player(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdatePlayerRequest>, JsonRejection>,
) -> Result<Json<PlayerResponse>, CasefileError> {
    let Path(id) = path?;
    let Json(request) = body?;

    let (code, player) = state
        .blocking(move |state| {
            let player = state
                .sessions
                .authenticate(PlayerId(id), &request.reconnect_token)?;
            let session = state.store.session(player.session_id)?;
            if session.status.is_closed() {
                return Err(StoreError::SessionClosed(session.id).into());
            }

            let player = state.store.update_player(
                player.id,
                PlayerUpdate {
                    notes: request.notes,
                    eliminations: request.eliminations,
                },
            )?;
            Ok((session.code, player))
        })
        .await?;
    state.hubs.broadcast(&code, Broadcast::Snapshot).await;
    Ok(Json(PlayerResponse { player }))
}

// ---------------------------------------------------------------------------
// Host control plane
// ---------------------------------------------------------------------------

/// Overrides the turn pointer. The suspect must belong to a player of
/// the session.
///
/// Once the game is under way the override is written to the log as a
/// `set_turn` event for the player receiving the turn, so every device
/// folds it at the same point. In the lobby only the pointer is set.
pub(crate) async fn set_turn(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let Json(request) = body?;
    let code = parse_code(&code)?;
    let lookup = code.clone();
    let (snapshot, recorded) = state
        .blocking(move |state| {
            let session = open_session(&state.store, &lookup)?;
            let recorded = match request.current_turn_suspect_id {
                Some(suspect) => hand_turn(state, &session, suspect)?,
                None => {
                    state.store.update_session_turn(session.id, None)?;
                    None
                }
            };
            let session = state.store.session(session.id)?;
            Ok((snapshot(&state.store, session)?, recorded))
        })
        .await?;

    if recorded.is_some() {
        state.hubs.broadcast(&code, Broadcast::Events).await;
    }
    state.hubs.broadcast(&code, Broadcast::Snapshot).await;
    Ok(Json(snapshot))
}

fn hand_turn(
    state: &AppState,
    session: &Session,
    suspect: SuspectId,
) -> Result<Option<Recorded>, CasefileError> {
    let holder = state
        .store
        .players(session.id)?
        .into_iter()
        .find(|p| p.suspect_id == suspect)
        .ok_or_else(|| {
            CasefileError::InvalidPayload(format!("no player plays {suspect}"))
        })?;

    if session.status != SessionStatus::Active {
        state.store.update_session_turn(session.id, Some(&suspect))?;
        return Ok(None);
    }
    tracing::info!(code = %session.code, %suspect, "host handed over the turn");
    let action = GameAction::Turn(TurnAction::SetTurn { suspect_id: suspect });
    record(state, session.id, holder.id, action).map(Some)
}

/// Publishes the host's feedback for the last accusation.
pub(crate) async fn set_accusation_result(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<AccusationResult>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let Json(result) = body?;
    if result.correct_count > SOLVED_COUNT {
        return Err(CasefileError::InvalidPayload(format!(
            "correctCount must be at most {SOLVED_COUNT}"
        )));
    }
    host_update(&state, &code, move |store, session| {
        let player = store.player(result.player_id)?;
        if player.session_id != session.id {
            return Err(CasefileError::NotFound(format!(
                "player {} in session {}",
                result.player_id, session.code
            )));
        }
        Ok(store.update_session_accusation_result(session.id, Some(&result))?)
    })
    .await
}

pub(crate) async fn set_notes_availability(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<NotesAvailabilityRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let Json(request) = body?;
    host_update(&state, &code, move |store, session| {
        Ok(store.update_session_notes_availability(session.id, request.available)?)
    })
    .await
}

/// Shows (`{"interruption": {...}}`) or clears (`{"interruption": null}`)
/// the interruption on every screen.
pub(crate) async fn set_interruption(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<InterruptionRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let Json(request) = body?;
    host_update(&state, &code, move |store, session| {
        Ok(store.update_session_interruption(
            session.id,
            request.interruption.as_ref(),
        )?)
    })
    .await
}

pub(crate) async fn set_inspector_note(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<InspectorNoteRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let Json(request) = body?;
    let note_id = request.note_id.trim().to_string();
    if note_id.is_empty() {
        return Err(CasefileError::InvalidPayload(
            "noteId must not be empty".into(),
        ));
    }
    host_update(&state, &code, move |store, session| {
        Ok(store.update_session_inspector_note(
            session.id,
            &note_id,
            request.available,
        )?)
    })
    .await
}

/// Ends the session for everyone. Closing twice is fine.
pub(crate) async fn close_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSnapshot>, CasefileError> {
    let code = parse_code(&code)?;
    let lookup = code.clone();
    let (snapshot, outcome) = state
        .blocking(move |state| {
            let session = state.store.session_by_code(&lookup)?;
            let session = state.store.close_session(session.id)?;

            let mut outcome =
                TurnState::fold(&state.store.list_events(session.id, None)?)?;
            outcome.close();
            Ok((snapshot(&state.store, session)?, outcome.phase()))
        })
        .await?;
    tracing::info!(
        %code,
        session_id = %snapshot.session.id,
        phase = ?outcome,
        "session closed"
    );

    state.hubs.broadcast(&code, Broadcast::Snapshot).await;
    Ok(Json(snapshot))
}
