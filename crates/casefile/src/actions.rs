//! `POST /players/{id}/actions`: the gameplay pipeline.
//!
//! authenticate → parse → fold log → check → fill server fields → append
//! with compare-and-set on the log head → broadcast.
//!
//! The append only succeeds if nobody else wrote since the fold. When
//! another device got there first the log is folded again and the check
//! re-run, so a second claim on the same turn is refused by the rules
//! rather than silently appended.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use casefile_hub::Broadcast;
use casefile_protocol::{
    Event, EventKind, GameAction, PlayerId, SessionCode, SessionId,
    SessionStatus, Solution, TurnAction, TurnSlot,
};
use casefile_store::{NewEvent, SessionEffects, StoreError};
use casefile_turn::{TurnError, TurnState, grade};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppState, CasefileError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActionRequest {
    reconnect_token: String,
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct EventResponse {
    event: Event,
}

/// What a successful append changed.
pub(crate) struct Recorded {
    pub(crate) event: Event,
    pub(crate) code: SessionCode,
    /// Status or turn pointer moved, so screens need a new snapshot.
    pub(crate) session_changed: bool,
}

impl Recorded {
    /// Pushes the new event, then the snapshot if the session moved.
    pub(crate) async fn broadcast(&self, state: &AppState) {
        state.hubs.broadcast(&self.code, Broadcast::Events).await;
        if self.session_changed {
            state.hubs.broadcast(&self.code, Broadcast::Snapshot).await;
        }
    }
}

pub(crate) async fn submit_action(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EventResponse>), CasefileError> {
    let Path(id) = path?;
    let Json(request) = body?;

    let recorded = state
        .blocking(move |state| {
            let player = state
                .sessions
                .authenticate(PlayerId(id), &request.reconnect_token)?;
            let action = GameAction::from_wire(request.kind, &request.payload)?;
            if action.is_host_only() {
                return Err(CasefileError::InvalidPayload(format!(
                    "{} is a host action",
                    action.name()
                )));
            }
            record(state, player.session_id, player.id, action)
        })
        .await?;

    recorded.broadcast(&state).await;
    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event: recorded.event,
        }),
    ))
}

/// Checks `action` against the folded log and appends it, retrying when
/// the head moved underneath. `player_id` is who the event is written
/// for: the submitter, or for a host turn override the player receiving
/// the turn.
///
/// Blocks on the store; call from [`AppState::blocking`].
pub(crate) fn record(
    state: &AppState,
    session_id: SessionId,
    player_id: PlayerId,
    mut action: GameAction,
) -> Result<Recorded, CasefileError> {
    let mut solution: Option<Solution> = None;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let session = state.store.session(session_id)?;
        if session.status.is_closed() {
            return Err(StoreError::SessionClosed(session_id).into());
        }
        let events = state.store.list_events(session_id, None)?;
        let head = events.last().map(|e| e.id);
        let turn = TurnState::fold(&events)?;

        // The server decides the turn order: players in join order.
        if let GameAction::Turn(TurnAction::StartGame { turn_order }) = &mut action {
            *turn_order = state
                .store
                .players(session_id)?
                .into_iter()
                .map(|p| TurnSlot {
                    player_id: p.id,
                    suspect_id: p.suspect_id,
                })
                .collect();
        }

        turn.check(player_id, &action, &state.rules, &session.inspector_notes)?;

        match &mut action {
            GameAction::Turn(TurnAction::SecretPassage { passage }) => {
                *passage = Some(state.passages.draw());
            }
            GameAction::Accuse(accusation) => {
                if solution.is_none() {
                    solution = Some(
                        state
                            .store
                            .solution(session_id)?
                            .ok_or(TurnError::NoSolution)?,
                    );
                }
                if let Some(solution) = &solution {
                    let count = grade(accusation, solution);
                    accusation.correct_count = Some(count);
                }
            }
            _ => {}
        }

        let mut next = turn.clone();
        next.apply(player_id, &action);

        let starts_game = action.is_start_game();
        let effects = SessionEffects {
            status: starts_game.then_some(SessionStatus::Active),
            current_turn_suspect_id: if next.is_over() {
                None
            } else {
                next.current_suspect().cloned()
            },
        };
        let session_changed = starts_game
            || effects.current_turn_suspect_id != session.current_turn_suspect_id;

        let new_event = NewEvent {
            session_id,
            player_id,
            kind: action.kind(),
            payload: action.to_payload()?,
        };
        match state.store.append_event(new_event, head, effects) {
            Ok(event) => {
                tracing::info!(
                    code = %session.code,
                    %player_id,
                    action = action.name(),
                    event_id = %event.id,
                    "action recorded"
                );
                return Ok(Recorded {
                    event,
                    code: session.code,
                    session_changed,
                });
            }
            Err(StoreError::StaleHead { expected, actual })
                if attempt < state.action_retry_limit =>
            {
                tracing::debug!(
                    %player_id,
                    attempt,
                    ?expected,
                    ?actual,
                    "log moved during action, folding again"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}
