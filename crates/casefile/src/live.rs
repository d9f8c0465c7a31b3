//! `GET /sessions/{code}/live`: the real-time channel.
//!
//! One socket is one hub connection. A writer task drains the
//! connection's queue into the socket; a reader task turns `resume`
//! frames into hub calls. Whichever finishes first takes the other down,
//! then the connection is removed from the hub.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use casefile_hub::HubError;
use casefile_protocol::{
    ClientMessage, Codec, JsonCodec, LiveErrorCode, ServerMessage, SessionCode,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::AppState;

pub(crate) async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, code))
}

async fn handle_socket(socket: WebSocket, state: AppState, raw_code: String) {
    let codec = JsonCodec;
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connected = match SessionCode::parse(&raw_code) {
        Ok(code) => state
            .hubs
            .connect(&code, tx.clone())
            .await
            .map_err(|e| error_frame(&e)),
        Err(_) => Err(ServerMessage::error(
            LiveErrorCode::NotFound,
            format!("session {raw_code} not found"),
        )),
    };
    let (conn, hub) = match connected {
        Ok(connected) => connected,
        Err(frame) => {
            tracing::debug!(code = %raw_code, ?frame, "live connection refused");
            if let Ok(text) = codec.encode(&frame) {
                let _ = sink.send(Message::Text(text.into())).await;
            }
            let _ = sink.close().await;
            return;
        }
    };
    tracing::debug!(%conn, code = %hub.code(), "live connection opened");

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match codec.encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "dropping unencodable frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
            if ends_connection(&msg) {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                // Pings are answered by axum; binary frames carry nothing for us.
                _ => continue,
            };
            let reply = match codec.decode::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::Resume { last_event_id }) => {
                    match reader_hub.resume(conn, last_event_id).await {
                        Ok(sent) => {
                            tracing::trace!(%conn, ?last_event_id, sent, "resumed");
                            None
                        }
                        Err(e) => Some(error_frame(&e)),
                    }
                }
                Err(e) => Some(ServerMessage::error(
                    LiveErrorCode::BadMessage,
                    e.to_string(),
                )),
            };
            if let Some(frame) = reply {
                if tx.send(frame).is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    hub.disconnect(conn).await;
    tracing::debug!(%conn, code = %hub.code(), "live connection closed");
}

fn error_frame(err: &HubError) -> ServerMessage {
    let code = match err {
        HubError::NotFound(_) => LiveErrorCode::NotFound,
        HubError::SessionClosed(_) => LiveErrorCode::SessionClosed,
        HubError::Unavailable(_) | HubError::Store(_) => {
            tracing::warn!(error = %err, "live request failed");
            LiveErrorCode::Unavailable
        }
    };
    ServerMessage::error(code, err.to_string())
}

/// Frames after which there is nothing more to say on this socket.
fn ends_connection(msg: &ServerMessage) -> bool {
    match msg {
        ServerMessage::Session { session, .. } => session.status.is_closed(),
        ServerMessage::Error { code, .. } => {
            matches!(code, LiveErrorCode::SessionClosed | LiveErrorCode::NotFound)
        }
        ServerMessage::Event { .. } => false,
    }
}
