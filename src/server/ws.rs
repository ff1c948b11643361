//! The live interview WebSocket.
//!
//! One connection drives one interview. Incoming frames are parsed into
//! [`ClientMessage`]s; a dedicated writer task serializes everything going
//! the other way, so turn tasks and the reader loop never contend for the
//! socket.

use crate::server::AppState;
use crate::session::protocol::{AudioMarker, ClientMessage, ServerMessage};
use crate::session::turn::run_turn;
use crate::session::{Outbound, SessionState};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(interview_id): Path<i64>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, interview_id))
}

/// Frames for one outbound item. Audio expands into a JSON marker followed
/// by the binary payload; clients pair the two by arrival order.
fn frames(item: Outbound) -> Vec<Message> {
    match item {
        Outbound::Message(message) => match message.to_json() {
            Ok(json) => vec![Message::Text(json.into())],
            Err(e) => {
                warn!(error = %e, "dropping unserializable frame");
                Vec::new()
            }
        },
        Outbound::Audio(chunk) => {
            let marker = ServerMessage::Audio {
                data: AudioMarker {
                    seq: chunk.seq,
                    encoding: chunk.encoding,
                },
            };
            match marker.to_json() {
                Ok(json) => vec![Message::Text(json.into()), Message::Binary(chunk.data.into())],
                Err(e) => {
                    warn!(error = %e, "dropping unserializable audio marker");
                    Vec::new()
                }
            }
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, interview_id: i64) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

    let writer = tokio::spawn(async move {
        while let Some(item) = out_rx.recv().await {
            for frame in frames(item) {
                if ws_tx.send(frame).await.is_err() {
                    return;
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    // The interview must exist before any dialogue happens on it.
    let settings = match state.engine.get_interview(interview_id).await {
        Ok(interview) => state.settings_for(interview.user_id).await,
        Err(e) => {
            let _ = out_tx.send(Outbound::Message(ServerMessage::error(e.to_string())));
            drop(out_tx);
            let _ = writer.await;
            return;
        }
    };

    info!(interview_id, "session connected");
    let _ = out_tx.send(Outbound::Message(ServerMessage::status("connected")));

    let mut session = SessionState::new();
    let mut active_turn: Option<JoinHandle<crate::session::turn::TurnEnd>> = None;

    while let Some(result) = ws_rx.next().await {
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                debug!(interview_id, error = %e, "socket receive error");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                let message = match ClientMessage::parse(text.as_str()) {
                    Ok(message) => message,
                    Err(e) => {
                        let _ = out_tx.send(Outbound::Message(ServerMessage::error(e.as_reply())));
                        continue;
                    }
                };

                match message {
                    ClientMessage::Text { data } => {
                        // A finished turn task means the session is idle
                        // again, even before the handle was reaped.
                        if active_turn.as_ref().is_some_and(JoinHandle::is_finished) {
                            active_turn = None;
                            session.finish_turn();
                        }
                        if let Err(refusal) = session.begin_turn() {
                            let _ = out_tx
                                .send(Outbound::Message(ServerMessage::error(refusal.as_reply())));
                            continue;
                        }
                        active_turn = Some(tokio::spawn(run_turn(
                            state.engine.clone(),
                            interview_id,
                            settings.clone(),
                            data,
                            out_tx.clone(),
                        )));
                    }
                    ClientMessage::End => {
                        if let Some(turn) = active_turn.take() {
                            turn.abort();
                        }
                        session.end();
                        let _ =
                            out_tx.send(Outbound::Message(ServerMessage::status("evaluating")));
                        match state.engine.end_interview(interview_id, &settings).await {
                            Ok(evaluation) => {
                                let _ = out_tx
                                    .send(Outbound::Message(ServerMessage::evaluation(&evaluation)));
                            }
                            Err(e) => {
                                let _ = out_tx
                                    .send(Outbound::Message(ServerMessage::error(e.to_string())));
                            }
                        }
                        break;
                    }
                    ClientMessage::Ping => {
                        let _ = out_tx.send(Outbound::Message(ServerMessage::status("pong")));
                    }
                }
            }
            Message::Binary(_) => {
                let _ = out_tx.send(Outbound::Message(ServerMessage::error(
                    "unexpected binary frame",
                )));
            }
            Message::Close(_) => break,
            // Protocol pings are answered by the websocket layer itself.
            Message::Ping(_) | Message::Pong(_) => {}
        }

        if session.is_ended() {
            break;
        }
    }

    // Cancelling the turn handle drops its pipeline and vendor streams.
    if let Some(turn) = active_turn.take() {
        turn.abort();
    }
    drop(out_tx);
    let _ = writer.await;
    info!(interview_id, "session closed");
}
