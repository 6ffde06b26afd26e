//! WebSocket boundary to the presentation layer.
//!
//! The browser renders snapshots and sends back UI intents plus the events
//! of its speech recognizer; the session engine runs entirely server-side.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::machine::SessionEvent;
use crate::session::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        snapshot: state.snapshot().await,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    // A client joining mid-question missed every broadcast grammar update,
    // so its recognizer state is synced explicitly on connect.
    for msg in state.voice_hello() {
        if let Ok(json) = serde_json::to_string(&msg) {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }

    let mut broadcast_rx = state.subscribe();

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                if let Ok(msg) = broadcast_msg {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_message(client_msg, &state).await,
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed");
}

/// Translate a client message into a session event and dispatch it.
/// Responses travel exclusively through the snapshot broadcast.
async fn handle_message(msg: ClientMessage, state: &Arc<AppState>) {
    let generation = state.generation();

    match msg {
        ClientMessage::SelectAnswer {
            question_index,
            answer_id,
        } => {
            state
                .dispatch(
                    generation,
                    SessionEvent::SelectAnswer {
                        question_index,
                        answer_id,
                    },
                )
                .await
        }
        ClientMessage::RequestOptions => {
            state
                .dispatch(
                    generation,
                    SessionEvent::Command(crate::voice::CommandIntent::ShowOptions),
                )
                .await
        }
        ClientMessage::Reset => state.dispatch(generation, SessionEvent::Reset).await,
        ClientMessage::VoiceStarted => {
            state.dispatch(generation, SessionEvent::CaptureStarted).await
        }
        ClientMessage::VoicePermissionBlocked => {
            state
                .dispatch(generation, SessionEvent::PermissionBlocked)
                .await
        }
        ClientMessage::VoicePermissionDenied => {
            state
                .dispatch(generation, SessionEvent::PermissionDenied)
                .await
        }
        ClientMessage::VoiceCommand { phrase } => {
            state.handle_voice_phrase(generation, &phrase).await
        }
        ClientMessage::VoiceNoMatch {
            question_index,
            transcripts,
        } => {
            state
                .dispatch(
                    generation,
                    SessionEvent::TranscriptNoMatch {
                        question_index,
                        transcripts,
                    },
                )
                .await
        }
    }
}
