use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use inkwire_shared::{
    decode_client_frame, encode_frame, ClientMessage, ServerMessage, MAX_CLIENT_FRAME_BYTES,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::logic::{connect_peer, disconnect_peer, handle_client_message};
use crate::state::{now_millis, AppState};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary frame: {0}")]
    Binary(#[from] bincode::error::DecodeError),
}

pub fn decode_text(text: &str) -> Result<ClientMessage, FrameError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_binary(data: &[u8]) -> Result<ClientMessage, FrameError> {
    Ok(decode_client_frame(data)?)
}

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.max_message_size(MAX_CLIENT_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let connection_id = Uuid::new_v4();

    {
        let mut canvas = state.canvas.lock().await;
        let user = connect_peer(&mut canvas, connection_id, tx, now_millis());
        info!(
            conn = %connection_id,
            name = %user.name,
            peers = canvas.peers.len(),
            history = canvas.log.len(),
            "connected"
        );
    }

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match encode_frame(&message) {
                Ok(payload) => {
                    if socket_sender.send(Message::Binary(payload)).await.is_err() {
                        return;
                    }
                }
                Err(error) => warn!(kind = message.kind(), %error, "failed to encode frame"),
            }
        }
        // The peer table dropped our sender: either we left or the server is
        // shutting down. Say goodbye properly in the second case.
        let _ = socket_sender.send(Message::Close(None)).await;
    });

    let mut close_frame = None;

    while let Some(Ok(message)) = socket_receiver.next().await {
        let parsed = match message {
            Message::Text(text) => decode_text(&text),
            Message::Binary(data) => decode_binary(&data),
            Message::Close(frame) => {
                close_frame = frame;
                break;
            }
            _ => continue,
        };
        match parsed {
            Ok(client_message) => {
                let mut canvas = state.canvas.lock().await;
                handle_client_message(&mut canvas, connection_id, client_message, now_millis());
            }
            Err(error) => debug!(conn = %connection_id, %error, "dropping frame"),
        }
    }

    {
        let mut canvas = state.canvas.lock().await;
        disconnect_peer(&mut canvas, connection_id);
        info!(conn = %connection_id, peers = canvas.peers.len(), "disconnected");
        if let Some(frame) = &close_frame {
            debug!(
                conn = %connection_id,
                code = frame.code,
                reason = %frame.reason,
                "close frame"
            );
        }
    }
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use inkwire_shared::{Operation, Point, Tool};

    use super::*;

    #[test]
    fn text_and_binary_frames_decode_to_the_same_message() {
        let message = ClientMessage::Stroke {
            operation: Operation::stroke("s", Tool::Brush, "#abc", 2.0, vec![Point::new(1.0, 1.0)]),
        };
        let text = serde_json::to_string(&message).unwrap();
        let binary = encode_frame(&message).unwrap();
        assert_eq!(decode_text(&text).unwrap(), message);
        assert_eq!(decode_binary(&binary).unwrap(), message);
    }

    #[test]
    fn garbage_frames_are_reported_not_panicked_on() {
        assert!(matches!(decode_text("{\"type\":\"paint\"}"), Err(FrameError::Json(_))));
        assert!(matches!(decode_binary(&[0xff, 0xff, 0xff]), Err(FrameError::Binary(_))));
    }

    #[test]
    fn oversized_length_prefix_is_a_decode_error() {
        let mut frame = vec![0u8, 0xFD];
        frame.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode_binary(&frame), Err(FrameError::Binary(_))));
    }
}
