//! WebSocket handler for real-time pose updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use fieldsight_core::PosePayload;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket message types
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    #[serde(rename = "pose")]
    Pose(PosePayload),
    #[serde(rename = "pong")]
    Pong,
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut pose_events = state.subscribe();

    info!("WebSocket client connected");

    loop {
        tokio::select! {
            // Forward pose updates to the client
            event = pose_events.recv() => {
                match event {
                    Ok(payload) => {
                        let msg = WsMessage::Pose(payload);
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // A slow client only misses intermediate poses
                        debug!(skipped = n, "Pose channel lagged");
                    }
                    Err(e) => {
                        debug!(error = %e, "Pose channel closed");
                        break;
                    }
                }
            }

            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Handle ping/pong for keepalive
                        if text.as_str() == "ping" {
                            let pong = serde_json::to_string(&WsMessage::Pong).unwrap();
                            if sender.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_message_envelope() {
        let msg = WsMessage::Pose(PosePayload::Point {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"pose","data":{"x":1.0,"y":2.0,"z":3.0}}"#);
    }

    #[test]
    fn test_pong_message_envelope() {
        let json = serde_json::to_string(&WsMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
