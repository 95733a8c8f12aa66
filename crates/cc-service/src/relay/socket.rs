//! WebSocket endpoint for signaling.
//!
//! Each connection gets an unbounded outbound queue drained by its own
//! writer task; the read loop only ever pushes into queues. A connection
//! belongs to at most one room for its lifetime; repeated `join` frames
//! after the first are ignored.

use crate::models::SignalEnvelope;
use crate::observability::metrics;
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// `GET /ws/signaling` upgrade handler.
pub async fn signaling_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Room key this connection joined, if any.
    let mut joined: Option<String> = None;

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by axum; binary and pong frames carry no
            // signaling.
            _ => continue,
        };

        let Ok(envelope) = serde_json::from_str::<SignalEnvelope>(&text) else {
            debug!(
                target: "cc.relay",
                conn_id = %conn_id,
                "Dropping unparseable signaling frame"
            );
            continue;
        };

        match envelope.kind.as_str() {
            "join" => {
                metrics::record_relay_message("join");
                if joined.is_some() {
                    debug!(
                        target: "cc.relay",
                        conn_id = %conn_id,
                        "Ignoring repeated join on the same connection"
                    );
                    continue;
                }

                let session_id = envelope.session_id.clone();
                let count = state
                    .relay
                    .join(&session_id, conn_id, tx.clone())
                    .await;
                joined = Some(session_id.clone());

                let ack = json!({"type": "ack", "sessionId": session_id}).to_string();
                let _ = tx.send(ack);

                let announce =
                    json!({"type": "joined", "sessionId": session_id}).to_string();
                state
                    .relay
                    .broadcast_except(&session_id, conn_id, &announce)
                    .await;

                // First peer in the room means the call is ringing; the
                // second means both ends are present.
                match count {
                    1 => state.sessions.mark_waiting_peers(&session_id).await,
                    2 => state.sessions.mark_connected(&session_id).await,
                    _ => {}
                }
            }
            "offer" | "answer" | "ice" => {
                metrics::record_relay_message(&envelope.kind);
                if let Some(room) = joined.as_deref() {
                    // Forward the original frame verbatim; payloads are
                    // opaque to the relay.
                    state.relay.broadcast_except(room, conn_id, &text).await;
                } else {
                    debug!(
                        target: "cc.relay",
                        conn_id = %conn_id,
                        kind = envelope.kind,
                        "Dropping signaling frame from peer that never joined"
                    );
                }
            }
            other => {
                metrics::record_relay_message(other);
                debug!(
                    target: "cc.relay",
                    conn_id = %conn_id,
                    kind = other,
                    "Dropping signaling frame of unknown type"
                );
            }
        }
    }

    if let Some(room) = joined {
        if let Some(remaining) = state.relay.leave(&room, conn_id).await {
            if remaining > 0 {
                let left = json!({"type": "left", "sessionId": room}).to_string();
                state.relay.broadcast_except(&room, conn_id, &left).await;
            }
        }
    }

    // Dropping the sender lets the writer flush queued frames and exit.
    drop(tx);
    let _ = writer.await;
}
