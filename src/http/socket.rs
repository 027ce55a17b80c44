use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use super::state::AppState;

/// GET /ws
/// Upgrade to a realtime interview connection
pub async fn realtime_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let gateway = state.gateway;
    let (connection_id, mut outbound) = gateway.connect().await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer: drain this connection's queue in order
    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to encode outbound event: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Reader: frames are handled one at a time so a connection's events keep their order
    let reader_gateway = gateway.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => reader_gateway.handle_text(connection_id, &text).await,
                Ok(Message::Binary(pcm)) => reader_gateway.handle_audio(connection_id, &pcm).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
            }
        }
    });

    let reason = tokio::select! {
        _ = &mut reader => { writer.abort(); "closed by client" }
        _ = &mut writer => { reader.abort(); "send failed" }
    };

    gateway.disconnect(connection_id, reason).await;
}
