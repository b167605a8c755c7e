use crate::server::SignalRelay;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

use super::connection::handle_socket;

/// WebSocket handler for the signaling route
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(relay): State<Arc<SignalRelay>>,
) -> Response {
    let max_message_size = relay.config().max_message_size;

    ws.max_message_size(max_message_size)
        .max_frame_size(max_message_size)
        .on_failed_upgrade(move |err| {
            tracing::warn!(client_addr = %addr, error = %err, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, relay, addr))
}
