use crate::broadcast::SignalPayload;
use crate::server::{Connection, RegisterError, SignalRelay};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;

use super::sending::write_outbound;

pub(super) async fn handle_socket(socket: WebSocket, relay: Arc<SignalRelay>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = relay.outbound_channel();

    let connection_id = match relay.on_open(Connection::new(tx, Some(addr))) {
        Ok(id) => id,
        Err(err) => {
            let code = match err {
                RegisterError::CapacityExceeded { .. } => close_code::AGAIN,
                RegisterError::AlreadyRegistered(_) => close_code::ERROR,
            };
            let frame = CloseFrame {
                code,
                reason: err.to_string().into(),
            };
            if let Err(send_err) = sender.send(Message::Close(Some(frame))).await {
                tracing::debug!(
                    client_addr = %addr,
                    error = %send_err,
                    "Failed to send rejection close frame"
                );
            }
            return;
        }
    };

    let mut send_task = tokio::spawn(write_outbound(sender, rx, relay.clone(), connection_id));

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        tracing::warn!(%connection_id, error = %err, "WebSocket error");
                        break;
                    }
                    None => break,
                };

                if let Message::Close(frame) = &message {
                    tracing::debug!(%connection_id, ?frame, "Client closed connection");
                    break;
                }

                if let Some(payload) = SignalPayload::from_message(message) {
                    relay.on_message(&connection_id, payload);
                }
            }
            // The writer only finishes on its own when the peer stopped accepting writes.
            _ = &mut send_task => {
                tracing::debug!(%connection_id, "Writer finished, closing connection");
                break;
            }
        }
    }

    // Removing the registry entry drops the last queue sender, so the writer
    // drains what is left and exits on its own.
    relay.on_close(&connection_id);
}
