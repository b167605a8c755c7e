use crate::broadcast::SignalPayload;
use crate::server::{ConnectionId, SignalRelay};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drain a connection's outbound queue into its socket.
///
/// Every write is bounded by `send_timeout_ms`. The first failed or timed-out
/// write ends the task, which makes the reader loop close the connection.
pub(super) async fn write_outbound(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<SignalPayload>,
    relay: Arc<SignalRelay>,
    connection_id: ConnectionId,
) {
    let send_timeout = relay.config().send_timeout();

    while let Some(payload) = rx.recv().await {
        match tokio::time::timeout(send_timeout, sender.send(payload.into_message())).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                relay.metrics().increment_send_errors();
                tracing::warn!(%connection_id, error = %err, "Failed to send signal, connection closed");
                break;
            }
            Err(_) => {
                relay.metrics().increment_send_timeouts();
                tracing::warn!(
                    %connection_id,
                    timeout_ms = relay.config().send_timeout_ms,
                    "Send timed out, dropping unresponsive peer"
                );
                break;
            }
        }
    }

    if tokio::time::timeout(send_timeout, sender.close())
        .await
        .is_err()
    {
        tracing::debug!(%connection_id, "Timed out closing socket");
    }
}
