use crate::broadcast::{BroadcastReport, DeliveryOutcome, SignalPayload};
use crate::config::RelayConfig;
use crate::metrics::RelayMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

mod connection_manager;

use connection_manager::{ConnectionRegistry, RegisteredConnection};

/// Opaque identity of one participant's connection. Only ever compared for equality.
pub type ConnectionId = Uuid;

/// Why a connection could not be registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Relay is full ({current}/{limit} connections)")]
    CapacityExceeded { current: usize, limit: usize },
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

/// A newly established connection as handed to [`SignalRelay::on_open`].
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::Sender<SignalPayload>,
    client_addr: Option<SocketAddr>,
}

impl Connection {
    /// Wrap the send half of an outbound queue under a fresh identity.
    #[must_use]
    pub fn new(sender: mpsc::Sender<SignalPayload>, client_addr: Option<SocketAddr>) -> Self {
        Self::with_id(Uuid::new_v4(), sender, client_addr)
    }

    #[must_use]
    pub const fn with_id(
        id: ConnectionId,
        sender: mpsc::Sender<SignalPayload>,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            id,
            sender,
            client_addr,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The relay endpoint: one global broadcast group over a registry of open connections.
///
/// Constructed once at startup and shared as `Arc<SignalRelay>` with every
/// connection handler. The three lifecycle hooks are synchronous and never
/// wait on a peer's socket; actual writes happen in each connection's own
/// writer task, draining its bounded outbound queue.
pub struct SignalRelay {
    connections: ConnectionRegistry,
    metrics: Arc<RelayMetrics>,
    config: RelayConfig,
}

impl SignalRelay {
    #[must_use]
    pub fn new(config: RelayConfig) -> Arc<Self> {
        Self::with_metrics(config, Arc::new(RelayMetrics::new()))
    }

    #[must_use]
    pub fn with_metrics(config: RelayConfig, metrics: Arc<RelayMetrics>) -> Arc<Self> {
        Arc::new(Self {
            connections: ConnectionRegistry::new(config.max_connections),
            metrics,
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Create an outbound queue sized by `outbound_queue_capacity`.
    #[must_use]
    pub fn outbound_channel(
        &self,
    ) -> (mpsc::Sender<SignalPayload>, mpsc::Receiver<SignalPayload>) {
        mpsc::channel(self.config.outbound_queue_capacity.max(1))
    }

    /// Register a connection so it takes part in the broadcast group.
    ///
    /// On error the connection is not registered and the caller is expected to
    /// close it.
    pub fn on_open(&self, connection: Connection) -> Result<ConnectionId, RegisterError> {
        let Connection {
            id,
            sender,
            client_addr,
        } = connection;

        let registered = RegisteredConnection {
            sender,
            client_addr,
            opened_at: Instant::now(),
        };

        if let Err(err) = self.connections.insert(id, registered) {
            self.metrics.increment_rejected_connections();
            warn!(connection_id = %id, client_addr = ?client_addr, error = %err, "Rejecting connection");
            return Err(err);
        }

        self.metrics.increment_connections();
        info!(
            connection_id = %id,
            client_addr = ?client_addr,
            connections = self.connections.len(),
            "Opening connection"
        );
        Ok(id)
    }

    /// Forward `payload` to every open connection except `source`.
    ///
    /// Each recipient is attempted independently: a full or closed queue is
    /// recorded in the report and the loop moves on. Recipients are never
    /// deregistered here; their own close path does that. A message from a
    /// source that is no longer registered is ignored.
    pub fn on_message(&self, source: &ConnectionId, payload: SignalPayload) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        if !self.connections.contains(source) {
            self.metrics.increment_messages_ignored();
            debug!(connection_id = %source, "Ignoring message from closed connection");
            return report;
        }

        self.metrics.record_message_received(payload.len());
        let recipients = self.connections.recipients_except(source);
        info!(
            connection_id = %source,
            size = payload.len(),
            recipients = recipients.len(),
            "Received signal"
        );
        trace!(connection_id = %source, payload = ?payload, "Signal payload");

        for (recipient, sender) in recipients {
            let outcome = match sender.try_send(payload.clone()) {
                Ok(()) => DeliveryOutcome::Queued,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        from = %source,
                        to = %recipient,
                        capacity = self.config.outbound_queue_capacity,
                        "Outbound queue full, dropping signal for recipient"
                    );
                    DeliveryOutcome::Dropped
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        from = %source,
                        to = %recipient,
                        "Recipient writer already gone, skipping"
                    );
                    DeliveryOutcome::Closed
                }
            };
            report.record(recipient, outcome);
        }

        self.metrics
            .record_deliveries(report.queued(), report.dropped(), report.closed());
        report
    }

    /// Deregister a connection. Returns `false` if it was not registered.
    pub fn on_close(&self, id: &ConnectionId) -> bool {
        let Some(connection) = self.connections.remove(id) else {
            debug!(connection_id = %id, "Close for unregistered connection ignored");
            return false;
        };

        self.metrics.decrement_connections();
        info!(
            connection_id = %id,
            client_addr = ?connection.client_addr,
            duration_ms = u64::try_from(connection.opened_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            connections = self.connections.len(),
            "Closing connection"
        );
        true
    }

    pub fn is_open(&self, id: &ConnectionId) -> bool {
        self.connections.contains(id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.ids()
    }
}
