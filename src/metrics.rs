use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide relay counters. All fields are monotonically increasing except
/// `active_connections`.
#[derive(Debug)]
pub struct RelayMetrics {
    started_at: DateTime<Utc>,

    // Connection lifecycle
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub rejected_connections: AtomicU64,

    // Inbound traffic
    pub messages_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub messages_ignored: AtomicU64,

    // Fan-out
    pub deliveries_queued: AtomicU64,
    pub deliveries_dropped: AtomicU64,
    pub deliveries_failed: AtomicU64,

    // Socket writes
    pub send_errors: AtomicU64,
    pub send_timeouts: AtomicU64,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_ignored: AtomicU64::new(0),
            deliveries_queued: AtomicU64::new(0),
            deliveries_dropped: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            send_timeouts: AtomicU64::new(0),
        }
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
        // Saturating so a stray extra decrement cannot wrap the gauge.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
    }

    pub fn increment_rejected_connections(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_received(&self, size: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(u64::try_from(size).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub fn increment_messages_ignored(&self) {
        self.messages_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deliveries(&self, queued: usize, dropped: usize, failed: usize) {
        let to_u64 = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        self.deliveries_queued
            .fetch_add(to_u64(queued), Ordering::Relaxed);
        self.deliveries_dropped
            .fetch_add(to_u64(dropped), Ordering::Relaxed);
        self.deliveries_failed
            .fetch_add(to_u64(failed), Ordering::Relaxed);
    }

    pub fn increment_send_errors(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_send_timeouts(&self) {
        self.send_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = Utc::now();
        MetricsSnapshot {
            started_at: self.started_at,
            uptime_seconds: u64::try_from(now.signed_duration_since(self.started_at).num_seconds())
                .unwrap_or(0),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            disconnections: self.disconnections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
            deliveries_queued: self.deliveries_queued.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            send_timeouts: self.send_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RelayMetrics`] served by the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub rejected_connections: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub messages_ignored: u64,
    pub deliveries_queued: u64,
    pub deliveries_dropped: u64,
    pub deliveries_failed: u64,
    pub send_errors: u64,
    pub send_timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_gauge_tracks_open_and_close() {
        let metrics = RelayMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_connections();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.disconnections, 1);
    }

    #[test]
    fn active_connections_never_underflows() {
        let metrics = RelayMetrics::new();
        metrics.decrement_connections();
        assert_eq!(metrics.snapshot().active_connections, 0);
    }

    #[test]
    fn delivery_counters_accumulate() {
        let metrics = RelayMetrics::new();
        metrics.record_message_received(10);
        metrics.record_message_received(5);
        metrics.record_deliveries(3, 1, 2);
        metrics.record_deliveries(1, 0, 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.bytes_received, 15);
        assert_eq!(snapshot.deliveries_queued, 4);
        assert_eq!(snapshot.deliveries_dropped, 1);
        assert_eq!(snapshot.deliveries_failed, 2);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(RelayMetrics::new().snapshot()).unwrap();
        assert!(json.get("activeConnections").is_some());
        assert!(json.get("deliveriesDropped").is_some());
        assert!(json.get("startedAt").is_some());
    }
}
