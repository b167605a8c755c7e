//! Broadcast payloads and per-recipient delivery bookkeeping
//!
//! A [`SignalPayload`] is cloned once per recipient; both variants are backed by
//! reference-counted buffers so the clone never copies the message body.

use axum::extract::ws::{Message, Utf8Bytes};
use bytes::Bytes;
use smallvec::SmallVec;

use crate::server::ConnectionId;

/// Typical number of peers in a conference call; reports this small stay on the stack.
pub const TYPICAL_FANOUT: usize = 8;

/// An opaque signaling message. The relay never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl SignalPayload {
    /// Extract a relayable payload from a WebSocket frame.
    ///
    /// Control frames (ping, pong, close) return `None`.
    #[must_use]
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::Text(text)),
            Message::Binary(bytes) => Some(Self::Binary(bytes)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
        }
    }

    #[must_use]
    pub fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text),
            Self::Binary(bytes) => Message::Binary(bytes),
        }
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.as_str().len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_str().as_bytes(),
            Self::Binary(bytes) => bytes.as_ref(),
        }
    }
}

impl From<String> for SignalPayload {
    fn from(text: String) -> Self {
        Self::Text(Utf8Bytes::from(text))
    }
}

impl From<&str> for SignalPayload {
    fn from(text: &str) -> Self {
        Self::Text(Utf8Bytes::from(text))
    }
}

impl From<Vec<u8>> for SignalPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

/// What happened when a payload was handed to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted into the recipient's outbound queue.
    Queued,
    /// Recipient queue was full; the payload was discarded for this recipient only.
    Dropped,
    /// Recipient's writer has already shut down; its close path will deregister it.
    Closed,
}

/// Per-recipient outcomes of a single broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    deliveries: SmallVec<[(ConnectionId, DeliveryOutcome); TYPICAL_FANOUT]>,
}

impl BroadcastReport {
    pub(crate) fn record(&mut self, recipient: ConnectionId, outcome: DeliveryOutcome) {
        self.deliveries.push((recipient, outcome));
    }

    /// All `(recipient, outcome)` pairs, in the order they were attempted.
    #[must_use]
    pub fn deliveries(&self) -> &[(ConnectionId, DeliveryOutcome)] {
        &self.deliveries
    }

    #[must_use]
    pub fn outcome_for(&self, recipient: &ConnectionId) -> Option<DeliveryOutcome> {
        self.deliveries
            .iter()
            .find(|(id, _)| id == recipient)
            .map(|(_, outcome)| *outcome)
    }

    /// Number of recipients the broadcast was attempted for.
    #[must_use]
    pub fn recipients(&self) -> usize {
        self.deliveries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.count(DeliveryOutcome::Queued)
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.count(DeliveryOutcome::Dropped)
    }

    #[must_use]
    pub fn closed(&self) -> usize {
        self.count(DeliveryOutcome::Closed)
    }

    fn count(&self, wanted: DeliveryOutcome) -> usize {
        self.deliveries
            .iter()
            .filter(|(_, outcome)| *outcome == wanted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn control_frames_are_not_relayed() {
        assert!(SignalPayload::from_message(Message::Ping(Bytes::new())).is_none());
        assert!(SignalPayload::from_message(Message::Pong(Bytes::new())).is_none());
        assert!(SignalPayload::from_message(Message::Close(None)).is_none());
    }

    #[test]
    fn text_and_binary_frames_keep_their_kind() {
        let text = SignalPayload::from_message(Message::Text("offer:123".into())).unwrap();
        assert_eq!(text, SignalPayload::from("offer:123"));
        assert!(matches!(text.into_message(), Message::Text(t) if t.as_str() == "offer:123"));

        let binary =
            SignalPayload::from_message(Message::Binary(Bytes::from_static(&[0, 159, 255])))
                .unwrap();
        assert_eq!(binary.as_bytes(), &[0, 159, 255]);
        assert!(
            matches!(binary.into_message(), Message::Binary(b) if b == Bytes::from_static(&[0, 159, 255]))
        );
    }

    #[test]
    fn len_counts_utf8_bytes() {
        let payload = SignalPayload::from("ü");
        assert_eq!(payload.len(), 2);
        assert!(!payload.is_empty());
        assert!(SignalPayload::from("").is_empty());
    }

    #[test]
    fn report_counts_outcomes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let mut report = BroadcastReport::default();
        report.record(a, DeliveryOutcome::Queued);
        report.record(b, DeliveryOutcome::Dropped);
        report.record(c, DeliveryOutcome::Closed);

        assert_eq!(report.recipients(), 3);
        assert_eq!(report.queued(), 1);
        assert_eq!(report.dropped(), 1);
        assert_eq!(report.closed(), 1);
        assert_eq!(report.outcome_for(&b), Some(DeliveryOutcome::Dropped));
        assert_eq!(report.outcome_for(&Uuid::new_v4()), None);
    }
}
