use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::broadcast::SignalPayload;

use super::{ConnectionId, RegisterError};

#[derive(Debug, Clone)]
pub(crate) struct RegisteredConnection {
    pub sender: mpsc::Sender<SignalPayload>,
    pub client_addr: Option<SocketAddr>,
    pub opened_at: Instant,
}

/// The live set of open connections.
///
/// `len` tracks the number of entries and doubles as the capacity reservation
/// counter, so a full registry rejects concurrent opens without racing past the
/// limit. A slot is only reserved once the id is known to be vacant.
pub(crate) struct ConnectionRegistry {
    clients: DashMap<ConnectionId, RegisteredConnection>,
    len: AtomicUsize,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            clients: DashMap::new(),
            len: AtomicUsize::new(0),
            max_connections,
        }
    }

    pub fn insert(
        &self,
        id: ConnectionId,
        connection: RegisteredConnection,
    ) -> Result<(), RegisterError> {
        match self.clients.entry(id) {
            Entry::Occupied(_) => Err(RegisterError::AlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                // The shard stays locked until the entry is written, so the
                // counter never counts an insert that does not happen.
                self.try_reserve_slot()
                    .map_err(|current| RegisterError::CapacityExceeded {
                        current,
                        limit: self.max_connections,
                    })?;
                slot.insert(connection);
                Ok(())
            }
        }
    }

    /// Returns the removed entry, or `None` when `id` was not registered.
    pub fn remove(&self, id: &ConnectionId) -> Option<RegisteredConnection> {
        let (_, connection) = self.clients.remove(id)?;
        self.release_slot();
        Some(connection)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.clients.iter().map(|entry| *entry.key()).collect()
    }

    /// Clone the send handles of every connection except `exclude`.
    ///
    /// Shard locks are released before this returns, so delivery never runs
    /// while the map is locked.
    pub fn recipients_except(
        &self,
        exclude: &ConnectionId,
    ) -> Vec<(ConnectionId, mpsc::Sender<SignalPayload>)> {
        self.clients
            .iter()
            .filter(|entry| entry.key() != exclude)
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect()
    }

    fn try_reserve_slot(&self) -> Result<(), usize> {
        if self.max_connections == 0 {
            self.len.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        self.len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max_connections).then_some(current + 1)
            })
            .map(|_| ())
    }

    fn release_slot(&self) {
        let _ = self
            .len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry() -> (RegisteredConnection, mpsc::Receiver<SignalPayload>) {
        let (sender, rx) = mpsc::channel(4);
        (
            RegisteredConnection {
                sender,
                client_addr: None,
                opened_at: Instant::now(),
            },
            rx,
        )
    }

    #[test]
    fn insert_and_remove_keep_len_in_sync() {
        let registry = ConnectionRegistry::new(0);
        let (a, _rx_a) = entry();
        let (b, _rx_b) = entry();
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();

        registry.insert(id_a, a).unwrap();
        registry.insert(id_b, b).unwrap();
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&id_a).is_some());
        assert!(registry.remove(&id_a).is_none());
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(&id_a));
        assert!(registry.contains(&id_b));
    }

    #[test]
    fn duplicate_id_is_rejected_without_leaking_a_slot() {
        let registry = ConnectionRegistry::new(2);
        let id = Uuid::new_v4();
        let (first, _rx1) = entry();
        let (second, _rx2) = entry();

        registry.insert(id, first).unwrap();
        assert!(matches!(
            registry.insert(id, second),
            Err(RegisterError::AlreadyRegistered(dup)) if dup == id
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_at_capacity_is_reported_as_duplicate() {
        let registry = ConnectionRegistry::new(1);
        let id = Uuid::new_v4();
        let (first, _rx1) = entry();
        let (second, _rx2) = entry();

        registry.insert(id, first).unwrap();
        assert!(matches!(
            registry.insert(id, second),
            Err(RegisterError::AlreadyRegistered(dup)) if dup == id
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec![id]);
    }

    #[test]
    fn capacity_limit_is_enforced_and_freed_on_remove() {
        let registry = ConnectionRegistry::new(1);
        let id = Uuid::new_v4();
        let (first, _rx1) = entry();
        let (second, _rx2) = entry();
        let (third, _rx3) = entry();

        registry.insert(id, first).unwrap();
        assert!(matches!(
            registry.insert(Uuid::new_v4(), second),
            Err(RegisterError::CapacityExceeded {
                current: 1,
                limit: 1
            })
        ));

        registry.remove(&id);
        assert!(registry.insert(Uuid::new_v4(), third).is_ok());
    }

    #[test]
    fn recipients_except_skips_the_excluded_id() {
        let registry = ConnectionRegistry::new(0);
        let ids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut receivers = Vec::new();
        for id in &ids {
            let (conn, rx) = entry();
            receivers.push(rx);
            registry.insert(*id, conn).unwrap();
        }

        let recipients: Vec<_> = registry
            .recipients_except(&ids[0])
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(recipients.len(), 2);
        assert!(!recipients.contains(&ids[0]));
        assert!(recipients.contains(&ids[1]));
        assert!(recipients.contains(&ids[2]));
    }
}
