//! Pending command acknowledgements
//!
//! A service call is considered acknowledged when the next state update for
//! its entity arrives. Tracking is best-effort and purely observational: an
//! expired record is reported, never retried.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use ha_core::EntityId;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAck {
    pub issued_at: DateTime<Utc>,
    /// `domain.service` of the call
    pub service: String,
    pub call_id: String,
}

/// At most one pending record per entity; a new command supersedes the old
#[derive(Debug)]
pub struct PendingAcks {
    pending: HashMap<EntityId, PendingAck>,
    timeout: Duration,
}

impl PendingAcks {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            pending: HashMap::new(),
            timeout: Duration::from_std(timeout).unwrap_or_else(|_| Duration::seconds(10)),
        }
    }

    pub fn set_timeout(&mut self, timeout: std::time::Duration) {
        if let Ok(timeout) = Duration::from_std(timeout) {
            self.timeout = timeout;
        }
    }

    /// Track a dispatched call, returning the record it supersedes
    pub fn issue(
        &mut self,
        entity_id: EntityId,
        service: impl Into<String>,
        call_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<PendingAck> {
        let ack = PendingAck {
            issued_at: now,
            service: service.into(),
            call_id: call_id.into(),
        };
        trace!(entity_id = %entity_id, service = %ack.service, "Awaiting acknowledgement");
        self.pending.insert(entity_id, ack)
    }

    /// Clear the record for an entity after a state update
    pub fn clear(&mut self, entity_id: &EntityId) -> Option<PendingAck> {
        self.pending.remove(entity_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&PendingAck> {
        self.pending.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every record older than the timeout, by entity id
    pub fn expired(&mut self, now: DateTime<Utc>) -> Vec<(EntityId, PendingAck)> {
        let timeout = self.timeout;
        let mut expired: Vec<EntityId> = self
            .pending
            .iter()
            .filter(|(_, ack)| now - ack.issued_at >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        expired
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|ack| (id, ack)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::Domain;

    fn lock() -> EntityId {
        EntityId::new(Domain::Lock, "front_door").unwrap()
    }

    fn acks() -> PendingAcks {
        PendingAcks::new(std::time::Duration::from_secs(10))
    }

    #[test]
    fn test_issue_and_clear() {
        let mut acks = acks();
        assert!(!acks.has_pending());

        acks.issue(lock(), "lock.lock", "01J0", Utc::now());
        assert!(acks.has_pending());
        assert_eq!(acks.get(&lock()).unwrap().service, "lock.lock");

        assert!(acks.clear(&lock()).is_some());
        assert!(acks.is_empty());
    }

    #[test]
    fn test_new_command_supersedes() {
        let mut acks = acks();
        let now = Utc::now();
        assert!(acks.issue(lock(), "lock.lock", "a", now).is_none());
        let superseded = acks.issue(lock(), "lock.unlock", "b", now).unwrap();

        assert_eq!(superseded.call_id, "a");
        assert_eq!(acks.len(), 1);
        assert_eq!(acks.get(&lock()).unwrap().call_id, "b");
    }

    #[test]
    fn test_expired() {
        let mut acks = acks();
        let start = Utc::now();
        let cover = EntityId::new(Domain::Cover, "garage").unwrap();
        acks.issue(lock(), "lock.lock", "a", start);
        acks.issue(cover.clone(), "cover.open_cover", "b", start + Duration::seconds(8));

        assert!(acks.expired(start + Duration::seconds(9)).is_empty());

        let expired = acks.expired(start + Duration::seconds(12));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, lock());
        assert_eq!(acks.get(&cover).unwrap().call_id, "b");
    }
}
