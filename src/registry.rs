// src/registry.rs
//
// Tracks connected WebSocket subscribers. Membership is self-healing: a
// subscriber whose send fails is pruned during the same broadcast call.

use crate::types::AlertPayload;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
pub struct SubscriberRegistry {
    senders: RwLock<HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-adding an id replaces its sender.
    pub fn add(&self, id: Uuid, sender: mpsc::UnboundedSender<String>) {
        let mut senders = self.senders.write();
        senders.insert(id, sender);
        debug!("Subscriber {} registered ({} active)", id, senders.len());
    }

    /// Idempotent: removing an unknown id is a no-op.
    pub fn remove(&self, id: Uuid) {
        let mut senders = self.senders.write();
        senders.remove(&id);
        debug!("Subscriber {} removed ({} active)", id, senders.len());
    }

    pub fn count(&self) -> usize {
        self.senders.read().len()
    }

    /// Fire-and-forget, at-most-once per subscriber. Any subscriber whose
    /// channel is closed is removed as part of this call. Returns the
    /// number of subscribers the payload was handed to.
    pub fn broadcast(&self, payload: &AlertPayload) -> usize {
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize alert payload: {}", e);
                return 0;
            }
        };

        let mut senders = self.senders.write();
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (id, sender) in senders.iter() {
            if sender.send(json.clone()).is_err() {
                dead.push(*id);
            } else {
                delivered += 1;
            }
        }

        for id in dead {
            warn!("Subscriber {} unreachable, pruning", id);
            senders.remove(&id);
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertPayload;

    fn payload() -> AlertPayload {
        AlertPayload {
            kind: "car".to_string(),
            position: "left".to_string(),
            timestamp: 0.0,
            message: "test".to_string(),
        }
    }

    #[test]
    fn test_add_remove_idempotent() {
        let registry = SubscriberRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.add(id, tx.clone());
        registry.add(id, tx);
        assert_eq!(registry.count(), 1);

        registry.remove(id);
        registry.remove(id);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_all_live_subscribers() {
        let registry = SubscriberRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.add(Uuid::new_v4(), tx1);
        registry.add(Uuid::new_v4(), tx2);

        assert_eq!(registry.broadcast(&payload()), 2);

        let msg = rx1.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["type"], "car");
        assert_eq!(value["position"], "left");
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_dead_subscriber_is_pruned_on_broadcast() {
        let registry = SubscriberRegistry::new();
        let live_id = Uuid::new_v4();
        let dead_id = Uuid::new_v4();

        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);

        registry.add(live_id, live_tx);
        registry.add(dead_id, dead_tx);
        assert_eq!(registry.count(), 2);

        // Dead send must not block delivery to the live subscriber
        assert_eq!(registry.broadcast(&payload()), 1);
        assert!(live_rx.try_recv().is_ok());

        // Pruned within the same call
        assert_eq!(registry.count(), 1);
    }
}
