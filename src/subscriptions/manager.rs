//! Subscription manager for broadcasting repository events.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{
    BoardEvent, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<BoardEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full or the receiver is gone.
    ///
    /// The channel has one slot beyond `buffer_size`, kept for the final
    /// `Dropped` notice.
    fn try_send(&self, event: BoardEvent) -> bool {
        if self.sender.len() >= self.config.buffer_size {
            return false;
        }
        self.sender.try_send(event).is_ok()
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let config = SubscriptionConfig {
            buffer_size: config.buffer_size.max(1),
            ..config
        };
        let (sender, receiver) = bounded(config.buffer_size + 1);

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Send dropped event (best effort)
            let _ = sub.sender.try_send(BoardEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Send `event` to every subscription whose filter admits it.
    ///
    /// Subscribers that cannot take the event are dropped.
    pub fn broadcast(&self, event: BoardEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.config.filter.admits(&event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    debug!(subscription = id.0, "dropping slow subscriber");
                    // Lands in the reserved slot unless a concurrent broadcast took it.
                    let _ = sub.sender.try_send(BoardEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::SubscriptionFilter;
    use crate::types::{Category, Kind, Record, RecordId, Timestamp, UnitId};
    use std::time::Duration;

    fn make_test_record(category: Category) -> Record {
        Record {
            id: RecordId::new("r1"),
            category,
            unit: UnitId::new("penha"),
            kind: Kind::Tip,
            title: "t".into(),
            body: "b".into(),
            address: None,
            author: None,
            attachment_name: None,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig::default());
        assert_eq!(manager.subscription_count(), 1);

        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);
        assert!(matches!(
            handle.try_recv(),
            Ok(BoardEvent::Dropped {
                reason: DropReason::Unsubscribed
            })
        ));
    }

    #[test]
    fn test_broadcast_to_matching_category() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::categories(vec![Category::StreetVendors]),
            ..Default::default()
        });

        manager.broadcast(BoardEvent::Created {
            record: make_test_record(Category::StreetVendors),
        });

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        match event {
            BoardEvent::Created { record } => assert_eq!(record.category, Category::StreetVendors),
            other => panic!("Expected Created event, got {other:?}"),
        }
    }

    #[test]
    fn test_broadcast_filters_non_matching() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::categories(vec![Category::StreetVendors]),
            ..Default::default()
        });

        manager.broadcast(BoardEvent::Created {
            record: make_test_record(Category::Works),
        });
        manager.broadcast(BoardEvent::Loaded { count: 3 });

        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            buffer_size: 2,
            ..Default::default()
        });

        for count in 0..10 {
            manager.broadcast(BoardEvent::Loaded { count });
        }

        assert_eq!(manager.subscription_count(), 0);

        let events = handle.drain();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], BoardEvent::Loaded { count: 0 }));
        assert!(matches!(events[1], BoardEvent::Loaded { count: 1 }));
        assert!(matches!(
            events[2],
            BoardEvent::Dropped {
                reason: DropReason::BufferOverflow
            }
        ));
    }

    #[test]
    fn test_default_filter_admits_everything() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::default(),
            ..Default::default()
        });

        manager.broadcast(BoardEvent::Loaded { count: 1 });
        manager.broadcast(BoardEvent::Created {
            record: make_test_record(Category::Other),
        });

        assert_eq!(handle.drain().len(), 2);
    }

    #[test]
    fn test_disconnected_receiver_is_dropped() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig::default());
        drop(handle);

        manager.broadcast(BoardEvent::Loaded { count: 0 });
        assert_eq!(manager.subscription_count(), 0);
    }
}
