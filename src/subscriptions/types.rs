//! Subscription types for repository change notifications.

use crate::types::{Category, Record, RecordId};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions. The default admits everything.
#[derive(Clone, Debug)]
pub struct SubscriptionFilter {
    /// Only changes to records in these categories (None = all).
    pub categories: Option<Vec<Category>>,

    /// Include full reloads.
    pub include_loads: bool,

    /// Include created, updated and removed events.
    pub include_changes: bool,
}

impl SubscriptionFilter {
    /// Record changes in every category.
    pub fn changes() -> Self {
        Self {
            categories: None,
            include_loads: false,
            include_changes: true,
        }
    }

    /// Record changes in the given categories.
    pub fn categories(categories: Vec<Category>) -> Self {
        Self {
            categories: Some(categories),
            include_loads: false,
            include_changes: true,
        }
    }

    /// Everything.
    pub fn all() -> Self {
        Self {
            categories: None,
            include_loads: true,
            include_changes: true,
        }
    }

    pub(crate) fn admits(&self, event: &BoardEvent) -> bool {
        match event {
            BoardEvent::Loaded { .. } => self.include_loads,
            BoardEvent::Created { record } | BoardEvent::Updated { record } => {
                self.include_changes && self.admits_category(Some(record.category))
            }
            BoardEvent::Removed { category, .. } => {
                self.include_changes && self.admits_category(*category)
            }
            BoardEvent::Dropped { .. } => true,
        }
    }

    /// Unknown categories pass; the subscriber decides.
    fn admits_category(&self, category: Option<Category>) -> bool {
        match (&self.categories, category) {
            (Some(wanted), Some(category)) => wanted.contains(&category),
            _ => true,
        }
    }
}

impl Default for SubscriptionFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Events emitted after a confirmed change to the repository's records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    /// Local state was replaced from the store.
    Loaded { count: usize },

    /// A record was persisted and prepended.
    Created { record: Record },

    /// A record was updated; carries the merged local version.
    Updated { record: Record },

    /// A record was deleted.
    Removed {
        id: RecordId,
        /// Category of the local copy, when there was one.
        category: Option<Category>,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to receive a subscription's events.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<BoardEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<BoardEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<BoardEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<BoardEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<BoardEvent> {
        self.receiver.try_iter().collect()
    }
}
