//! Change notifications from the record repository.
//!
//! A presentation layer subscribes to learn when to re-render. Events are
//! only sent after the store confirmed a change and local state was
//! updated. Each subscriber has a bounded buffer; one that falls behind is
//! dropped rather than stalling writes.
//!
//! # Example
//!
//! ```ignore
//! let handle = repository.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::categories(vec![Category::CivilDefense]),
//!     ..Default::default()
//! });
//!
//! for event in handle.drain() {
//!     match event {
//!         BoardEvent::Created { record } => println!("new: {}", record.title),
//!         BoardEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    BoardEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
