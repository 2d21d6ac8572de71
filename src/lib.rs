//! # Civic Board
//!
//! Core of a categorized civic report board: one organizational unit's
//! records, kept in sync with a document store.
//!
//! ## Core Concepts
//!
//! - **Records**: Categorized reports with a kind, text, and optional address,
//!   author, and attachment name
//! - **Repository**: The unit's local mirror; writes reach the store first
//! - **Filters and stats**: Pure views over the mirror
//! - **Editor**: Create/edit form lifecycle with a single in-flight submit
//!
//! ## Example
//!
//! ```ignore
//! use civic_board::{
//!     BoardConfig, Editor, FileStore, FileStoreConfig, RecordFilter, Repository, Selection,
//! };
//!
//! let store = FileStore::open_or_create(FileStoreConfig {
//!     path: "./board".into(),
//!     ..Default::default()
//! })?;
//! let config = BoardConfig::from_json_file("board.json")?;
//! let repository = Repository::new(config.clone(), store);
//! repository.load()?;
//!
//! let editor = Editor::new(&config);
//! editor.open_for_create(Selection::All);
//! editor.update_fields(|f| {
//!     f.title = "Calçada interditada".into();
//!     f.body = "Obra sem sinalização".into();
//! });
//! editor.submit(&repository)?;
//!
//! let visible = repository.filtered(&RecordFilter::new(Selection::All, Selection::All, "calçada"));
//! let stats = repository.stats();
//! ```

pub mod editor;
pub mod error;
pub mod filter;
pub mod repository;
pub mod stats;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use editor::{DraftFields, Editor, EditorState, SubmitOutcome};
pub use error::{
    BoardError, ConfigError, RequiredField, Result, StoreError, StoreResult, ValidationError,
};
pub use filter::{filter, RecordFilter};
pub use repository::{BoardConfig, Repository};
pub use stats::{aggregate, BoardStats};
pub use store::{
    Direction, DocumentStore, FileStore, FileStoreConfig, MemoryStore, OrderBy, SortField,
};
pub use subscriptions::{
    BoardEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use types::*;
