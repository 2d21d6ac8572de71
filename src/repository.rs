//! Record repository: the local mirror of one unit's records.
//!
//! Writes go to the store first. Local state changes only after the store
//! accepted the write, so a failed call leaves the mirror exactly as it
//! was.

use crate::error::{BoardError, ConfigError, Result};
use crate::filter::RecordFilter;
use crate::stats::{self, BoardStats};
use crate::store::{DocumentStore, OrderBy};
use crate::subscriptions::{
    BoardEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{
    Category, Draft, DraftOrigin, Kind, OrganizationalUnit, Record, RecordId, RecordPatch,
    Timestamp, UnitId,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Board configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Unit every record of this repository belongs to.
    pub unit: OrganizationalUnit,

    /// Category for new drafts when the current filter is "All".
    pub default_category: Category,

    /// Kind for new drafts.
    pub default_kind: Kind,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            unit: OrganizationalUnit::default(),
            default_category: Category::Works,
            default_kind: Kind::Summary,
        }
    }
}

impl BoardConfig {
    /// Configuration scoped to `unit`, other settings default.
    pub fn for_unit(unit: OrganizationalUnit) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    /// Parse from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// The in-memory set of records for one organizational unit.
///
/// Provides:
/// - Loading from the store, newest first
/// - Creating, updating and removing records store-first
/// - Filtered views and organization-wide statistics
/// - Change notifications
pub struct Repository<S> {
    config: BoardConfig,

    store: S,

    /// Newest first.
    records: RwLock<Vec<Record>>,

    /// Serializes writes so local order follows store order.
    write_lock: Mutex<()>,

    subscriptions: SubscriptionManager,
}

impl<S: DocumentStore> Repository<S> {
    /// An empty repository; call [`load`](Self::load) to fill it.
    pub fn new(config: BoardConfig, store: S) -> Self {
        Self {
            config,
            store,
            records: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
            subscriptions: SubscriptionManager::new(),
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn unit(&self) -> &UnitId {
        &self.config.unit.id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Sync ---

    /// Replace local state with the store's records for this unit.
    ///
    /// Returns the number of records kept. On failure the previous local
    /// state is left in place.
    pub fn load(&self) -> Result<usize> {
        let listed = self
            .store
            .list_records(OrderBy::newest_first())
            .map_err(|e| {
                warn!(unit = %self.unit(), error = %e, "failed to load records");
                BoardError::StoreUnavailable(e)
            })?;

        let listed_count = listed.len();
        let unit = self.unit();
        let mine: Vec<Record> = listed.into_iter().filter(|r| &r.unit == unit).collect();
        if mine.len() < listed_count {
            debug!(
                unit = %unit,
                skipped = listed_count - mine.len(),
                "ignored records of other units"
            );
        }

        let count = mine.len();
        *self.records.write() = mine;
        info!(unit = %unit, count, "loaded records");

        self.subscriptions.broadcast(BoardEvent::Loaded { count });
        Ok(count)
    }

    /// Persist a draft: create when it has no id, update otherwise.
    ///
    /// Returns the record as now held locally.
    pub fn save(&self, draft: Draft) -> Result<Record> {
        draft.validate()?;
        let draft = draft.normalized();

        let _lock = self.write_lock.lock();
        match draft.origin.clone() {
            DraftOrigin::New => self.create(draft),
            DraftOrigin::Existing { id, created_at } => self.update(id, created_at, draft),
        }
    }

    fn create(&self, draft: Draft) -> Result<Record> {
        let payload = draft.into_new_record(self.unit().clone(), Timestamp::now());

        let id = self.store.create_record(&payload).map_err(|e| {
            warn!(error = %e, "failed to create record");
            BoardError::Persistence(e)
        })?;

        let record = Record::from_new(id, payload);
        self.records.write().insert(0, record.clone());
        info!(id = %record.id, category = %record.category, "created record");

        self.subscriptions.broadcast(BoardEvent::Created {
            record: record.clone(),
        });
        Ok(record)
    }

    fn update(&self, id: RecordId, created_at: Timestamp, draft: Draft) -> Result<Record> {
        let patch = match self.get(&id) {
            Some(current) => RecordPatch::between(&current, &draft),
            None => RecordPatch::from_draft(&draft),
        }
        .with_unit(self.unit().clone());

        self.store.update_record(&id, &patch).map_err(|e| {
            warn!(%id, error = %e, "failed to update record");
            BoardError::Persistence(e)
        })?;

        let merged = {
            let mut records = self.records.write();
            records.iter_mut().find(|r| r.id == id).map(|record| {
                patch.apply_to(record);
                record.clone()
            })
        };

        match merged {
            Some(record) => {
                info!(%id, "updated record");
                self.subscriptions.broadcast(BoardEvent::Updated {
                    record: record.clone(),
                });
                Ok(record)
            }
            None => {
                // Mirror converges on the next load.
                debug!(%id, "updated record is not held locally");
                let payload = draft.into_new_record(self.unit().clone(), created_at);
                Ok(Record::from_new(id, payload))
            }
        }
    }

    /// Delete by id, returning the local copy if there was one.
    pub fn remove(&self, id: &RecordId) -> Result<Option<Record>> {
        let _lock = self.write_lock.lock();

        self.store.delete_record(id).map_err(|e| {
            warn!(%id, error = %e, "failed to delete record");
            BoardError::Persistence(e)
        })?;

        let removed = {
            let mut records = self.records.write();
            records
                .iter()
                .position(|r| &r.id == id)
                .map(|index| records.remove(index))
        };
        info!(%id, held_locally = removed.is_some(), "removed record");

        self.subscriptions.broadcast(BoardEvent::Removed {
            id: id.clone(),
            category: removed.as_ref().map(|r| r.category),
        });
        Ok(removed)
    }

    // --- Reads ---

    /// Snapshot of local state, newest first.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().iter().find(|r| &r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records passing `filter`, newest first.
    pub fn filtered(&self, filter: &RecordFilter) -> Vec<Record> {
        let records = self.records.read();
        filter.apply(&records).into_iter().cloned().collect()
    }

    /// Statistics over every local record, regardless of any active filter.
    pub fn stats(&self) -> BoardStats {
        stats::aggregate(self.records.read().iter())
    }

    // --- Subscriptions ---

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }
}
