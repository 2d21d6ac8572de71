//! Durable document store in a local directory.

use super::oplog::{LogEntry, LogOperation, OperationLog};
use super::table::DocumentTable;
use super::{DocumentStore, OrderBy};
use crate::error::{StoreError, StoreResult};
use crate::types::{NewRecord, Record, RecordId, RecordPatch};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// fsync the log after every write.
    pub sync_writes: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./board-store"),
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"CVB\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

const LOG_FILE: &str = "documents.log";

/// Document store persisted as an operation log.
///
/// The directory holds:
/// - `MANIFEST`: format magic and version
/// - `LOCK`: held exclusively while the store is open
/// - `documents.log`: every create, update and delete, in order
///
/// Documents are kept in memory and rebuilt from the log on open.
pub struct FileStore {
    config: FileStoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: OperationLog,

    table: RwLock<DocumentTable>,
}

impl FileStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: FileStoreConfig) -> StoreResult<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: FileStoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        Self::init(config)
    }

    /// Open an existing store.
    pub fn open(config: FileStoreConfig) -> StoreResult<Self> {
        Self::verify_manifest(&config.path)?;
        Self::init(config)
    }

    fn init(config: FileStoreConfig) -> StoreResult<Self> {
        let lock_file = Self::acquire_lock(&config.path)?;
        let (log, entries) = OperationLog::open(config.path.join(LOG_FILE), config.sync_writes)?;
        let table = Self::rebuild(entries);

        info!(
            path = %config.path.display(),
            documents = table.len(),
            "opened file store"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            table: RwLock::new(table),
        })
    }

    /// Replay logged operations into a fresh table.
    fn rebuild(entries: Vec<LogEntry>) -> DocumentTable {
        let mut table = DocumentTable::new();
        for entry in entries {
            match entry.operation {
                LogOperation::Create { id, document } => {
                    table.insert(Record::from_new(id, document));
                }
                LogOperation::Update { id, patch } => {
                    if table.update(&id, &patch).is_err() {
                        warn!(seq = entry.seq, %id, "log updates unknown document");
                    }
                }
                LogOperation::Delete { id } => {
                    table.delete(&id);
                }
            }
        }
        table
    }

    /// Rewrite the log to one create per live document.
    ///
    /// Returns the number of documents kept.
    pub fn compact(&self) -> StoreResult<usize> {
        let table = self.table.write();
        let operations: Vec<LogOperation> = table
            .in_insertion_order()
            .into_iter()
            .map(|record| LogOperation::Create {
                id: record.id,
                document: NewRecord {
                    category: record.category,
                    unit: record.unit,
                    kind: record.kind,
                    title: record.title,
                    body: record.body,
                    address: record.address,
                    author: record.author,
                    attachment_name: record.attachment_name,
                    created_at: record.created_at,
                },
            })
            .collect();
        let kept = operations.len();
        self.log.rewrite(operations)?;
        debug!(documents = kept, "compacted operation log");
        Ok(kept)
    }

    /// Force pending writes to disk.
    pub fn sync(&self) -> StoreResult<()> {
        self.log.sync()
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the operation log in bytes.
    pub fn log_size(&self) -> StoreResult<u64> {
        self.log.size()
    }

    fn write_manifest(path: &Path) -> StoreResult<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> StoreResult<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> StoreResult<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }
}

impl DocumentStore for FileStore {
    fn create_record(&self, payload: &NewRecord) -> StoreResult<RecordId> {
        let mut table = self.table.write();
        let mut id = RecordId::generate(payload.title.as_bytes());
        while table.contains(&id) {
            id = RecordId::generate(payload.title.as_bytes());
        }

        self.log.append(LogOperation::Create {
            id: id.clone(),
            document: payload.clone(),
        })?;
        table.insert(Record::from_new(id.clone(), payload.clone()));
        Ok(id)
    }

    fn list_records(&self, order: OrderBy) -> StoreResult<Vec<Record>> {
        Ok(self.table.read().list(order))
    }

    fn update_record(&self, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        let mut table = self.table.write();
        if !table.contains(id) {
            return Err(StoreError::NotFound(id.clone()));
        }

        self.log.append(LogOperation::Update {
            id: id.clone(),
            patch: patch.clone(),
        })?;
        table.update(id, patch)
    }

    fn delete_record(&self, id: &RecordId) -> StoreResult<()> {
        let mut table = self.table.write();
        if !table.contains(id) {
            return Ok(());
        }

        self.log.append(LogOperation::Delete { id: id.clone() })?;
        table.delete(id);
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
