//! Append-only operation log backing the file store.
//!
//! Layout: a 5-byte header (magic + version) followed by frames of
//! `[len: u32 LE][entry: MessagePack][crc32: u32 LE]`. Replaying every
//! frame in order rebuilds the document table.

use crate::error::{StoreError, StoreResult};
use crate::types::{NewRecord, RecordId, RecordPatch, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for the operation log.
const LOG_MAGIC: &[u8; 4] = b"DOC\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

const HEADER_SIZE: u64 = 5;

/// Upper bound on a single frame; anything larger is treated as corruption.
const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

/// A single logged operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub operation: LogOperation,
    pub timestamp: Timestamp,
}

/// Mutations recorded in the log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LogOperation {
    Create { id: RecordId, document: NewRecord },
    Update { id: RecordId, patch: RecordPatch },
    Delete { id: RecordId },
}

/// Open log file and the length of its intact prefix.
struct LogFile {
    handle: File,
    /// Bytes of complete, acknowledged frames.
    end: u64,
}

impl LogFile {
    fn open(path: &Path) -> StoreResult<Self> {
        let handle = OpenOptions::new().append(true).open(path)?;
        let end = handle.metadata()?.len();
        Ok(Self { handle, end })
    }

    /// Append one whole frame, or leave the file as it was.
    fn write_frame(&mut self, frame: &[u8], sync: bool) -> StoreResult<()> {
        let written = self.handle.write_all(frame).and_then(|()| {
            if sync {
                self.handle.sync_data()
            } else {
                Ok(())
            }
        });

        match written {
            Ok(()) => {
                self.end += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.handle.set_len(self.end) {
                    warn!(error = %rollback, "could not roll back failed log append");
                }
                Err(e.into())
            }
        }
    }
}

/// Operation log manager.
pub struct OperationLog {
    path: PathBuf,
    file: Mutex<LogFile>,
    next_seq: Mutex<u64>,
    /// fsync after every append.
    sync_writes: bool,
}

impl OperationLog {
    /// Open or create a log, returning it with the entries already in it.
    ///
    /// A torn or corrupt tail is cut off at the last intact frame.
    pub fn open(path: impl AsRef<Path>, sync_writes: bool) -> StoreResult<(Self, Vec<LogEntry>)> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let entries = Self::replay(&path)?;
            debug!(path = %path.display(), entries = entries.len(), "replayed operation log");
            entries
        } else {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            Self::write_header(&mut file)?;
            file.sync_all()?;
            Vec::new()
        };

        let next_seq = entries.last().map_or(1, |e| e.seq + 1);
        let file = LogFile::open(&path)?;

        Ok((
            Self {
                path,
                file: Mutex::new(file),
                next_seq: Mutex::new(next_seq),
                sync_writes,
            },
            entries,
        ))
    }

    /// Append an operation, returning its sequence number.
    ///
    /// On error nothing of the entry remains in the log.
    pub fn append(&self, operation: LogOperation) -> StoreResult<u64> {
        let mut file = self.file.lock();
        let mut next_seq = self.next_seq.lock();
        let seq = *next_seq;

        let entry = LogEntry {
            seq,
            operation,
            timestamp: Timestamp::now(),
        };
        let frame = Self::encode_frame(&entry)?;
        file.write_frame(&frame, self.sync_writes)?;

        *next_seq += 1;
        Ok(seq)
    }

    /// Replace the whole log with `operations`.
    ///
    /// Written to a sibling file first and renamed over the log.
    pub fn rewrite(&self, operations: Vec<LogOperation>) -> StoreResult<()> {
        let mut file = self.file.lock();
        let mut next_seq = self.next_seq.lock();

        let tmp_path = self.path.with_extension("compact");
        let count = operations.len() as u64;
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            Self::write_header(tmp.get_mut())?;
            let now = Timestamp::now();
            for (i, operation) in operations.into_iter().enumerate() {
                let entry = LogEntry {
                    seq: i as u64 + 1,
                    operation,
                    timestamp: now,
                };
                tmp.write_all(&Self::encode_frame(&entry)?)?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        *file = LogFile::open(&self.path)?;
        *next_seq = count + 1;
        Ok(())
    }

    /// Force appended frames to disk.
    pub fn sync(&self) -> StoreResult<()> {
        self.file.lock().handle.sync_all()?;
        Ok(())
    }

    /// Size of the log file in bytes.
    pub fn size(&self) -> StoreResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn replay(path: &Path) -> StoreResult<Vec<LogEntry>> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != LOG_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid log magic".into()));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != LOG_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported log version: {}",
                version[0]
            )));
        }

        let mut entries = Vec::new();
        let mut good_len = HEADER_SIZE;
        loop {
            match Self::read_entry(&mut reader) {
                Ok((entry, frame_len)) => {
                    good_len += frame_len;
                    entries.push(entry);
                }
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable log frame");
                    break;
                }
            }
        }

        if good_len < file_len {
            warn!(
                path = %path.display(),
                kept = good_len,
                dropped = file_len - good_len,
                "truncating damaged operation log tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(good_len)?;
            file.sync_all()?;
        }

        Ok(entries)
    }

    fn write_header(file: &mut File) -> StoreResult<()> {
        file.write_all(LOG_MAGIC)?;
        file.write_all(&[LOG_VERSION])?;
        Ok(())
    }

    /// `[len][entry][crc32]`, ready to append in a single write.
    fn encode_frame(entry: &LogEntry) -> StoreResult<Vec<u8>> {
        let encoded = rmp_serde::to_vec_named(entry)?;
        let checksum = crc32fast::hash(&encoded);

        let mut frame = Vec::with_capacity(encoded.len() + 8);
        frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        frame.extend_from_slice(&encoded);
        frame.extend_from_slice(&checksum.to_le_bytes());
        Ok(frame)
    }

    /// Read one frame, returning the entry and the frame's size on disk.
    fn read_entry(reader: &mut BufReader<File>) -> StoreResult<(LogEntry, u64)> {
        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_ENTRY_SIZE {
            return Err(StoreError::Corruption("Log entry too large".into()));
        }

        let mut encoded = vec![0u8; len];
        reader.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        reader.read_exact(&mut checksum_bytes)?;
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(&encoded);
        if stored != computed {
            return Err(StoreError::Corruption(format!(
                "Log checksum mismatch: expected {stored:08x}, got {computed:08x}"
            )));
        }

        let entry = rmp_serde::from_slice(&encoded)?;
        Ok((entry, 4 + len as u64 + 4))
    }
}
