//! Write-ahead transaction log
//!
//! A transaction's changes are durable once its `Prepare` record is synced.
//! The `Commit` record is synced before the RocksDB batch is written, so a
//! transaction is committed as soon as its marker is durable. On restart
//! every prepared transaction with a commit marker is re-applied and every
//! other prepared transaction is discarded.

use crate::node::Quad;
use crate::string_pool::DataStruct;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// WAL errors
#[derive(Error, Debug)]
pub enum WalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Corruption detected
    #[error("WAL corruption detected at sequence {0}")]
    Corruption(u64),
}

pub type WalResult<T> = Result<T, WalError>;

/// A change written by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// New pool entry
    PutNode(DataStruct),
    /// Statement added
    AddQuad(Quad),
    /// Statement removed
    RemoveQuad(Quad),
    /// Allocation counters after the transaction
    Counters { next_gnode: u64, next_blank: u64 },
}

/// Write-Ahead Log entry types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Changes of a prepared transaction
    Prepare { txn: u64, changes: Vec<Change> },
    /// The prepared transaction was applied to storage
    Commit { txn: u64 },
    /// The prepared transaction was abandoned
    Rollback { txn: u64 },
    /// Checkpoint marker
    Checkpoint { sequence: u64, timestamp: i64 },
}

/// WAL record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalRecord {
    /// Sequence number (monotonically increasing)
    sequence: u64,
    /// Entry data
    entry: WalEntry,
    /// CRC32 of the serialized entry
    checksum: u32,
}

impl WalRecord {
    fn new(sequence: u64, entry: WalEntry) -> WalResult<Self> {
        let checksum = Self::calculate_checksum(&entry)?;
        Ok(Self {
            sequence,
            entry,
            checksum,
        })
    }

    fn calculate_checksum(entry: &WalEntry) -> WalResult<u32> {
        let bytes = bincode::serialize(entry)?;
        Ok(crc32fast::hash(&bytes))
    }

    fn verify_checksum(&self) -> bool {
        Self::calculate_checksum(&self.entry).map_or(false, |sum| sum == self.checksum)
    }
}

/// Write-Ahead Log manager
pub struct Wal {
    /// Path to WAL directory
    path: PathBuf,
    /// Current WAL file
    current_file: Option<BufWriter<File>>,
    /// Current sequence number
    sequence: u64,
    /// Sync mode (fsync after every flush)
    sync_mode: bool,
}

impl Wal {
    /// Create a new WAL
    pub fn new(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();

        std::fs::create_dir_all(&path)?;

        let sequence = Self::find_latest_sequence(&path)?;

        info!("Initializing WAL at {:?}, sequence: {}", path, sequence);

        Ok(Self {
            path,
            current_file: None,
            sequence,
            sync_mode: true,
        })
    }

    /// Set sync mode
    pub fn set_sync_mode(&mut self, sync: bool) {
        self.sync_mode = sync;
        debug!("WAL sync mode: {}", sync);
    }

    /// Current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Append an entry to the WAL
    pub fn append(&mut self, entry: WalEntry) -> WalResult<u64> {
        self.sequence += 1;
        let sequence = self.sequence;

        let record = WalRecord::new(sequence, entry)?;
        let data = bincode::serialize(&record)?;

        if self.current_file.is_none() {
            self.open_new_file()?;
        }

        if let Some(ref mut file) = self.current_file {
            // Write length prefix (4 bytes)
            file.write_all(&(data.len() as u32).to_le_bytes())?;
            file.write_all(&data)?;
        }

        Ok(sequence)
    }

    /// Flush buffered records, and fsync them in sync mode
    pub fn flush(&mut self) -> WalResult<()> {
        if let Some(ref mut file) = self.current_file {
            file.flush()?;
            if self.sync_mode {
                file.get_ref().sync_data()?;
            }
        }
        Ok(())
    }

    /// Replay the WAL from a specific sequence number
    ///
    /// A record cut short by a crash ends the replay; a record whose
    /// checksum does not match is reported as corruption.
    pub fn replay<F>(&self, from_sequence: u64, mut callback: F) -> WalResult<u64>
    where
        F: FnMut(&WalEntry) -> WalResult<()>,
    {
        info!("Replaying WAL from sequence {}", from_sequence);

        let files = self.get_wal_files()?;
        let mut replayed = 0u64;
        let mut last_sequence = from_sequence;

        'files: for file_path in files {
            let file = File::open(&file_path)?;
            let mut reader = BufReader::new(file);
            let mut buf = Vec::new();

            loop {
                let mut len_bytes = [0u8; 4];
                match reader.read_exact(&mut len_bytes) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }

                let len = u32::from_le_bytes(len_bytes) as usize;

                buf.resize(len, 0);
                match reader.read_exact(&mut buf) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        warn!("Truncated WAL record in {:?}, ignoring the tail", file_path);
                        break 'files;
                    }
                    Err(e) => return Err(e.into()),
                }

                let record: WalRecord = bincode::deserialize(&buf)?;

                if !record.verify_checksum() {
                    warn!("WAL corruption detected at sequence {}", record.sequence);
                    return Err(WalError::Corruption(record.sequence));
                }

                if record.sequence < from_sequence {
                    continue;
                }

                callback(&record.entry)?;
                replayed += 1;
                last_sequence = record.sequence;
            }
        }

        info!("Replayed {} WAL entries, last sequence: {}", replayed, last_sequence);
        Ok(last_sequence)
    }

    /// Write a checkpoint and delete the log files it supersedes.
    ///
    /// Callers must only checkpoint once every committed transaction in the
    /// log has been applied to storage.
    pub fn checkpoint(&mut self) -> WalResult<()> {
        let sequence = self.sequence;
        info!("Creating WAL checkpoint at sequence {}", sequence);

        let old_files = self.get_wal_files()?;
        self.current_file = None;

        let timestamp = chrono::Utc::now().timestamp();
        self.append(WalEntry::Checkpoint {
            sequence,
            timestamp,
        })?;
        self.flush()?;

        for file in old_files {
            debug!("Removing WAL file {:?}", file);
            std::fs::remove_file(&file)?;
        }

        Ok(())
    }

    /// Open a new WAL file
    fn open_new_file(&mut self) -> WalResult<()> {
        let filename = format!("wal-{:016x}.log", self.sequence);
        let file_path = self.path.join(filename);

        debug!("Opening new WAL file: {:?}", file_path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        self.current_file = Some(BufWriter::new(file));
        Ok(())
    }

    /// Find the latest sequence number from existing WAL files
    fn find_latest_sequence(path: &Path) -> WalResult<u64> {
        let files = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(_) => return Ok(0), // No directory yet
        };

        let mut max_sequence = 0u64;

        for entry in files.flatten() {
            if let Some(filename) = entry.file_name().to_str() {
                if let Some(seq_str) = filename.strip_prefix("wal-").and_then(|s| s.strip_suffix(".log")) {
                    if let Ok(seq) = u64::from_str_radix(seq_str, 16) {
                        max_sequence = max_sequence.max(seq);
                    }
                }
            }
        }

        Ok(max_sequence)
    }

    /// Get all WAL files in sequence order
    fn get_wal_files(&self) -> WalResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.path)?.flatten() {
            if let Some(filename) = entry.file_name().to_str() {
                if filename.starts_with("wal-") && filename.ends_with(".log") {
                    files.push(entry.path());
                }
            }
        }

        // Sort by filename (which includes sequence)
        files.sort();

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prepare(txn: u64) -> WalEntry {
        WalEntry::Prepare {
            txn,
            changes: vec![Change::AddQuad([txn, 2, 3, 4])],
        }
    }

    #[test]
    fn test_wal_creation() {
        let temp_dir = TempDir::new().unwrap();
        let wal = Wal::new(temp_dir.path()).unwrap();
        assert_eq!(wal.sequence, 0);
    }

    #[test]
    fn test_wal_replay() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::new(temp_dir.path()).unwrap();

        for txn in 1..=5 {
            wal.append(prepare(txn)).unwrap();
            wal.append(WalEntry::Commit { txn }).unwrap();
        }
        wal.flush().unwrap();

        let mut entries = Vec::new();
        wal.replay(0, |entry| {
            entries.push(entry.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0], prepare(1));
        assert_eq!(entries[9], WalEntry::Commit { txn: 5 });
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::new(temp_dir.path()).unwrap();
            wal.append(prepare(1)).unwrap();
            wal.flush().unwrap();
        }
        let file = std::fs::read_dir(temp_dir.path()).unwrap().next().unwrap().unwrap().path();
        let mut handle = OpenOptions::new().append(true).open(&file).unwrap();
        handle.write_all(&100u32.to_le_bytes()).unwrap();
        handle.write_all(&[1, 2, 3]).unwrap();

        let wal = Wal::new(temp_dir.path()).unwrap();
        let mut count = 0;
        wal.replay(0, |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_wal_checkpoint_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::new(temp_dir.path()).unwrap();

        for txn in 1..=10 {
            wal.append(prepare(txn)).unwrap();
        }
        wal.flush().unwrap();
        wal.checkpoint().unwrap();

        let mut entries = Vec::new();
        wal.replay(0, |entry| {
            entries.push(entry.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], WalEntry::Checkpoint { sequence: 10, .. }));
    }
}
