//! Persistence layer
//!
//! - RocksDB storage of the last committed pool entries and statements
//! - Write-ahead transaction log giving prepared transactions durability
//! - Recovery that finishes committed transactions after a crash

pub mod storage;
pub mod wal;

pub use storage::{Counters, PersistentStorage, StorageError, StorageResult};
pub use wal::{Change, Wal, WalEntry, WalError, WalResult};

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of replaying the transaction log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Committed transactions re-applied to storage
    pub replayed: usize,
    /// Prepared transactions without a decision, dropped
    pub discarded: usize,
}

/// Coordinates the transaction log with storage
pub struct PersistenceManager {
    /// Base path for all data
    base_path: PathBuf,
    /// RocksDB storage
    storage: PersistentStorage,
    /// Write-Ahead Log
    wal: Wal,
    next_txn: u64,
    /// Prepared transactions awaiting commit or rollback
    prepared: FxHashMap<u64, Vec<Change>>,
}

impl PersistenceManager {
    /// Create a new persistence manager
    pub fn new(base_path: impl AsRef<Path>, sync: bool) -> Result<Self, PersistenceError> {
        let base_path = base_path.as_ref().to_path_buf();

        // Create subdirectories
        let storage_path = base_path.join("data");
        let wal_path = base_path.join("wal");

        std::fs::create_dir_all(&storage_path)?;
        std::fs::create_dir_all(&wal_path)?;

        info!("Initializing persistence manager at: {:?}", base_path);

        let mut storage = PersistentStorage::open(&storage_path)?;
        storage.set_sync(sync);
        let mut wal = Wal::new(&wal_path)?;
        wal.set_sync_mode(sync);

        Ok(Self {
            base_path,
            storage,
            wal,
            next_txn: 1,
            prepared: FxHashMap::default(),
        })
    }

    /// Base directory
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Finish every logged transaction, then truncate the log.
    ///
    /// Committed transactions are applied again; every change is
    /// idempotent. Prepared transactions with no commit record never reached
    /// storage and are dropped.
    pub fn recover(&mut self) -> PersistenceResult<RecoveryStats> {
        info!("Starting recovery from {:?}", self.base_path);

        let mut pending: FxHashMap<u64, Vec<Change>> = FxHashMap::default();
        let mut stats = RecoveryStats::default();
        let mut committed: Vec<Vec<Change>> = Vec::new();
        let mut max_txn = 0u64;

        self.wal.replay(0, |entry| {
            match entry {
                WalEntry::Prepare { txn, changes } => {
                    max_txn = max_txn.max(*txn);
                    pending.insert(*txn, changes.clone());
                }
                WalEntry::Commit { txn } => {
                    if let Some(changes) = pending.remove(txn) {
                        committed.push(changes);
                    }
                }
                WalEntry::Rollback { txn } => {
                    pending.remove(txn);
                }
                WalEntry::Checkpoint { .. } => {}
            }
            Ok(())
        })?;

        for changes in &committed {
            self.storage.apply(changes)?;
        }
        stats.replayed = committed.len();

        for txn in pending.keys() {
            warn!("Discarding prepared transaction {} with no commit record", txn);
        }
        stats.discarded = pending.len();
        self.next_txn = max_txn + 1;

        self.storage.flush()?;
        self.wal.checkpoint()?;

        info!(
            "Recovery complete: {} transactions replayed, {} discarded",
            stats.replayed, stats.discarded
        );
        Ok(stats)
    }

    /// Allocate a transaction number
    pub fn begin(&mut self) -> u64 {
        let txn = self.next_txn;
        self.next_txn += 1;
        debug!("Transaction {} started", txn);
        txn
    }

    /// Make a transaction's changes durable without applying them.
    pub fn prepare(&mut self, txn: u64, changes: Vec<Change>) -> PersistenceResult<()> {
        self.wal.append(WalEntry::Prepare {
            txn,
            changes: changes.clone(),
        })?;
        self.wal.flush()?;
        self.prepared.insert(txn, changes);
        debug!("Transaction {} prepared", txn);
        Ok(())
    }

    /// Record the commit decision, then apply the transaction to storage.
    ///
    /// Once the commit record is durable the transaction is committed even if
    /// applying it fails; recovery re-applies it.
    pub fn commit(&mut self, txn: u64) -> PersistenceResult<()> {
        let changes = self
            .prepared
            .remove(&txn)
            .ok_or(PersistenceError::UnknownTransaction(txn))?;
        self.wal.append(WalEntry::Commit { txn })?;
        self.wal.flush()?;
        self.storage.apply(&changes)?;
        debug!("Transaction {} committed ({} changes)", txn, changes.len());
        Ok(())
    }

    /// Abandon a transaction. Unprepared transactions left nothing in the log.
    pub fn rollback(&mut self, txn: u64) -> PersistenceResult<()> {
        if self.prepared.remove(&txn).is_some() {
            self.wal.append(WalEntry::Rollback { txn })?;
            self.wal.flush()?;
        }
        debug!("Transaction {} rolled back", txn);
        Ok(())
    }

    /// Check if a transaction is prepared and undecided
    pub fn is_prepared(&self, txn: u64) -> bool {
        self.prepared.contains_key(&txn)
    }

    /// Flush storage and truncate the log.
    pub fn checkpoint(&mut self) -> PersistenceResult<()> {
        if !self.prepared.is_empty() {
            return Err(PersistenceError::TransactionInFlight(self.prepared.len()));
        }
        info!("Creating checkpoint");
        self.storage.flush()?;
        self.wal.checkpoint()?;
        Ok(())
    }

    /// Flush WAL and storage
    pub fn flush(&mut self) -> PersistenceResult<()> {
        self.wal.flush()?;
        self.storage.flush()?;
        Ok(())
    }

    /// Get storage reference
    pub fn storage(&self) -> &PersistentStorage {
        &self.storage
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction {0} is not prepared")]
    UnknownTransaction(u64),

    #[error("{0} prepared transactions are still undecided")]
    TransactionInFlight(usize),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
