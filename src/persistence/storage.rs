//! RocksDB storage layer
//!
//! Holds the last committed state: pool entries, the statement set and the
//! allocation counters, each in its own column family.

use super::wal::Change;
use crate::node::{NodeId, Quad};
use crate::string_pool::DataStruct;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Column family error
    #[error("Column family error: {0}")]
    ColumnFamily(String),

    /// Malformed key or value
    #[error("Corrupt record in {cf}: {reason}")]
    Corrupt { cf: &'static str, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

const CF_META: &str = "meta";
const CF_NODES: &str = "nodes";
const CF_QUADS: &str = "quads";

const NEXT_GNODE_KEY: &[u8] = b"next_gnode";
const NEXT_BLANK_KEY: &[u8] = b"next_blank";

/// Allocation counters persisted with each commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub next_gnode: NodeId,
    pub next_blank: u64,
}

/// RocksDB-based persistent storage
pub struct PersistentStorage {
    db: DB,
    path: PathBuf,
    sync: bool,
}

impl PersistentStorage {
    /// Open or create storage at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        info!("Opening persistent storage at: {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_write_buffer_size(64 * 1024 * 1024); // 64 MB
        opts.set_max_write_buffer_number(3);
        opts.set_min_write_buffer_number_to_merge(1);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_wal_recovery_mode(rocksdb::DBRecoveryMode::PointInTime);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_NODES, Self::compressed_cf_options()),
            ColumnFamilyDescriptor::new(CF_QUADS, Self::compressed_cf_options()),
        ];

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;

        info!("Persistent storage opened successfully");

        Ok(Self {
            db,
            path,
            sync: false,
        })
    }

    fn compressed_cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    /// Sync RocksDB's own log on every batch
    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Storage directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cf(&self, name: &'static str) -> StorageResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamily(name.to_string()))
    }

    fn quad_key(quad: &Quad) -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, node) in quad.iter().enumerate() {
            key[i * 8..(i + 1) * 8].copy_from_slice(&node.to_be_bytes());
        }
        key
    }

    fn decode_u64(cf: &'static str, bytes: &[u8]) -> StorageResult<u64> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| StorageError::Corrupt {
            cf,
            reason: format!("expected 8 bytes, found {}", bytes.len()),
        })?;
        Ok(u64::from_be_bytes(array))
    }

    /// Apply a committed transaction in one atomic batch.
    pub fn apply(&self, changes: &[Change]) -> StorageResult<()> {
        let meta = self.cf(CF_META)?;
        let nodes = self.cf(CF_NODES)?;
        let quads = self.cf(CF_QUADS)?;

        let mut batch = WriteBatch::default();
        for change in changes {
            match change {
                Change::PutNode(entry) => {
                    batch.put_cf(&nodes, entry.gnode.to_be_bytes(), bincode::serialize(entry)?);
                }
                Change::AddQuad(quad) => batch.put_cf(&quads, Self::quad_key(quad), b""),
                Change::RemoveQuad(quad) => batch.delete_cf(&quads, Self::quad_key(quad)),
                Change::Counters {
                    next_gnode,
                    next_blank,
                } => {
                    batch.put_cf(&meta, NEXT_GNODE_KEY, next_gnode.to_be_bytes());
                    batch.put_cf(&meta, NEXT_BLANK_KEY, next_blank.to_be_bytes());
                }
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync);
        self.db.write_opt(batch, &write_opts)?;

        debug!("Applied {} changes", changes.len());
        Ok(())
    }

    /// Every stored pool entry in node order
    pub fn load_nodes(&self) -> StorageResult<Vec<DataStruct>> {
        let cf = self.cf(CF_NODES)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(bincode::deserialize(&value)?);
        }
        Ok(entries)
    }

    /// Every stored statement in subject, predicate, object, graph order
    pub fn load_quads(&self) -> StorageResult<Vec<Quad>> {
        let cf = self.cf(CF_QUADS)?;
        let mut quads = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() != 32 {
                return Err(StorageError::Corrupt {
                    cf: CF_QUADS,
                    reason: format!("key of {} bytes", key.len()),
                });
            }
            let mut quad = [0u64; 4];
            for (i, node) in quad.iter_mut().enumerate() {
                *node = Self::decode_u64(CF_QUADS, &key[i * 8..(i + 1) * 8])?;
            }
            quads.push(quad);
        }
        Ok(quads)
    }

    /// Allocation counters of the last commit
    pub fn load_counters(&self) -> StorageResult<Counters> {
        let cf = self.cf(CF_META)?;
        let mut counters = Counters::default();
        if let Some(value) = self.db.get_cf(&cf, NEXT_GNODE_KEY)? {
            counters.next_gnode = Self::decode_u64(CF_META, &value)?;
        }
        if let Some(value) = self.db.get_cf(&cf, NEXT_BLANK_KEY)? {
            counters.next_blank = Self::decode_u64(CF_META, &value)?;
        }
        Ok(counters)
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
