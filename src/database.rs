//! Database handle
//!
//! Ties together the committed phases of the node pool and statement store,
//! the persistence manager and the overflow file. A [`Database`] is a cheap
//! cloneable handle; every clone refers to the same open database.

use crate::config::{ConfigError, DatabaseConfig};
use crate::node::{is_blank, NodeId, NONE};
use crate::persistence::{PersistenceError, PersistenceManager, RecoveryStats, StorageError};
use crate::statement::{StatementStore, StatementStoreError, StatementStoreResult, StoreTuples};
use crate::string_pool::{FlatFile, StringPool, StringPoolError, StringPoolResult, TypeCategory};
use crate::util::{BlankNodeMapper, LongMapper};
use crate::xa::{SessionError, StoreXaResource, XaResolverSession};
use oxrdf::Term;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Overflow file name inside the data directory
pub const FLAT_FILE_NAME: &str = "strings.flat";

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("String pool error: {0}")]
    StringPool(#[from] StringPoolError),

    #[error("Statement store error: {0}")]
    Statement(#[from] StatementStoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Database is closed")]
    Closed,
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Shared state behind every handle and session of one database
pub(crate) struct DatabaseCore {
    /// Last committed pool phase
    pub(crate) pool: StringPool,
    /// Last committed store phase
    pub(crate) store: StatementStore,
    pub(crate) persistence: PersistenceManager,
    pub(crate) flat: Arc<FlatFile>,
    /// Session holding the write transaction
    pub(crate) writer: Option<u64>,
    /// Set when a commit failed after prepare
    pub(crate) failed: bool,
    pub(crate) closed: bool,
    next_session: u64,
}

/// Counts reported by [`Database::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub statements: usize,
    pub nodes: usize,
    pub next_gnode: NodeId,
    pub next_blank: u64,
    pub overflow_bytes: u64,
    pub failed: bool,
}

/// An open quad store
#[derive(Clone)]
pub struct Database {
    core: Arc<Mutex<DatabaseCore>>,
    config: Arc<DatabaseConfig>,
}

impl Database {
    /// Open or create the database under `config.data_dir`, finishing any
    /// transactions left in the log.
    pub fn open(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        info!("Opening database at {:?}", config.data_dir);

        let mut persistence = PersistenceManager::new(&config.data_dir, config.wal_sync)?;
        let recovery: RecoveryStats = persistence.recover()?;

        let flat = Arc::new(FlatFile::open(config.data_dir.join(FLAT_FILE_NAME))?);
        let storage = persistence.storage();
        let counters = storage.load_counters()?;
        let pool = StringPool::from_entries(
            Arc::clone(&flat),
            storage.load_nodes()?,
            counters.next_gnode,
            counters.next_blank,
        )?;
        let store = StatementStore::from_quads(storage.load_quads()?);

        info!(
            "Database ready: {} nodes, {} statements, {} transactions recovered",
            pool.len(),
            store.len(),
            recovery.replayed
        );

        Ok(Self {
            core: Arc::new(Mutex::new(DatabaseCore {
                pool,
                store,
                persistence,
                flat,
                writer: None,
                failed: false,
                closed: false,
                next_session: 1,
            })),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// A new session. It reads the committed state until refreshed.
    pub fn new_session(&self) -> XaResolverSession {
        let id = {
            let mut core = self.core.lock();
            let id = core.next_session;
            core.next_session += 1;
            id
        };
        XaResolverSession::new(id, Arc::clone(&self.core))
    }

    /// A two-phase commit resource over a new session
    pub fn new_xa_resource(&self) -> StoreXaResource {
        StoreXaResource::new(self.new_session(), self.config.transaction_timeout_secs)
    }

    /// Consistent view of the last committed state
    pub fn snapshot(&self) -> DatabaseResult<DatabaseSnapshot> {
        let core = self.core.lock();
        if core.closed {
            return Err(DatabaseError::Closed);
        }
        Ok(DatabaseSnapshot {
            pool: core.pool.clone(),
            store: core.store.new_read_only(),
        })
    }

    /// Flush storage and truncate the transaction log.
    pub fn checkpoint(&self) -> DatabaseResult<()> {
        let mut core = self.core.lock();
        core.flat.force()?;
        core.persistence.checkpoint()?;
        Ok(())
    }

    pub fn stats(&self) -> DatabaseStats {
        let core = self.core.lock();
        DatabaseStats {
            statements: core.store.len(),
            nodes: core.pool.len(),
            next_gnode: core.pool.next_gnode(),
            next_blank: core.pool.next_blank(),
            overflow_bytes: core.flat.len(),
            failed: core.failed,
        }
    }

    /// Close the database. Open result sequences fail on their next step and
    /// sessions can no longer start transactions.
    pub fn close(&self) -> DatabaseResult<()> {
        let mut core = self.core.lock();
        if core.closed {
            return Ok(());
        }
        core.closed = true;
        core.store.close();
        core.flat.force()?;
        core.persistence.flush()?;
        info!("Database at {:?} closed", core.persistence.base_path());
        Ok(())
    }

    /// Copy the statements of `source_graph` into `target_graph` of
    /// `target`, remapping node identifiers. Blank nodes are copied as fresh
    /// blank nodes of the target. Returns the number of statements copied.
    pub fn copy_graph_into(
        &self,
        target: &Database,
        source_graph: &Term,
        target_graph: &Term,
    ) -> DatabaseResult<usize> {
        let snapshot = self.snapshot()?;
        let Some(graph) = snapshot.pool.lookup(source_graph)? else {
            return Ok(0);
        };

        let mut session = target.new_session();
        session.refresh()?;
        let target_graph = session.localize(target_graph)?;
        let mut mapper = BlankNodeMapper::new()?;
        let mut copied = 0;

        for row in snapshot.store.find_tuples(NONE, NONE, NONE, graph)? {
            let row = row.map_err(StatementStoreError::from)?;
            let mut mapped = [NONE; 3];
            for (slot, node) in row.iter().enumerate() {
                let mut target_node = mapper.get_long(*node)?;
                if target_node == NONE {
                    target_node = if is_blank(*node) {
                        session.new_blank_node()?
                    } else {
                        session.localize(&snapshot.pool.globalize(*node)?)?
                    };
                    mapper.put_long(*node, target_node)?;
                }
                mapped[slot] = target_node;
            }
            session.add_triple(mapped[0], mapped[1], mapped[2], target_graph)?;
            copied += 1;
        }

        session.commit()?;
        info!("Copied {} statements between graphs", copied);
        Ok(copied)
    }
}

/// Read-only view of one committed state.
///
/// Holds its own phase of the pool and store, so it needs no lock and never
/// observes later commits.
#[derive(Clone)]
pub struct DatabaseSnapshot {
    pool: StringPool,
    store: StatementStore,
}

impl DatabaseSnapshot {
    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub fn store(&self) -> &StatementStore {
        &self.store
    }

    pub fn lookup(&self, term: &Term) -> StringPoolResult<Option<NodeId>> {
        self.pool.lookup(term)
    }

    pub fn globalize(&self, node: NodeId) -> StringPoolResult<Term> {
        self.pool.globalize(node)
    }

    pub fn find_type(&self, category: TypeCategory, datatype: Option<&str>) -> StringPoolResult<Vec<NodeId>> {
        self.pool.find_type(category, datatype)
    }

    pub fn find_tuples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<StoreTuples> {
        self.store.find_tuples(subject, predicate, object, graph)
    }

    pub fn exists_triples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<bool> {
        self.store.exists_triples(subject, predicate, object, graph)
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> StatementStoreResult<bool> {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;
    use tempfile::TempDir;

    fn iri(s: &str) -> Term {
        Term::NamedNode(NamedNode::new(s).unwrap())
    }

    #[test]
    fn test_open_empty() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(DatabaseConfig::new(temp_dir.path())).unwrap();
        let stats = db.stats();
        assert_eq!(stats.statements, 0);
        assert_eq!(stats.nodes, 0);
        assert!(temp_dir.path().join(FLAT_FILE_NAME).exists());
        assert!(temp_dir.path().join("wal").is_dir());
    }

    #[test]
    fn test_snapshot_isolation() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(DatabaseConfig::new(temp_dir.path())).unwrap();
        let before = db.snapshot().unwrap();

        let mut session = db.new_session();
        session.refresh().unwrap();
        let a = session.localize(&iri("http://example.org/a")).unwrap();
        session.add_triple(a, a, a, a).unwrap();
        session.commit().unwrap();

        assert!(before.is_empty().unwrap());
        assert_eq!(db.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_closed_database() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(DatabaseConfig::new(temp_dir.path())).unwrap();
        let snapshot = db.snapshot().unwrap();
        db.close().unwrap();
        assert!(matches!(db.snapshot(), Err(DatabaseError::Closed)));
        assert!(matches!(
            snapshot.is_empty(),
            Err(StatementStoreError::Closed)
        ));
        assert!(matches!(db.new_session().refresh(), Err(SessionError::Closed)));
    }
}
