//! Resolver session
//!
//! A session owns the writable phases of the node pool and the statement
//! store for one transaction. `refresh` starts a phase from the last
//! committed state, `prepare` makes it durable, `commit` installs it as the
//! new committed state and `rollback` drops it. Only one session of a
//! database may hold a transaction at a time.

use super::{SessionError, SessionResult};
use crate::database::DatabaseCore;
use crate::node::NodeId;
use crate::persistence::Change;
use crate::statement::{QuadChange, StatementStore, StoreTuples};
use crate::string_pool::{SpObject, StringPool, TypeCategory};
use oxrdf::Term;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, warn};

struct Transaction {
    pool: StringPool,
    store: StatementStore,
    txn_id: u64,
    prepared: bool,
    /// Overflow file length when the phase began
    flat_mark: u64,
}

/// A session writing to one database
pub struct XaResolverSession {
    id: u64,
    core: Arc<Mutex<DatabaseCore>>,
    txn: Option<Transaction>,
}

impl XaResolverSession {
    pub(crate) fn new(id: u64, core: Arc<Mutex<DatabaseCore>>) -> Self {
        Self { id, core, txn: None }
    }

    /// Session identifier, unique within the database
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if a transaction is open
    pub fn is_active(&self) -> bool {
        self.txn.is_some()
    }

    /// Check if the open transaction has been prepared
    pub fn is_prepared(&self) -> bool {
        self.txn.as_ref().map_or(false, |txn| txn.prepared)
    }

    /// Start a new phase from the last committed state, discarding any
    /// uncommitted phase of this session.
    pub fn refresh(&mut self) -> SessionResult<()> {
        if self.txn.is_some() {
            debug!("Session {} discarding its open phase on refresh", self.id);
            self.rollback()?;
        }

        let mut core = self.core.lock();
        if core.closed {
            return Err(SessionError::Closed);
        }
        if core.failed {
            return Err(SessionError::Fatal(
                "an earlier commit failed; reopen the database".to_string(),
            ));
        }
        match core.writer {
            Some(writer) if writer != self.id => return Err(SessionError::WriterBusy(writer)),
            _ => core.writer = Some(self.id),
        }

        let txn_id = core.persistence.begin();
        self.txn = Some(Transaction {
            pool: core.pool.clone(),
            store: core.store.new_writable(),
            txn_id,
            prepared: false,
            flat_mark: core.flat.len(),
        });
        debug!("Session {} refreshed into transaction {}", self.id, txn_id);
        Ok(())
    }

    fn writable(&mut self) -> SessionResult<&mut Transaction> {
        match self.txn.as_mut() {
            None => Err(SessionError::NotInTransaction),
            Some(txn) if txn.prepared => Err(SessionError::Prepared),
            Some(txn) => Ok(txn),
        }
    }

    /// Runs `f` on the open phase, or on the committed phase outside a
    /// transaction.
    fn with_pool<R>(&self, f: impl FnOnce(&StringPool) -> R) -> R {
        match &self.txn {
            Some(txn) => f(&txn.pool),
            None => {
                let pool = self.core.lock().pool.clone();
                f(&pool)
            }
        }
    }

    fn with_store<R>(&self, f: impl FnOnce(&StatementStore) -> R) -> R {
        match &self.txn {
            Some(txn) => f(&txn.store),
            None => {
                let store = self.core.lock().store.new_read_only();
                f(&store)
            }
        }
    }

    /// Node for `term`, allocating one if the value is new.
    pub fn localize(&mut self, term: &Term) -> SessionResult<NodeId> {
        Ok(self.writable()?.pool.localize(term)?)
    }

    /// Node for `object`, allocating one if the value is new.
    pub fn localize_object(&mut self, object: &SpObject) -> SessionResult<NodeId> {
        Ok(self.writable()?.pool.localize_object(object)?)
    }

    /// Node for `term` if it is stored.
    pub fn lookup(&self, term: &Term) -> SessionResult<Option<NodeId>> {
        Ok(self.with_pool(|pool| pool.lookup(term))?)
    }

    /// Term for `node`
    pub fn globalize(&self, node: NodeId) -> SessionResult<Term> {
        Ok(self.with_pool(|pool| pool.globalize(node))?)
    }

    /// Allocate a blank node
    pub fn new_blank_node(&mut self) -> SessionResult<NodeId> {
        Ok(self.writable()?.pool.new_blank_node())
    }

    pub fn add_triple(
        &mut self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> SessionResult<()> {
        Ok(self
            .writable()?
            .store
            .add_triple(subject, predicate, object, graph)?)
    }

    pub fn remove_triples(
        &mut self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> SessionResult<usize> {
        Ok(self
            .writable()?
            .store
            .remove_triples(subject, predicate, object, graph)?)
    }

    pub fn exists_triples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> SessionResult<bool> {
        Ok(self.with_store(|store| store.exists_triples(subject, predicate, object, graph))?)
    }

    pub fn find_tuples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> SessionResult<StoreTuples> {
        Ok(self.with_store(|store| store.find_tuples(subject, predicate, object, graph))?)
    }

    /// Nodes of a category, optionally one datatype, in pool order.
    pub fn find_string_pool_type(
        &self,
        category: TypeCategory,
        datatype: Option<&str>,
    ) -> SessionResult<Vec<NodeId>> {
        Ok(self.with_pool(|pool| pool.find_type(category, datatype))?)
    }

    /// Nodes whose values lie between `start` and `end` in pool order.
    pub fn find_string_pool_range(
        &self,
        start: Option<&Term>,
        start_inclusive: bool,
        end: Option<&Term>,
        end_inclusive: bool,
    ) -> SessionResult<Vec<NodeId>> {
        Ok(self.with_pool(|pool| pool.find_range(start, start_inclusive, end, end_inclusive))?)
    }

    /// Make the open phase durable. Preparing twice is a no-op.
    pub fn prepare(&mut self) -> SessionResult<()> {
        let txn = self.txn.as_mut().ok_or(SessionError::NotInTransaction)?;
        if txn.prepared {
            return Ok(());
        }

        let mut changes: Vec<Change> = txn
            .pool
            .pending()
            .iter()
            .map(|entry| Change::PutNode(entry.as_ref().clone()))
            .collect();
        changes.extend(txn.store.changes().into_iter().map(|change| match change {
            QuadChange::Add(quad) => Change::AddQuad(quad),
            QuadChange::Remove(quad) => Change::RemoveQuad(quad),
        }));
        changes.push(Change::Counters {
            next_gnode: txn.pool.next_gnode(),
            next_blank: txn.pool.next_blank(),
        });

        let mut core = self.core.lock();
        core.flat.force()?;
        core.persistence.prepare(txn.txn_id, changes)?;
        txn.prepared = true;
        Ok(())
    }

    /// Install the open phase as the committed state, preparing it first if
    /// needed.
    ///
    /// A failure after the transaction was prepared leaves storage behind the
    /// log; the database refuses further transactions until it is reopened.
    pub fn commit(&mut self) -> SessionResult<()> {
        if !self.is_prepared() {
            self.prepare()?;
        }
        let Some(mut txn) = self.txn.take() else {
            return Err(SessionError::NotInTransaction);
        };

        let mut core = self.core.lock();
        if core.writer == Some(self.id) {
            core.writer = None;
        }
        if let Err(e) = core.persistence.commit(txn.txn_id) {
            core.failed = true;
            error!(fatal = true, "Commit of transaction {} failed: {}", txn.txn_id, e);
            return Err(SessionError::Fatal(e.to_string()));
        }

        txn.pool.mark_clean();
        txn.store.mark_clean();
        core.pool = txn.pool;
        core.store = txn.store;
        debug!("Session {} committed transaction {}", self.id, txn.txn_id);
        Ok(())
    }

    /// Discard the open phase. Without one this does nothing.
    pub fn rollback(&mut self) -> SessionResult<()> {
        let Some(txn) = self.txn.take() else {
            return Ok(());
        };

        let mut core = self.core.lock();
        if core.writer == Some(self.id) {
            core.writer = None;
        }
        // Both steps run even when one fails.
        let truncated = core.flat.truncate(txn.flat_mark);
        if txn.prepared {
            core.persistence.rollback(txn.txn_id)?;
        }
        truncated?;
        debug!("Session {} rolled back transaction {}", self.id, txn.txn_id);
        Ok(())
    }

    /// Roll back any open phase and give up the writer slot.
    pub fn release(&mut self) -> SessionResult<()> {
        self.rollback()
    }
}

impl Drop for XaResolverSession {
    fn drop(&mut self) {
        if self.txn.is_some() {
            if let Err(e) = self.rollback() {
                warn!("Rollback of session {} on drop failed: {}", self.id, e);
            }
        }
    }
}
