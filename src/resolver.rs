//! Boundary used by query resolvers
//!
//! A resolver only needs pattern lookups from the store. Optional
//! capabilities report [`StatementStoreError::Unsupported`] when a source
//! does not provide them; [`probe_is_empty`] turns that into `None`.

use crate::database::DatabaseSnapshot;
use crate::node::NodeId;
use crate::statement::{StatementStore, StatementStoreError, StatementStoreResult, StoreTuples};
use crate::xa::{SessionError, XaResolverSession};

/// Statements a resolver can query
pub trait StatementSource {
    /// Statements matching the pattern, projected onto its wildcards
    fn find_tuples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<StoreTuples>;

    fn exists_triples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<bool>;

    /// Check if the source holds no statements
    fn is_empty(&self) -> StatementStoreResult<bool> {
        Err(StatementStoreError::Unsupported("is_empty"))
    }
}

/// `Some(empty)` when the source can tell, `None` when it cannot.
pub fn probe_is_empty<S: StatementSource + ?Sized>(source: &S) -> StatementStoreResult<Option<bool>> {
    match source.is_empty() {
        Ok(empty) => Ok(Some(empty)),
        Err(StatementStoreError::Unsupported(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl StatementSource for StatementStore {
    fn find_tuples(&self, s: NodeId, p: NodeId, o: NodeId, g: NodeId) -> StatementStoreResult<StoreTuples> {
        StatementStore::find_tuples(self, s, p, o, g)
    }

    fn exists_triples(&self, s: NodeId, p: NodeId, o: NodeId, g: NodeId) -> StatementStoreResult<bool> {
        StatementStore::exists_triples(self, s, p, o, g)
    }

    fn is_empty(&self) -> StatementStoreResult<bool> {
        StatementStore::is_empty(self)
    }
}

impl StatementSource for DatabaseSnapshot {
    fn find_tuples(&self, s: NodeId, p: NodeId, o: NodeId, g: NodeId) -> StatementStoreResult<StoreTuples> {
        DatabaseSnapshot::find_tuples(self, s, p, o, g)
    }

    fn exists_triples(&self, s: NodeId, p: NodeId, o: NodeId, g: NodeId) -> StatementStoreResult<bool> {
        DatabaseSnapshot::exists_triples(self, s, p, o, g)
    }

    fn is_empty(&self) -> StatementStoreResult<bool> {
        DatabaseSnapshot::is_empty(self)
    }
}

fn store_error(error: SessionError) -> StatementStoreError {
    match error {
        SessionError::Statement(e) => e,
        SessionError::Closed => StatementStoreError::Closed,
        _ => StatementStoreError::Unsupported("session failure during lookup"),
    }
}

// Sessions do not answer is_empty: their open phase may be mid-update.
impl StatementSource for XaResolverSession {
    fn find_tuples(&self, s: NodeId, p: NodeId, o: NodeId, g: NodeId) -> StatementStoreResult<StoreTuples> {
        XaResolverSession::find_tuples(self, s, p, o, g).map_err(store_error)
    }

    fn exists_triples(&self, s: NodeId, p: NodeId, o: NodeId, g: NodeId) -> StatementStoreResult<bool> {
        XaResolverSession::exists_triples(self, s, p, o, g).map_err(store_error)
    }
}
