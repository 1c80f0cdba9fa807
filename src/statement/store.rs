//! Statement store phases

use super::index::{bound_mask, IndexOrder, GRAPH};
use super::tuples::StoreTuples;
use super::{StatementStoreError, StatementStoreResult};
use crate::avl::{infallible, AvlTree, KeyComparator};
use crate::node::{NodeId, Quad, MIN_NODE, NONE};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A pending change to the statement set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuadChange {
    Add(Quad),
    Remove(Quad),
}

/// One phase of the quad store.
///
/// Statements are kept in six AVL indexes, one per [`IndexOrder`]. Clones
/// share index nodes, so a phase can be handed to readers in O(1) while a
/// writer keeps modifying its own copy. All phases derived from one store
/// share its closed flag.
#[derive(Clone)]
pub struct StatementStore {
    indexes: [AvlTree<Quad>; 6],
    /// Net changes since the phase was last marked clean; `true` is an add.
    journal: FxHashMap<Quad, bool>,
    read_only: bool,
    closed: Arc<AtomicBool>,
}

impl Default for StatementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            indexes: Default::default(),
            journal: FxHashMap::default(),
            read_only: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build a store holding `quads`.
    pub fn from_quads(mut quads: Vec<Quad>) -> Self {
        quads.sort_unstable();
        quads.dedup();
        let mut store = Self::new();
        for order in IndexOrder::ALL {
            let mut keys: Vec<Quad> = quads.iter().map(|quad| order.permute(quad)).collect();
            keys.sort_unstable();
            store.indexes[order.slot()] = AvlTree::from_sorted(keys);
        }
        debug!("Built statement indexes for {} quads", quads.len());
        store
    }

    /// A read-only view of this phase.
    pub fn new_read_only(&self) -> Self {
        Self {
            indexes: self.indexes.clone(),
            journal: FxHashMap::default(),
            read_only: true,
            closed: Arc::clone(&self.closed),
        }
    }

    /// A writable phase starting from this one.
    pub fn new_writable(&self) -> Self {
        Self {
            indexes: self.indexes.clone(),
            journal: FxHashMap::default(),
            read_only: false,
            closed: Arc::clone(&self.closed),
        }
    }

    /// Close the store and every phase derived from it.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Check if the store has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check if writes are refused
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn check_open(&self) -> StatementStoreResult<()> {
        if self.is_closed() {
            return Err(StatementStoreError::Closed);
        }
        Ok(())
    }

    fn check_writable(&self) -> StatementStoreResult<()> {
        self.check_open()?;
        if self.read_only {
            return Err(StatementStoreError::Unsupported("write to a read-only phase"));
        }
        Ok(())
    }

    fn index(&self, order: IndexOrder) -> &AvlTree<Quad> {
        &self.indexes[order.slot()]
    }

    /// Insert a statement. Inserting a present statement is a no-op.
    pub fn add_triple(
        &mut self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<()> {
        self.check_writable()?;
        let quad = [subject, predicate, object, graph];
        if let Some(node) = quad.iter().copied().find(|node| *node < MIN_NODE) {
            return Err(StatementStoreError::InvalidNode(node));
        }
        if self.contains(&quad) {
            return Ok(());
        }

        for order in IndexOrder::ALL {
            let key = order.permute(&quad);
            infallible(self.indexes[order.slot()].insert(key, &mut KeyComparator(&key)));
        }
        self.record(quad, true);
        Ok(())
    }

    /// Remove every statement matching the pattern; [`NONE`] positions are
    /// wildcards. Returns the number of statements removed.
    pub fn remove_triples(
        &mut self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<usize> {
        self.check_writable()?;
        let pattern = [subject, predicate, object, graph];
        let matching: Vec<Quad> = if bound_mask(&pattern) == 0x0f {
            if self.contains(&pattern) {
                vec![pattern]
            } else {
                Vec::new()
            }
        } else {
            self.matching_quads(&pattern)
        };

        for quad in &matching {
            for order in IndexOrder::ALL {
                let key = order.permute(quad);
                infallible(self.indexes[order.slot()].remove(&mut KeyComparator(&key)));
            }
            self.record(*quad, false);
        }
        Ok(matching.len())
    }

    fn record(&mut self, quad: Quad, added: bool) {
        match self.journal.get(&quad) {
            // Reverts an earlier change in this phase.
            Some(previous) if *previous != added => {
                self.journal.remove(&quad);
            }
            _ => {
                self.journal.insert(quad, added);
            }
        }
    }

    fn contains(&self, quad: &Quad) -> bool {
        infallible(self.index(IndexOrder::Spog).find(&mut KeyComparator(quad))).is_some()
    }

    fn matching_quads(&self, pattern: &Quad) -> Vec<Quad> {
        let order = IndexOrder::for_mask(bound_mask(pattern));
        let seek = Self::seek_key(order, pattern);
        let cursor = infallible(self.index(order).lower_bound(&mut KeyComparator(&seek)));
        let tuples = StoreTuples::new(cursor, order, pattern, Arc::new(AtomicBool::new(false)));
        let columns = tuples.column_order();
        tuples
            .filter_map(Result::ok)
            .map(|row| {
                let mut quad = *pattern;
                for (column, position) in columns.iter().enumerate() {
                    quad[*position] = row[column];
                }
                quad
            })
            .collect()
    }

    fn seek_key(order: IndexOrder, pattern: &Quad) -> Quad {
        let key = order.permute(pattern);
        let prefix_len = key.iter().take_while(|node| **node != NONE).count();
        let mut seek = [NONE; 4];
        seek[..prefix_len].copy_from_slice(&key[..prefix_len]);
        seek
    }

    /// Check if any statement matches the pattern.
    pub fn exists_triples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<bool> {
        let mut tuples = self.find_tuples(subject, predicate, object, graph)?;
        let found = tuples.next().is_some();
        tuples.close();
        Ok(found)
    }

    /// Statements matching the pattern, projected onto its wildcard
    /// positions, from the index whose key prefix covers the bound
    /// positions.
    pub fn find_tuples(
        &self,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<StoreTuples> {
        let pattern = [subject, predicate, object, graph];
        self.find_tuples_with_mask(bound_mask(&pattern), subject, predicate, object, graph)
    }

    /// Like [`StatementStore::find_tuples`] but with the index chosen by
    /// `mask`, which must include every bound position.
    pub fn find_tuples_with_mask(
        &self,
        mask: u8,
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        graph: NodeId,
    ) -> StatementStoreResult<StoreTuples> {
        self.check_open()?;
        let pattern = [subject, predicate, object, graph];
        let bound = bound_mask(&pattern);
        if mask > 0x0f || bound & !mask != 0 {
            return Err(StatementStoreError::BadMask { mask, bound });
        }
        let order = IndexOrder::for_mask(mask);
        let seek = Self::seek_key(order, &pattern);
        let cursor = infallible(self.index(order).lower_bound(&mut KeyComparator(&seek)));
        Ok(StoreTuples::new(cursor, order, &pattern, Arc::clone(&self.closed)))
    }

    /// Check if the store holds no statements
    pub fn is_empty(&self) -> StatementStoreResult<bool> {
        self.check_open()?;
        Ok(self.index(IndexOrder::Spog).is_empty())
    }

    /// Check if no statement lies in `graph`
    pub fn is_graph_empty(&self, graph: NodeId) -> StatementStoreResult<bool> {
        let mut pattern = [NONE; 4];
        pattern[GRAPH] = graph;
        Ok(!self.exists_triples(pattern[0], pattern[1], pattern[2], pattern[3])?)
    }

    /// Number of stored statements
    pub fn len(&self) -> usize {
        self.index(IndexOrder::Spog).len()
    }

    /// Net changes since the last [`StatementStore::mark_clean`], in quad order.
    pub fn changes(&self) -> Vec<QuadChange> {
        let mut changes: Vec<QuadChange> = self
            .journal
            .iter()
            .map(|(quad, added)| {
                if *added {
                    QuadChange::Add(*quad)
                } else {
                    QuadChange::Remove(*quad)
                }
            })
            .collect();
        changes.sort_unstable();
        changes
    }

    /// Check if the phase has unrecorded changes
    pub fn is_dirty(&self) -> bool {
        !self.journal.is_empty()
    }

    /// Forget pending changes once they are durable.
    pub fn mark_clean(&mut self) {
        self.journal.clear();
    }
}
