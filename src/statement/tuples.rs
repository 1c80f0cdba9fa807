//! Result sequences

use super::index::IndexOrder;
use crate::avl::AvlCursor;
use crate::node::{NodeId, Quad, NONE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors while iterating a result sequence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TuplesError {
    /// The store was closed while the sequence was open
    #[error("Statement store closed during iteration")]
    StoreClosed,
}

pub type TuplesResult<T> = Result<T, TuplesError>;

/// A result row: the unbound node identifiers of one matching statement.
pub type Row = Vec<NodeId>;

/// Lazy, ordered, duplicate-free statements matching a pattern, projected
/// onto the pattern's unbound positions.
///
/// The sequence iterates a snapshot of the index, so writes made after it
/// was created are not visible. Call [`StoreTuples::close`] when done.
pub struct StoreTuples {
    cursor: Option<AvlCursor<Quad>>,
    order: IndexOrder,
    /// Pattern in key order
    pattern: Quad,
    prefix_len: usize,
    /// Key slots that are projected into rows
    columns: Vec<usize>,
    store_closed: Arc<AtomicBool>,
}

impl StoreTuples {
    pub(crate) fn new(
        cursor: AvlCursor<Quad>,
        order: IndexOrder,
        pattern: &Quad,
        store_closed: Arc<AtomicBool>,
    ) -> Self {
        let pattern = order.permute(pattern);
        let prefix_len = pattern.iter().take_while(|node| **node != NONE).count();
        let columns = (0..4).filter(|slot| pattern[*slot] == NONE).collect();
        Self {
            cursor: Some(cursor),
            order,
            pattern,
            prefix_len,
            columns,
            store_closed,
        }
    }

    /// Index the rows are drawn from; rows follow its order.
    pub fn index_order(&self) -> IndexOrder {
        self.order
    }

    /// Quad position (0 subject .. 3 graph) of each row column.
    pub fn column_order(&self) -> Vec<usize> {
        let positions = self.order.positions();
        self.columns.iter().map(|slot| positions[*slot]).collect()
    }

    /// Number of columns in each row
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Release the underlying cursor.
    pub fn close(&mut self) {
        self.cursor = None;
    }

    fn matches(&self, key: &Quad) -> Option<bool> {
        if key[..self.prefix_len] != self.pattern[..self.prefix_len] {
            // Past the last statement with this prefix.
            return None;
        }
        Some(
            (self.prefix_len..4)
                .all(|slot| self.pattern[slot] == NONE || self.pattern[slot] == key[slot]),
        )
    }
}

impl Iterator for StoreTuples {
    type Item = TuplesResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.as_ref()?;
        if self.store_closed.load(Ordering::Acquire) {
            self.close();
            return Some(Err(TuplesError::StoreClosed));
        }

        loop {
            let key = self.cursor.as_mut()?.next();
            let Some(key) = key else {
                self.close();
                return None;
            };
            match self.matches(&key) {
                None => {
                    self.close();
                    return None;
                }
                Some(false) => continue,
                Some(true) => {
                    if self.columns.is_empty() {
                        // Fully bound: presence is a single empty row.
                        self.close();
                    }
                    return Some(Ok(self.columns.iter().map(|slot| key[*slot]).collect()));
                }
            }
        }
    }
}
