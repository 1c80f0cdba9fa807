//! Persistent AVL trees
//!
//! The node pool and the statement store keep their indexes in balanced
//! binary trees whose nodes are shared between phases. A phase is a clone of
//! the tree: cloning is O(1) and later mutation copies only the path from the
//! root to the modified node, so a committed phase is never disturbed by the
//! writer building the next one.
//!
//! Searches are driven by an [`AvlComparator`] rather than `Ord` because the
//! node pool comparator may need to read overflow data from disk and can
//! fail, and because boundary searches use comparators that never report
//! equality.

mod tree;

pub use tree::{AvlCursor, AvlTree};

use std::cmp::Ordering;
use std::convert::Infallible;

/// Orders a search key against values stored in an [`AvlTree`].
pub trait AvlComparator<T> {
    /// Error raised when a comparison cannot be completed.
    type Error;

    /// Compares the search key with `node`. `Less` means the key sorts before
    /// the node.
    fn compare(&mut self, node: &T) -> Result<Ordering, Self::Error>;
}

/// Comparator for values that are totally ordered by `Ord`.
pub struct KeyComparator<'a, T>(pub &'a T);

impl<T: Ord> AvlComparator<T> for KeyComparator<'_, T> {
    type Error = Infallible;

    fn compare(&mut self, node: &T) -> Result<Ordering, Infallible> {
        Ok(self.0.cmp(node))
    }
}

/// Unwraps a result whose error type is uninhabited.
pub(crate) fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
