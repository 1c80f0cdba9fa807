//! Statement store
//!
//! Stores (subject, predicate, object, graph) quads of node identifiers in
//! six orderings, answers existence and pattern queries, and hands out
//! ordered result sequences projected onto the unbound positions.

pub mod index;
pub mod store;
pub mod tuples;

pub use index::{bound_mask, IndexOrder, GRAPH, OBJECT, PREDICATE, SUBJECT};
pub use store::{QuadChange, StatementStore};
pub use tuples::{Row, StoreTuples, TuplesError, TuplesResult};

use crate::node::NodeId;
use thiserror::Error;

/// Statement store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementStoreError {
    /// The store has been closed
    #[error("Statement store is closed")]
    Closed,

    /// A statement position holds a reserved identifier
    #[error("Invalid node identifier {0} in statement")]
    InvalidNode(NodeId),

    /// An explicit index mask does not cover the bound positions
    #[error("Index mask {mask:04b} does not cover bound positions {bound:04b}")]
    BadMask { mask: u8, bound: u8 },

    /// The operation is not available on this store or phase
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Iteration failure
    #[error("Tuples error: {0}")]
    Tuples(#[from] TuplesError),
}

pub type StatementStoreResult<T> = Result<T, StatementStoreError>;
