//! Node pool
//!
//! Maps RDF terms to stable node identifiers and back. Values are kept in
//! two AVL indexes per phase: one ordered by value (category, type,
//! type-specific comparator, subtype) and one ordered by node identifier.
//! Long values spill into an append-only overflow file.

pub mod comparator;
pub mod flat_file;
pub mod object;
pub mod pool;

pub use comparator::SpComparator;
pub use flat_file::FlatFile;
pub use object::{EncodedValue, IntegerKind, SpObject, XsdType, UNKNOWN_TYPE_ID};
pub use pool::{DataStruct, StringPool, MAX_DATA_SIZE};

use crate::node::NodeId;
use std::io;
use thiserror::Error;

/// Node pool errors
#[derive(Error, Debug)]
pub enum StringPoolError {
    /// The term cannot be stored
    #[error("Localize error: {0}")]
    Localize(String),

    /// The node has no value
    #[error("Globalize error: {0}")]
    Globalize(String),

    /// Bad bounds or filter for a type or range query
    #[error("Invalid pool query: {0}")]
    InvalidRange(String),

    /// I/O error on the overflow file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored entry cannot be decoded
    #[error("Corrupt pool entry for node {node}: {reason}")]
    Corrupt { node: NodeId, reason: String },
}

pub type StringPoolResult<T> = Result<T, StringPoolError>;

/// Coarse class of a pool value and the first ordering key of the indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCategory {
    Unknown,
    Blank,
    Uri,
    UntypedLiteral,
    TypedLiteral,
}

impl TypeCategory {
    /// Stable numeric id
    pub fn id(self) -> u8 {
        match self {
            TypeCategory::Unknown => 0,
            TypeCategory::Blank => 1,
            TypeCategory::Uri => 2,
            TypeCategory::UntypedLiteral => 3,
            TypeCategory::TypedLiteral => 4,
        }
    }

    /// Inverse of [`TypeCategory::id`]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(TypeCategory::Unknown),
            1 => Some(TypeCategory::Blank),
            2 => Some(TypeCategory::Uri),
            3 => Some(TypeCategory::UntypedLiteral),
            4 => Some(TypeCategory::TypedLiteral),
            _ => None,
        }
    }
}
