//! quadstore
//!
//! A transactional RDF quad store. Terms are mapped to 64-bit node
//! identifiers by a node pool, statements are stored as quads of those
//! identifiers in six orderings, and both are updated together through
//! two-phase commit.
//!
//! # Components
//!
//! - [`string_pool`]: term values to node identifiers and back, ordered by
//!   type category, datatype and a value comparator
//! - [`statement`]: quad indexes answering wildcard patterns in index order
//! - [`xa`]: resolver sessions and the XA resource that drives them
//! - [`content`]: RDF/XML and N3 parsing on a producer thread feeding a
//!   bounded queue
//! - [`persistence`]: RocksDB storage behind a write-ahead transaction log
//!
//! ## Example Usage
//!
//! ```no_run
//! use quadstore::{Database, DatabaseConfig, NONE};
//! use oxrdf::{NamedNode, Term};
//!
//! let db = Database::open(DatabaseConfig::new("./data")).unwrap();
//! let mut session = db.new_session();
//! session.refresh().unwrap();
//!
//! let term = |iri: &str| Term::NamedNode(NamedNode::new(iri).unwrap());
//! let s = session.localize(&term("http://example.org/alice")).unwrap();
//! let p = session.localize(&term("http://xmlns.com/foaf/0.1/knows")).unwrap();
//! let o = session.localize(&term("http://example.org/bob")).unwrap();
//! let g = session.localize(&term("http://example.org/graph")).unwrap();
//! session.add_triple(s, p, o, g).unwrap();
//! session.commit().unwrap();
//!
//! let snapshot = db.snapshot().unwrap();
//! let rows: Vec<_> = snapshot.find_tuples(s, NONE, NONE, NONE).unwrap().collect();
//! assert_eq!(rows.len(), 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod avl;
pub mod config;
pub mod content;
pub mod database;
pub mod node;
pub mod persistence;
pub mod resolver;
pub mod statement;
pub mod string_pool;
pub mod util;
pub mod xa;

// Re-export main types for convenience
pub use config::{ConfigError, DatabaseConfig, ParserConfig};

pub use content::{
    Content, ContentError, ContentLoader, ContentResult, FileContent, LoadStats, MemoryContent,
    ParseError, Parser, ParserState, RdfFormat,
};

pub use database::{Database, DatabaseError, DatabaseResult, DatabaseSnapshot, DatabaseStats};

pub use node::{NodeId, Quad, MIN_NODE, NONE};

pub use persistence::{PersistenceError, PersistenceManager, PersistenceResult};

pub use resolver::{probe_is_empty, StatementSource};

pub use statement::{
    IndexOrder, StatementStore, StatementStoreError, StatementStoreResult, StoreTuples, TuplesError,
};

pub use string_pool::{SpObject, StringPool, StringPoolError, StringPoolResult, TypeCategory, XsdType};

pub use xa::{
    SessionError, SessionResult, StoreXaResource, XaError, XaFlags, XaResolverSession, XaResult,
    XaVote, Xid,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
