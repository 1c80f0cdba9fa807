//! Transaction coordination
//!
//! [`XaResolverSession`] runs one writer's transaction against the node pool
//! and the statement store. [`StoreXaResource`] drives a session through the
//! two-phase commit protocol on behalf of an external transaction manager.

pub mod resource;
pub mod session;

pub use resource::{StoreXaResource, XaError, XaFlags, XaResult, XaVote, Xid};
pub use session::XaResolverSession;

use crate::persistence::PersistenceError;
use crate::statement::StatementStoreError;
use crate::string_pool::StringPoolError;
use thiserror::Error;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// A write was attempted outside a refreshed transaction
    #[error("Session has no open transaction")]
    NotInTransaction,

    /// A write was attempted after prepare
    #[error("Transaction is prepared and can no longer change")]
    Prepared,

    /// Another session holds the writer slot
    #[error("Session {0} holds the write transaction")]
    WriterBusy(u64),

    /// The database was closed
    #[error("Database is closed")]
    Closed,

    /// Committed state may be inconsistent
    #[error("Fatal transaction error: {0}")]
    Fatal(String),

    #[error("String pool error: {0}")]
    StringPool(#[from] StringPoolError),

    #[error("Statement store error: {0}")]
    Statement(#[from] StatementStoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
