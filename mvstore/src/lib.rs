//! mvstore - In-memory MVCC Key-Value Store
//!
//! A versioned key-value store implementing five classical isolation levels
//! (Read Uncommitted, Read Committed, Repeatable Read, Snapshot, Serializable)
//! through a single visibility predicate on value versions plus a commit-time
//! conflict check for the two strictest levels.
//!
//! Entry point is [`Database`]; all operations go through a [`Connection`],
//! which holds at most one active transaction.

pub mod connection;
pub mod database;
pub mod isolation;
pub mod storage;
pub mod txn;

// Re-export main types
pub use connection::Connection;
pub use database::Database;
pub use isolation::IsolationLevel;
pub use storage::{Version, VersionChain};
pub use txn::{TxnId, TxnRecord, TxnState};

/// Store error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// `get` found no version of the key visible to the transaction
    #[error("cannot get key that doesn't exist")]
    GetMissingKey,

    /// `delete` found no version of the key visible to the transaction
    #[error("cannot delete key that doesn't exist")]
    DeleteMissingKey,

    /// Snapshot-isolation commit validation failed
    #[error("write-write conflict")]
    WriteWriteConflict,

    /// Serializable commit validation failed
    #[error("read-write or write-write conflict")]
    ReadWriteConflict,

    /// Shell command could not be parsed
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Convenience alias used throughout the crate
pub type StoreResult<T> = Result<T, StoreError>;
