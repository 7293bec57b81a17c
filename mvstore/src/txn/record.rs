//! Transaction Records - Per-transaction metadata and state machine
//!
//! A record carries the transaction's isolation level, its lifecycle state,
//! the set of transactions that were in progress when it began, and the keys
//! it has read and written. The latter two feed the visibility predicate and
//! the commit-time conflict check.

use std::collections::BTreeMap;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::isolation::IsolationLevel;

use super::TxnId;

/// Transaction history: every transaction ever begun, in ascending id order.
/// Records are inserted once and never removed.
pub type TxnHistory = BTreeMap<TxnId, TxnRecord>;

// ============================================================================
// Transaction State
// ============================================================================

/// Lifecycle state of a transaction
///
/// `InProgress` transitions to exactly one of `Committed` or `RolledBack`;
/// both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnState {
    /// Transaction is executing operations
    InProgress,
    /// Transaction committed; its writes are permanent
    Committed,
    /// Transaction rolled back; its writes are never visible to committed-read levels
    RolledBack,
}

impl TxnState {
    /// Whether the state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxnState::InProgress)
    }
}

// ============================================================================
// Transaction Record
// ============================================================================

/// Metadata for one transaction
#[derive(Debug, Clone)]
pub struct TxnRecord {
    /// Monotonic id, assigned at begin
    pub id: TxnId,
    /// Isolation level, fixed at begin
    pub isolation: IsolationLevel,
    /// Current lifecycle state
    pub state: TxnState,
    /// Ids of transactions that were in progress at the moment this one
    /// began. Never contains `id` itself and never mutates afterwards.
    /// Consulted only by Repeatable Read and stricter.
    pub inprogress: AHashSet<TxnId>,
    /// Keys observed by `get`; consulted by Serializable commit validation
    pub readset: AHashSet<String>,
    /// Keys mutated by `set`/`delete`; consulted by Snapshot and Serializable
    /// commit validation
    pub writeset: AHashSet<String>,
}

impl TxnRecord {
    /// Create an in-progress record with empty read and write sets
    pub fn new(id: TxnId, isolation: IsolationLevel, inprogress: AHashSet<TxnId>) -> Self {
        debug_assert!(!inprogress.contains(&id));
        Self {
            id,
            isolation,
            state: TxnState::InProgress,
            inprogress,
            readset: AHashSet::new(),
            writeset: AHashSet::new(),
        }
    }

    /// Record a key observed by `get`
    pub fn record_read(&mut self, key: &str) {
        self.readset.insert(key.to_string());
    }

    /// Record a key mutated by `set` or `delete`
    pub fn record_write(&mut self, key: &str) {
        self.writeset.insert(key.to_string());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let mut concurrent = AHashSet::new();
        concurrent.insert(1);
        concurrent.insert(2);

        let txn = TxnRecord::new(3, IsolationLevel::Serializable, concurrent);
        assert_eq!(txn.id, 3);
        assert_eq!(txn.state, TxnState::InProgress);
        assert!(txn.inprogress.contains(&1));
        assert!(!txn.inprogress.contains(&3));
        assert!(txn.readset.is_empty());
        assert!(txn.writeset.is_empty());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TxnState::InProgress.is_terminal());
        assert!(TxnState::Committed.is_terminal());
        assert!(TxnState::RolledBack.is_terminal());
    }

    #[test]
    fn test_read_write_tracking() {
        let mut txn = TxnRecord::new(1, IsolationLevel::Snapshot, AHashSet::new());
        txn.record_read("x");
        txn.record_write("y");
        txn.record_write("y");

        assert!(txn.readset.contains("x"));
        assert!(txn.writeset.contains("y"));
        assert_eq!(txn.writeset.len(), 1);
    }
}
