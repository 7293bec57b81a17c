//! Conflict Validation - Commit-time checks for Snapshot and Serializable
//!
//! A committing transaction is validated against every *relevant*
//! transaction: those in progress when it began, plus those that began after
//! it. First committer wins; only committed transactions can cause a
//! conflict, and a conflicting transaction is rolled back by the caller
//! before the error surfaces.

use ahash::AHashSet;

use crate::isolation::IsolationLevel;
use crate::{StoreError, StoreResult};

use super::record::{TxnHistory, TxnRecord, TxnState};
use super::TxnId;

// ============================================================================
// Conflict Result
// ============================================================================

/// Result of commit-time validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResult {
    /// No overlap with any relevant committed transaction; safe to commit
    NoConflict,
    /// Write set overlapped a relevant committed transaction's write set
    WriteWrite { conflicting_txn: TxnId },
    /// Read or write set overlapped a relevant committed transaction's
    /// write or read set
    ReadWrite { conflicting_txn: TxnId },
}

impl ConflictResult {
    /// Whether the result indicates no conflict
    pub fn is_ok(&self) -> bool {
        matches!(self, ConflictResult::NoConflict)
    }

    /// Convert into the typed store error
    pub fn into_result(self) -> StoreResult<()> {
        match self {
            ConflictResult::NoConflict => Ok(()),
            ConflictResult::WriteWrite { .. } => Err(StoreError::WriteWriteConflict),
            ConflictResult::ReadWrite { .. } => Err(StoreError::ReadWriteConflict),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a committing transaction against the history
///
/// Levels below Snapshot never conflict. Snapshot aborts on write-write
/// overlap; Serializable additionally aborts on read-write overlap in either
/// direction.
pub fn validate(history: &TxnHistory, next_txn_id: TxnId, txn: &TxnRecord) -> ConflictResult {
    match txn.isolation {
        IsolationLevel::Snapshot => {
            match find_conflict(history, next_txn_id, txn, write_write) {
                Some(id) => ConflictResult::WriteWrite { conflicting_txn: id },
                None => ConflictResult::NoConflict,
            }
        }
        IsolationLevel::Serializable => {
            match find_conflict(history, next_txn_id, txn, read_or_write) {
                Some(id) => ConflictResult::ReadWrite { conflicting_txn: id },
                None => ConflictResult::NoConflict,
            }
        }
        _ => ConflictResult::NoConflict,
    }
}

/// Scan the relevant transactions for a committed one satisfying `overlaps`
///
/// Relevant means: in progress when `txn` began, or begun after `txn`
/// (ids in `txn.id + 1 .. next_txn_id`). Together they are the full
/// concurrency window of `txn`.
fn find_conflict(
    history: &TxnHistory,
    next_txn_id: TxnId,
    txn: &TxnRecord,
    overlaps: fn(&TxnRecord, &TxnRecord) -> bool,
) -> Option<TxnId> {
    let concurrent = txn
        .inprogress
        .iter()
        .copied()
        .chain(txn.id + 1..next_txn_id);

    for id in concurrent {
        let Some(other) = history.get(&id) else {
            continue;
        };
        if other.state == TxnState::Committed && overlaps(txn, other) {
            return Some(id);
        }
    }
    None
}

/// Snapshot overlap rule: both transactions wrote a common key
fn write_write(txn: &TxnRecord, other: &TxnRecord) -> bool {
    sets_share_keys(&txn.writeset, &other.writeset)
}

/// Serializable overlap rule: any read-write or write-write overlap
fn read_or_write(txn: &TxnRecord, other: &TxnRecord) -> bool {
    sets_share_keys(&txn.readset, &other.writeset)
        || sets_share_keys(&txn.writeset, &other.readset)
        || sets_share_keys(&txn.writeset, &other.writeset)
}

fn sets_share_keys(a: &AHashSet<String>, b: &AHashSet<String>) -> bool {
    // Probe the smaller set against the larger one
    let (probe, target) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    probe.iter().any(|key| target.contains(key))
}

// ============================================================================
// Tests
// ============================================================================
