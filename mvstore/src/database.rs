//! Database - Shared state, visibility predicate, and operation executors
//!
//! The database owns the key store (key to version chain), the transaction
//! history (every transaction ever begun, in id order), the monotonic id
//! counter, and the default isolation level. All isolation semantics reduce
//! to one visibility predicate applied during newest-first chain scans, plus
//! commit-time validation for Snapshot and Serializable.
//!
//! Execution is single-threaded and cooperative: one operation runs at a
//! time and completes before the next begins. The whole state sits behind a
//! single coarse mutex so connection handles stay cheap to clone and a
//! threaded caller gets the same serial order.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use crate::connection::Connection;
use crate::isolation::IsolationLevel;
use crate::storage::{Version, VersionChain};
use crate::txn::{conflict, TxnHistory, TxnId, TxnRecord, TxnState, TXN_NONE};
use crate::{StoreError, StoreResult};

// ============================================================================
// Database Handle
// ============================================================================

/// Handle to a shared in-memory database
///
/// Cloning is cheap; all clones address the same state. Operations are
/// issued through [`Connection`]s obtained from [`Database::connect`].
#[derive(Clone)]
pub struct Database {
    state: Arc<Mutex<DatabaseState>>,
}

impl Database {
    /// Create an empty database; transactions inherit `default_isolation`
    pub fn new(default_isolation: IsolationLevel) -> Self {
        Self {
            state: Arc::new(Mutex::new(DatabaseState {
                default_isolation,
                store: AHashMap::new(),
                history: TxnHistory::new(),
                next_txn_id: 1,
            })),
        }
    }

    /// Open a new connection; each connection manages at most one
    /// transaction at a time
    pub fn connect(&self) -> Connection {
        Connection::new(self.clone())
    }

    /// The isolation level new transactions inherit
    pub fn default_isolation(&self) -> IsolationLevel {
        self.state.lock().default_isolation
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    /// Number of in-progress transactions
    pub fn active_txn_count(&self) -> usize {
        self.state.lock().count_in_state(TxnState::InProgress)
    }

    /// Number of committed transactions
    pub fn committed_txn_count(&self) -> usize {
        self.state.lock().count_in_state(TxnState::Committed)
    }

    /// Number of rolled-back transactions
    pub fn rolled_back_txn_count(&self) -> usize {
        self.state.lock().count_in_state(TxnState::RolledBack)
    }

    // ========================================================================
    // Operations (issued by Connection)
    // ========================================================================

    pub(crate) fn begin_txn(&self) -> TxnId {
        self.state.lock().begin()
    }

    pub(crate) fn commit_txn(&self, id: TxnId) -> StoreResult<()> {
        self.state.lock().commit(id)
    }

    pub(crate) fn rollback_txn(&self, id: TxnId) {
        self.state.lock().rollback(id)
    }

    pub(crate) fn get(&self, id: TxnId, key: &str) -> StoreResult<String> {
        self.state.lock().get(id, key)
    }

    pub(crate) fn set(&self, id: TxnId, key: &str, value: &str) -> StoreResult<()> {
        self.state.lock().set(id, key, value)
    }

    pub(crate) fn delete(&self, id: TxnId, key: &str) -> StoreResult<()> {
        self.state.lock().delete(id, key)
    }
}

// ============================================================================
// Database State
// ============================================================================

struct DatabaseState {
    /// Isolation level assigned to new transactions
    default_isolation: IsolationLevel,
    /// Key store: key to append-only version chain
    store: AHashMap<String, VersionChain>,
    /// Every transaction ever begun, ascending id order, never removed
    history: TxnHistory,
    /// Next free transaction id; never decremented
    next_txn_id: TxnId,
}

impl DatabaseState {
    // ========================================================================
    // Transaction Lifecycle
    // ========================================================================

    /// Allocate an id, snapshot the in-progress set, install the record
    fn begin(&mut self) -> TxnId {
        let id = self.next_txn_id;
        self.next_txn_id += 1;

        // Snapshot before installing the new record, so it excludes itself.
        let inprogress = self.inprogress_ids();

        log::debug!("starting transaction {}", id);
        self.history
            .insert(id, TxnRecord::new(id, self.default_isolation, inprogress));
        id
    }

    /// Commit, validating first under Snapshot and Serializable
    ///
    /// On conflict the transaction is rolled back before the error returns.
    fn commit(&mut self, id: TxnId) -> StoreResult<()> {
        self.assert_in_progress(id);

        let verdict = conflict::validate(&self.history, self.next_txn_id, &self.history[&id]);
        if !verdict.is_ok() {
            log::debug!("transaction {} aborted at commit: {:?}", id, verdict);
            self.finish(id, TxnState::RolledBack);
            return verdict.into_result();
        }

        self.finish(id, TxnState::Committed);
        Ok(())
    }

    /// Roll back; never fails
    fn rollback(&mut self, id: TxnId) {
        self.assert_in_progress(id);
        self.finish(id, TxnState::RolledBack);
    }

    fn finish(&mut self, id: TxnId, state: TxnState) {
        debug_assert!(state.is_terminal());
        log::debug!("completing transaction {} as {:?}", id, state);
        self.txn_mut(id).state = state;
    }

    /// Ids of all in-progress transactions
    fn inprogress_ids(&self) -> AHashSet<TxnId> {
        self.history
            .iter()
            .filter(|(_, txn)| txn.state == TxnState::InProgress)
            .map(|(id, _)| *id)
            .collect()
    }

    // ========================================================================
    // Data Operations
    // ========================================================================

    /// Return the newest version of `key` visible to the transaction
    fn get(&mut self, id: TxnId, key: &str) -> StoreResult<String> {
        self.assert_in_progress(id);
        self.txn_mut(id).record_read(key);

        let txn = self.txn(id);
        if let Some(chain) = self.store.get(key) {
            for version in chain.newest_first() {
                if self.is_visible(txn, version) {
                    return Ok(version.value.clone());
                }
            }
        }
        Err(StoreError::GetMissingKey)
    }

    /// End every visible version of `key` and append a new one
    fn set(&mut self, id: TxnId, key: &str, value: &str) -> StoreResult<()> {
        self.assert_in_progress(id);

        self.end_visible_versions(id, key);
        self.store
            .entry(key.to_string())
            .or_default()
            .push(Version::new(id, value));
        self.txn_mut(id).record_write(key);
        Ok(())
    }

    /// End every visible version of `key`; error if none was visible
    fn delete(&mut self, id: TxnId, key: &str) -> StoreResult<()> {
        self.assert_in_progress(id);

        if self.end_visible_versions(id, key) == 0 {
            return Err(StoreError::DeleteMissingKey);
        }
        self.txn_mut(id).record_write(key);
        Ok(())
    }

    /// Stamp `id` as the ender of every version of `key` the transaction can
    /// currently see, returning how many were stamped
    ///
    /// Under the store invariants at most one version per key is visible at
    /// a time, but the scan does not rely on that. A stale stamp left by a
    /// rolled-back transaction is overwritten here.
    fn end_visible_versions(&mut self, id: TxnId, key: &str) -> usize {
        let visible: Vec<usize> = {
            let txn = self.txn(id);
            match self.store.get(key) {
                Some(chain) => chain
                    .versions
                    .iter()
                    .enumerate()
                    .filter(|(_, version)| self.is_visible(txn, version))
                    .map(|(index, _)| index)
                    .collect(),
                None => Vec::new(),
            }
        };

        if let Some(chain) = self.store.get_mut(key) {
            for index in &visible {
                chain.versions[*index].set_end(id);
            }
        }
        visible.len()
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Whether `txn` may observe `version`
    ///
    /// The single source of truth for all read-side isolation semantics.
    /// Repeatable Read, Snapshot, and Serializable share one rule; the two
    /// strictest levels differ only at commit time.
    fn is_visible(&self, txn: &TxnRecord, version: &Version) -> bool {
        match txn.isolation {
            // Any live version, regardless of the writer's commit state. A
            // delete hides the version even if the deleter never commits.
            IsolationLevel::ReadUncommitted => version.is_live(),

            IsolationLevel::ReadCommitted => {
                // Writer must be self or committed.
                if version.tx_start != txn.id
                    && self.txn(version.tx_start).state != TxnState::Committed
                {
                    return false;
                }
                // A deletion counts when it is our own or its author committed.
                if !version.is_live() {
                    if version.tx_end == txn.id {
                        return false;
                    }
                    if self.txn(version.tx_end).state == TxnState::Committed {
                        return false;
                    }
                }
                true
            }

            IsolationLevel::RepeatableRead
            | IsolationLevel::Snapshot
            | IsolationLevel::Serializable => {
                // Ignore versions written by transactions that began after
                // this one, or were still running when it began.
                if version.tx_start > txn.id {
                    return false;
                }
                if txn.inprogress.contains(&version.tx_start) {
                    return false;
                }
                // Writer must be self or committed.
                if version.tx_start != txn.id
                    && self.txn(version.tx_start).state != TxnState::Committed
                {
                    return false;
                }
                // A deletion counts only when it is our own, or its author
                // committed, began before this transaction, and was not
                // running at our begin.
                if !version.is_live() {
                    if version.tx_end == txn.id {
                        return false;
                    }
                    if version.tx_end < txn.id
                        && !txn.inprogress.contains(&version.tx_end)
                        && self.txn(version.tx_end).state == TxnState::Committed
                    {
                        return false;
                    }
                }
                true
            }
        }
    }

    // ========================================================================
    // History Access
    // ========================================================================

    fn txn(&self, id: TxnId) -> &TxnRecord {
        self.history
            .get(&id)
            .expect("transaction id not in history")
    }

    fn txn_mut(&mut self, id: TxnId) -> &mut TxnRecord {
        self.history
            .get_mut(&id)
            .expect("transaction id not in history")
    }

    fn assert_in_progress(&self, id: TxnId) {
        assert_ne!(id, TXN_NONE, "operation requires a transaction");
        assert_eq!(
            self.txn(id).state,
            TxnState::InProgress,
            "transaction {} is not in progress",
            id
        );
    }

    fn count_in_state(&self, state: TxnState) -> usize {
        self.history
            .values()
            .filter(|txn| txn.state == state)
            .count()
    }
}

// ============================================================================
// Tests
// ============================================================================
