//! Connection - Stateful facade binding a caller to one transaction
//!
//! A connection services the six operations (`begin`, `commit`, `rollback`,
//! `get`, `set`, `delete`) against its database and tracks the single active
//! transaction. Issuing a data operation without an active transaction, or
//! `begin` with one already active, is a caller bug and panics.

use crate::database::Database;
use crate::txn::TxnId;
use crate::{StoreError, StoreResult};

/// A database connection with at most one active transaction
pub struct Connection {
    db: Database,
    txn: Option<TxnId>,
}

impl Connection {
    pub(crate) fn new(db: Database) -> Self {
        Self { db, txn: None }
    }

    /// Id of the active transaction, if any
    pub fn active_txn(&self) -> Option<TxnId> {
        self.txn
    }

    /// Start a transaction at the database's default isolation level
    pub fn begin(&mut self) -> TxnId {
        assert!(
            self.txn.is_none(),
            "connection already has a transaction in progress"
        );
        let id = self.db.begin_txn();
        self.txn = Some(id);
        id
    }

    /// Commit the active transaction
    ///
    /// Under Snapshot and Serializable this may fail validation; the
    /// transaction is then already rolled back. Either way the connection
    /// has no active transaction afterwards.
    pub fn commit(&mut self) -> StoreResult<()> {
        let id = self.take_active();
        self.db.commit_txn(id)
    }

    /// Roll back the active transaction; never fails
    pub fn rollback(&mut self) {
        let id = self.take_active();
        self.db.rollback_txn(id);
    }

    /// Read the newest visible value of `key`
    pub fn get(&mut self, key: &str) -> StoreResult<String> {
        let id = self.active();
        self.db.get(id, key)
    }

    /// Write `value` under `key`, returning the value written
    pub fn set(&mut self, key: &str, value: &str) -> StoreResult<String> {
        let id = self.active();
        self.db.set(id, key, value)?;
        Ok(value.to_string())
    }

    /// Delete `key`
    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        let id = self.active();
        self.db.delete(id, key)
    }

    // ========================================================================
    // String Command Shell
    // ========================================================================

    /// Execute one textual command, the form the interactive shell speaks
    ///
    /// Commands: `begin`, `commit`, `rollback`, `get K`, `set K V`,
    /// `delete K`. `begin` returns the new transaction id as text; commands
    /// without a result return the empty string.
    pub fn exec(&mut self, line: &str) -> StoreResult<String> {
        log::debug!("exec: {}", line);

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        match command {
            "begin" => Ok(self.begin().to_string()),
            "commit" => self.commit().map(|()| String::new()),
            "rollback" => {
                self.rollback();
                Ok(String::new())
            }
            "get" => {
                let key = Self::arg(line, parts.next())?;
                self.get(key)
            }
            "set" => {
                let key = Self::arg(line, parts.next())?;
                let value = Self::arg(line, parts.next())?;
                self.set(key, value)
            }
            "delete" => {
                let key = Self::arg(line, parts.next())?;
                self.delete(key).map(|()| String::new())
            }
            _ => Err(StoreError::InvalidCommand(line.to_string())),
        }
    }

    fn arg<'a>(line: &str, part: Option<&'a str>) -> StoreResult<&'a str> {
        part.ok_or_else(|| StoreError::InvalidCommand(line.to_string()))
    }

    fn active(&self) -> TxnId {
        self.txn
            .expect("no transaction in progress on this connection")
    }

    fn take_active(&mut self) -> TxnId {
        self.txn
            .take()
            .expect("no transaction in progress on this connection")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::IsolationLevel;

    #[test]
    fn test_read_uncommitted_dirty_reads() {
        let db = Database::new(IsolationLevel::ReadUncommitted);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        c1.begin();
        c2.begin();

        c1.set("x", "hey").unwrap();
        // Update is visible to self and, at this level, to everyone else.
        assert_eq!(c1.get("x").unwrap(), "hey");
        assert_eq!(c2.get("x").unwrap(), "hey");

        // An uncommitted delete is respected the same way.
        c1.delete("x").unwrap();
        assert_eq!(c1.get("x"), Err(StoreError::GetMissingKey));
        assert_eq!(c2.get("x"), Err(StoreError::GetMissingKey));
    }

    #[test]
    fn test_read_committed_visibility() {
        let db = Database::new(IsolationLevel::ReadCommitted);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        c1.begin();
        c2.begin();

        // Uncommitted writes are invisible to others.
        c1.set("x", "hey").unwrap();
        assert_eq!(c2.get("x"), Err(StoreError::GetMissingKey));

        // After commit they appear, even to the already-running c2.
        c1.commit().unwrap();
        assert_eq!(c2.get("x").unwrap(), "hey");

        // A third transaction's uncommitted overwrite stays invisible.
        let mut c3 = db.connect();
        c3.begin();
        c3.set("x", "yall").unwrap();
        assert_eq!(c2.get("x").unwrap(), "hey");

        // And after its rollback nothing changed.
        c3.rollback();
        assert_eq!(c2.get("x").unwrap(), "hey");

        // Our own delete hides the key from us immediately and from
        // newcomers once committed.
        c2.delete("x").unwrap();
        assert_eq!(c2.get("x"), Err(StoreError::GetMissingKey));
        c2.commit().unwrap();

        let mut c4 = db.connect();
        c4.begin();
        assert_eq!(c4.get("x"), Err(StoreError::GetMissingKey));
    }

    #[test]
    fn test_repeatable_read_hides_concurrent_commits() {
        let db = Database::new(IsolationLevel::RepeatableRead);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        c1.begin();
        c2.begin();

        // c1 was in progress when c2 began, so even its committed write
        // stays invisible to c2.
        c1.set("x", "hey").unwrap();
        c1.commit().unwrap();
        assert_eq!(c2.get("x"), Err(StoreError::GetMissingKey));

        // A transaction begun after the commit sees it.
        let mut c3 = db.connect();
        c3.begin();
        assert_eq!(c3.get("x").unwrap(), "hey");
    }

    #[test]
    fn test_snapshot_write_write_conflict() {
        let db = Database::new(IsolationLevel::Snapshot);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        let mut c3 = db.connect();
        c1.begin();
        c2.begin();
        c3.begin();

        c1.set("x", "hey").unwrap();
        c1.commit().unwrap();

        // c2 wrote the same key c1 committed concurrently: abort.
        c2.set("x", "hey").unwrap();
        assert_eq!(c2.commit(), Err(StoreError::WriteWriteConflict));
        assert!(c2.active_txn().is_none());

        // Disjoint write sets commit fine.
        c3.set("y", "no conflict").unwrap();
        c3.commit().unwrap();
    }

    #[test]
    fn test_serializable_read_write_conflict() {
        let db = Database::new(IsolationLevel::Serializable);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        let mut c3 = db.connect();
        c1.begin();
        c2.begin();
        c3.begin();

        c1.set("x", "hey").unwrap();
        c1.commit().unwrap();

        // c2's snapshot predates c1's write, so the read misses...
        assert_eq!(c2.get("x"), Err(StoreError::GetMissingKey));
        // ...but the read still overlaps c1's write set at commit.
        assert_eq!(c2.commit(), Err(StoreError::ReadWriteConflict));

        // No overlapping keys, no conflict.
        c3.set("y", "no conflict").unwrap();
        c3.commit().unwrap();
    }

    #[test]
    fn test_serializable_disjoint_keys_commute() {
        let db = Database::new(IsolationLevel::Serializable);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        c1.begin();
        c2.begin();

        c1.set("a", "1").unwrap();
        c2.set("b", "2").unwrap();
        c1.commit().unwrap();
        c2.commit().unwrap();
    }

    #[test]
    fn test_set_get_round_trip() {
        let db = Database::new(IsolationLevel::Serializable);
        let mut c = db.connect();
        c.begin();
        assert_eq!(c.set("k", "v").unwrap(), "v");
        assert_eq!(c.get("k").unwrap(), "v");

        c.delete("k").unwrap();
        assert_eq!(c.get("k"), Err(StoreError::GetMissingKey));
    }

    #[test]
    fn test_commit_clears_connection_even_on_conflict() {
        let db = Database::new(IsolationLevel::Snapshot);
        let mut c1 = db.connect();
        let mut c2 = db.connect();
        c1.begin();
        c2.begin();
        c1.set("x", "1").unwrap();
        c1.commit().unwrap();
        c2.set("x", "2").unwrap();

        assert!(c2.commit().is_err());
        assert!(c2.active_txn().is_none());

        // The connection is immediately reusable.
        c2.begin();
        assert_eq!(c2.get("x").unwrap(), "1");
        c2.commit().unwrap();
    }

    #[test]
    #[should_panic(expected = "already has a transaction")]
    fn test_double_begin_panics() {
        let db = Database::new(IsolationLevel::ReadCommitted);
        let mut c = db.connect();
        c.begin();
        c.begin();
    }

    #[test]
    #[should_panic(expected = "no transaction in progress")]
    fn test_get_without_transaction_panics() {
        let db = Database::new(IsolationLevel::ReadCommitted);
        let mut c = db.connect();
        let _ = c.get("x");
    }

    #[test]
    fn test_exec_commands() {
        let db = Database::new(IsolationLevel::ReadCommitted);
        let mut c = db.connect();

        assert_eq!(c.exec("begin").unwrap(), "1");
        assert_eq!(c.exec("set x hey").unwrap(), "hey");
        assert_eq!(c.exec("get x").unwrap(), "hey");
        assert_eq!(c.exec("delete x").unwrap(), "");
        assert_eq!(c.exec("get x"), Err(StoreError::GetMissingKey));
        assert_eq!(c.exec("commit").unwrap(), "");

        assert_eq!(c.exec("begin").unwrap(), "2");
        assert_eq!(c.exec("rollback").unwrap(), "");
    }

    #[test]
    fn test_exec_rejects_malformed_commands() {
        let db = Database::new(IsolationLevel::ReadCommitted);
        let mut c = db.connect();
        c.begin();

        assert!(matches!(c.exec("get"), Err(StoreError::InvalidCommand(_))));
        assert!(matches!(c.exec("set x"), Err(StoreError::InvalidCommand(_))));
        assert!(matches!(c.exec("frobnicate"), Err(StoreError::InvalidCommand(_))));
        assert!(matches!(c.exec(""), Err(StoreError::InvalidCommand(_))));
    }
}
