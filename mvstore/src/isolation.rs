//! Isolation Levels - The five supported transaction isolation levels
//!
//! Levels are ordered loosest to strictest. The three strictest levels share
//! one read-time visibility rule; Snapshot and Serializable additionally run
//! conflict validation at commit time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transaction isolation level, loosest first
///
/// The level is plain data: the visibility predicate and the commit-time
/// validation dispatch on it. A transaction's level is fixed at begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Any live (undeleted) version is readable, committed or not
    ReadUncommitted,
    /// Only versions written by committed transactions (or self) are readable
    ReadCommitted,
    /// Reads are pinned to the state as of transaction begin
    RepeatableRead,
    /// Repeatable Read plus write-write conflict detection at commit
    Snapshot,
    /// Snapshot plus read-write conflict detection at commit
    Serializable,
}

impl IsolationLevel {
    /// Whether reads are restricted to the snapshot taken at begin
    /// (Repeatable Read and stricter)
    pub fn snapshot_reads(&self) -> bool {
        *self >= IsolationLevel::RepeatableRead
    }

    /// Whether commit runs conflict validation (Snapshot and stricter)
    pub fn validates_at_commit(&self) -> bool {
        *self >= IsolationLevel::Snapshot
    }

    /// Canonical lowercase name, as accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "read-uncommitted",
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::RepeatableRead => "repeatable-read",
            IsolationLevel::Snapshot => "snapshot",
            IsolationLevel::Serializable => "serializable",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read-committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable-read" => Ok(IsolationLevel::RepeatableRead),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(format!("unknown isolation level: {}", other)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
