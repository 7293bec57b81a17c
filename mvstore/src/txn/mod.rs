//! Transactions - Records, lifecycle states, and commit-time validation
//!
//! Transaction records live in the database history forever, keyed by id.
//! Version records reference transactions by id only, so the history is the
//! single source of truth for every visibility and conflict decision.

pub mod conflict;
pub mod record;

pub use conflict::{validate, ConflictResult};
pub use record::{TxnHistory, TxnRecord, TxnState};

/// Unique transaction identifier; ids are monotonic and start at 1
pub type TxnId = u64;

/// Reserved id meaning "no transaction"
pub const TXN_NONE: TxnId = 0;
