//! Versioned Storage - Key store built from append-only version chains
//!
//! Every write appends a new [`Version`] to the key's [`VersionChain`];
//! deletes stamp an end transaction id on the visible versions. Nothing is
//! ever removed, so any transaction can reconstruct the state it is allowed
//! to see.

pub mod version;

pub use version::{Version, VersionChain};
