//! Typed failures that repositories raise inside `anyhow::Error` so use cases
//! can tell them apart with `downcast_ref`.

use thiserror::Error;

/// The database aborted a serializable transaction; the whole unit of work may be retried.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("serializable transaction conflict")]
pub struct TransactionConflict;

/// The storage-level exclusion constraint rejected an overlapping booking.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("court time range already held by another booking")]
pub struct SlotOverlap;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate record rejected by constraint {constraint}")]
pub struct DuplicateRecord {
    pub constraint: String,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("wallet balance {balance_cents} cannot cover {required_cents}")]
pub struct InsufficientLedgerBalance {
    pub balance_cents: i64,
    pub required_cents: i64,
}
