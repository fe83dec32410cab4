//! Process persistence.
//!
//! The store exclusively owns persisted process state. Callers get snapshots:
//! [`ProcessStore::find`] and [`ProcessStore::next_for_state`] return owned copies,
//! and only [`ProcessStore::save`] writes them back.
//!
//! # Concurrency
//!
//! Two mechanisms make concurrent progression safe without in-process locks:
//!
//! - **Optimistic revisions.** Every saved record carries a revision. `save`
//!   writes only if the stored revision still equals the caller's, otherwise it
//!   fails with [`StoreError::Conflict`] and writes nothing.
//! - **Leases.** `next_for_state` marks every returned record as leased to this
//!   store's holder until `save`, `release_lease`, or lease expiry. Leased records
//!   are never handed out twice.

mod error;
mod memory;
#[cfg(any(test, feature = "testing"))]
mod recording;
mod sqlite;
mod sqlite_util;

use conduit_types::{Process, ProcessId, ProcessState};

pub use error::{CorruptRecord, StoreError};
pub use memory::InMemoryProcessStore;
#[cfg(any(test, feature = "testing"))]
pub use recording::{RecordingStore, StoreCall};
pub use sqlite::SqliteProcessStore;

/// Lease duration used when none is configured.
pub const DEFAULT_LEASE_DURATION_MS: i64 = 60_000;

pub trait ProcessStore: Send + Sync {
    /// Point lookup. No side effects.
    fn find(&self, id: &ProcessId) -> Result<Option<Process>, StoreError>;

    /// Lookup by the peer-assigned correlation id.
    fn find_by_correlation_id(&self, correlation_id: &str)
    -> Result<Option<Process>, StoreError>;

    /// Upsert with conflict detection.
    ///
    /// On success the caller's instance is updated to the new revision and any
    /// lease on the record is released.
    fn save(&self, process: &mut Process) -> Result<(), StoreError>;

    /// Lease up to `max` unleased processes currently in `state`, oldest
    /// `updated_at` first.
    fn next_for_state(&self, state: ProcessState, max: usize) -> Result<Vec<Process>, StoreError>;

    /// Drop this holder's lease on `id` without writing the record.
    fn release_lease(&self, id: &ProcessId) -> Result<(), StoreError>;
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
