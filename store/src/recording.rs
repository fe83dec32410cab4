//! Call-recording store decorator for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use conduit_types::{Process, ProcessId, ProcessState};

use crate::{InMemoryProcessStore, ProcessStore, StoreError};

/// One observed call against a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Find(ProcessId),
    FindByCorrelationId(String),
    /// Snapshot of the process as passed to `save` (before the revision bump).
    Save(Process),
    NextForState(ProcessState, usize),
    ReleaseLease(ProcessId),
}

/// Wraps another store and records every call.
///
/// [`RecordingStore::fail_next_saves`] makes the next `n` saves fail with
/// [`StoreError::Conflict`] without reaching the inner store, which lets tests
/// drive retry paths.
pub struct RecordingStore<S = InMemoryProcessStore> {
    inner: S,
    calls: Mutex<Vec<StoreCall>>,
    forced_conflicts: AtomicUsize,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new(InMemoryProcessStore::default())
    }
}

impl<S: ProcessStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            forced_conflicts: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Seed a process directly into the inner store, unrecorded.
    pub fn seed(&self, mut process: Process) -> Process {
        if let Err(err) = self.inner.save(&mut process) {
            panic!("seeding {} failed: {err}", process.id());
        }
        process
    }

    pub fn fail_next_saves(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.log().clone()
    }

    /// Processes passed to `save`, in call order, including forced failures.
    pub fn saves(&self) -> Vec<Process> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                StoreCall::Save(process) => Some(process.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    fn log(&self) -> MutexGuard<'_, Vec<StoreCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<S: ProcessStore> ProcessStore for RecordingStore<S> {
    fn find(&self, id: &ProcessId) -> Result<Option<Process>, StoreError> {
        self.log().push(StoreCall::Find(id.clone()));
        self.inner.find(id)
    }

    fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<Process>, StoreError> {
        self.log()
            .push(StoreCall::FindByCorrelationId(correlation_id.to_string()));
        self.inner.find_by_correlation_id(correlation_id)
    }

    fn save(&self, process: &mut Process) -> Result<(), StoreError> {
        self.log().push(StoreCall::Save(process.clone()));
        if self.take_forced_conflict() {
            return Err(StoreError::Conflict {
                id: process.id().clone(),
            });
        }
        self.inner.save(process)
    }

    fn next_for_state(&self, state: ProcessState, max: usize) -> Result<Vec<Process>, StoreError> {
        self.log().push(StoreCall::NextForState(state, max));
        self.inner.next_for_state(state, max)
    }

    fn release_lease(&self, id: &ProcessId) -> Result<(), StoreError> {
        self.log().push(StoreCall::ReleaseLease(id.clone()));
        self.inner.release_lease(id)
    }
}
