use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use conduit_types::{Process, ProcessId, ProcessState};

use crate::{DEFAULT_LEASE_DURATION_MS, ProcessStore, StoreError, now_millis};

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: i64,
}

impl Lease {
    fn is_active(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug)]
struct Entry {
    process: Process,
    lease: Option<Lease>,
}

/// Process store kept in a mutex-guarded map. Used by tests and by deployments
/// that do not configure a database path.
#[derive(Debug)]
pub struct InMemoryProcessStore {
    entries: Mutex<HashMap<ProcessId, Entry>>,
    holder: String,
    lease_duration_ms: i64,
}

impl Default for InMemoryProcessStore {
    fn default() -> Self {
        Self::new("in-memory", DEFAULT_LEASE_DURATION_MS)
    }
}

impl InMemoryProcessStore {
    #[must_use]
    pub fn new(holder: impl Into<String>, lease_duration_ms: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            holder: holder.into(),
            lease_duration_ms,
        }
    }

    /// Number of stored processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is currently leased by anyone.
    #[must_use]
    pub fn is_leased(&self, id: &ProcessId) -> bool {
        let now = now_millis();
        self.entries()
            .get(id)
            .and_then(|entry| entry.lease.as_ref())
            .is_some_and(|lease| lease.is_active(now))
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ProcessId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProcessStore for InMemoryProcessStore {
    fn find(&self, id: &ProcessId) -> Result<Option<Process>, StoreError> {
        Ok(self.entries().get(id).map(|entry| entry.process.clone()))
    }

    fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<Process>, StoreError> {
        Ok(self
            .entries()
            .values()
            .find(|entry| entry.process.correlation_id() == Some(correlation_id))
            .map(|entry| entry.process.clone()))
    }

    fn save(&self, process: &mut Process) -> Result<(), StoreError> {
        let now = now_millis();
        let mut entries = self.entries();

        if let Some(existing) = entries.get(process.id()) {
            if existing.process.revision() != process.revision() {
                return Err(StoreError::Conflict {
                    id: process.id().clone(),
                });
            }
            if let Some(lease) = &existing.lease
                && lease.is_active(now)
                && lease.holder != self.holder
            {
                return Err(StoreError::Leased {
                    id: process.id().clone(),
                    holder: lease.holder.clone(),
                });
            }
        }

        process.set_revision(process.revision() + 1);
        entries.insert(
            process.id().clone(),
            Entry {
                process: process.clone(),
                lease: None,
            },
        );
        Ok(())
    }

    fn next_for_state(&self, state: ProcessState, max: usize) -> Result<Vec<Process>, StoreError> {
        let now = now_millis();
        let mut entries = self.entries();

        let mut candidates: Vec<&mut Entry> = entries
            .values_mut()
            .filter(|entry| entry.process.state() == state)
            .filter(|entry| !entry.lease.as_ref().is_some_and(|l| l.is_active(now)))
            .collect();
        candidates.sort_by_key(|entry| entry.process.updated_at());

        let batch = candidates
            .into_iter()
            .take(max)
            .map(|entry| {
                entry.lease = Some(Lease {
                    holder: self.holder.clone(),
                    expires_at: now + self.lease_duration_ms,
                });
                entry.process.clone()
            })
            .collect();
        Ok(batch)
    }

    fn release_lease(&self, id: &ProcessId) -> Result<(), StoreError> {
        if let Some(entry) = self.entries().get_mut(id)
            && entry
                .lease
                .as_ref()
                .is_some_and(|lease| lease.holder == self.holder)
        {
            entry.lease = None;
        }
        Ok(())
    }
}
