//! SQLite-backed process store.
//!
//! Revisions and leases are enforced inside `IMMEDIATE` transactions, so several
//! connector instances may share one database file: each opens its own store with
//! a distinct lease holder.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use conduit_types::{Process, ProcessId, ProcessRecord, ProcessState, ProcessType, Role};

use crate::sqlite_util::prepare_db_path;
use crate::{CorruptRecord, ProcessStore, StoreError, now_millis};

const COLUMNS: &str = "id, process_type, role, state, state_count, created_at, updated_at, \
     error_detail, correlation_id, counter_party_id, counter_party_address, protocol, payload, \
     integrity_token, revision";

pub struct SqliteProcessStore {
    db: Mutex<Connection>,
    holder: String,
    lease_duration_ms: i64,
}

impl SqliteProcessStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS processes (
            id TEXT PRIMARY KEY,
            process_type TEXT NOT NULL,
            role TEXT NOT NULL,
            state INTEGER NOT NULL,
            state_count INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            error_detail TEXT,
            correlation_id TEXT,
            counter_party_id TEXT NOT NULL,
            counter_party_address TEXT NOT NULL,
            protocol TEXT NOT NULL,
            payload TEXT NOT NULL,
            integrity_token TEXT,
            revision INTEGER NOT NULL,
            lease_holder TEXT,
            lease_expires_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_processes_state
        ON processes(process_type, state, updated_at);

        CREATE INDEX IF NOT EXISTS idx_processes_correlation
        ON processes(correlation_id);
    ";

    /// Open or create the process database at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        holder: impl Into<String>,
        lease_duration_ms: i64,
    ) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open process store at {}", path.display()))?;
        Self::initialize(db, holder.into(), lease_duration_ms)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(holder: impl Into<String>, lease_duration_ms: i64) -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory process store")?;
        Self::initialize(db, holder.into(), lease_duration_ms)
    }

    fn initialize(db: Connection, holder: String, lease_duration_ms: i64) -> Result<Self> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA busy_timeout=5000;")
            .context("Failed to set process store pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create process store schema")?;
        tracing::debug!(holder = %holder, "Process store initialized");
        Ok(Self {
            db: Mutex::new(db),
            holder,
            lease_duration_ms,
        })
    }

    /// Number of stored processes.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM processes", [], |row| row.get(0))
            .map_err(|e| StoreError::backend("Failed to count processes", e))?;
        Ok(n as usize)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_where(&self, clause: &str, key: &str) -> Result<Option<Process>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM processes WHERE {clause} LIMIT 1");
        let record = self
            .conn()
            .query_row(&sql, [key], read_record)
            .optional()
            .map_err(|e| StoreError::backend("Failed to query process", e))?;
        record.map(restore).transpose()
    }
}

/// Raw row before enum parsing; parse errors become `StoreError::Corrupt`.
struct RawRow {
    record: ProcessRecord,
    process_type: String,
    role: String,
    payload: String,
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let state_count: i64 = row.get(4)?;
    let revision: i64 = row.get(14)?;
    Ok(RawRow {
        record: ProcessRecord {
            id: row.get(0)?,
            process_type: ProcessType::Negotiation,
            role: Role::Consumer,
            state: row.get(3)?,
            state_count: state_count as u32,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            error_detail: row.get(7)?,
            correlation_id: row.get(8)?,
            counter_party_id: row.get(9)?,
            counter_party_address: row.get(10)?,
            protocol: row.get(11)?,
            payload: serde_json::Value::Null,
            integrity_token: row.get(13)?,
            revision: revision as u64,
        },
        process_type: row.get(1)?,
        role: row.get(2)?,
        payload: row.get(12)?,
    })
}

fn restore(raw: RawRow) -> Result<Process, StoreError> {
    let id = raw.record.id.clone();
    decode(raw).map_err(|source| StoreError::Corrupt { id, source })
}

fn decode(raw: RawRow) -> Result<Process, CorruptRecord> {
    let RawRow {
        mut record,
        process_type,
        role,
        payload,
    } = raw;
    record.process_type = ProcessType::parse(&process_type)
        .ok_or(CorruptRecord::UnknownProcessType(process_type))?;
    record.role = Role::parse(&role).ok_or(CorruptRecord::UnknownRole(role))?;
    record.payload = serde_json::from_str(&payload)?;
    Ok(Process::restore(record)?)
}

impl ProcessStore for SqliteProcessStore {
    fn find(&self, id: &ProcessId) -> Result<Option<Process>, StoreError> {
        self.find_where("id = ?1", id.as_str())
    }

    fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<Process>, StoreError> {
        self.find_where("correlation_id = ?1", correlation_id)
    }

    fn save(&self, process: &mut Process) -> Result<(), StoreError> {
        let now = now_millis();
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::backend("Failed to start save transaction", e))?;

        let current: Option<(i64, Option<String>, Option<i64>)> = tx
            .query_row(
                "SELECT revision, lease_holder, lease_expires_at FROM processes WHERE id = ?1",
                [process.id().as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| StoreError::backend("Failed to read stored revision", e))?;

        if let Some((revision, holder, expires_at)) = current {
            if revision as u64 != process.revision() {
                return Err(StoreError::Conflict {
                    id: process.id().clone(),
                });
            }
            if let (Some(holder), Some(expires_at)) = (holder, expires_at)
                && expires_at > now
                && holder != self.holder
            {
                return Err(StoreError::Leased {
                    id: process.id().clone(),
                    holder,
                });
            }
        }

        let next_revision = process.revision() + 1;
        let record = process.to_record();
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| StoreError::backend("Failed to serialize payload", e))?;
        tx.execute(
            "INSERT INTO processes (id, process_type, role, state, state_count, created_at,
                 updated_at, error_detail, correlation_id, counter_party_id, counter_party_address,
                 protocol, payload, integrity_token, revision, lease_holder, lease_expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, NULL, NULL)
             ON CONFLICT(id) DO UPDATE SET
                 state = ?4, state_count = ?5, updated_at = ?7, error_detail = ?8,
                 correlation_id = ?9, counter_party_id = ?10, counter_party_address = ?11,
                 protocol = ?12, payload = ?13, integrity_token = ?14, revision = ?15,
                 lease_holder = NULL, lease_expires_at = NULL",
            params![
                record.id,
                record.process_type.as_str(),
                record.role.as_str(),
                record.state,
                i64::from(record.state_count),
                record.created_at,
                record.updated_at,
                record.error_detail,
                record.correlation_id,
                record.counter_party_id,
                record.counter_party_address,
                record.protocol,
                payload,
                record.integrity_token,
                next_revision as i64,
            ],
        )
        .map_err(|e| StoreError::backend("Failed to write process", e))?;

        tx.commit()
            .map_err(|e| StoreError::backend("Failed to commit process", e))?;
        process.set_revision(next_revision);
        Ok(())
    }

    fn next_for_state(&self, state: ProcessState, max: usize) -> Result<Vec<Process>, StoreError> {
        let now = now_millis();
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::backend("Failed to start lease transaction", e))?;

        let raw_rows = {
            let sql = format!(
                "SELECT {COLUMNS} FROM processes
                 WHERE process_type = ?1 AND state = ?2
                   AND (lease_holder IS NULL OR lease_expires_at <= ?3)
                 ORDER BY updated_at ASC, id ASC
                 LIMIT ?4"
            );
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| StoreError::backend("Failed to prepare lease query", e))?;
            stmt.query_map(
                params![
                    state.process_type().as_str(),
                    state.code(),
                    now,
                    max as i64
                ],
                read_record,
            )
            .map_err(|e| StoreError::backend("Failed to query leasable processes", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::backend("Failed to read process row", e))?
        };

        let expires_at = now + self.lease_duration_ms;
        let mut batch = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            tx.execute(
                "UPDATE processes SET lease_holder = ?1, lease_expires_at = ?2 WHERE id = ?3",
                params![self.holder, expires_at, raw.record.id],
            )
            .map_err(|e| StoreError::backend("Failed to acquire lease", e))?;
            batch.push(restore(raw)?);
        }

        tx.commit()
            .map_err(|e| StoreError::backend("Failed to commit leases", e))?;
        Ok(batch)
    }

    fn release_lease(&self, id: &ProcessId) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE processes SET lease_holder = NULL, lease_expires_at = NULL
                 WHERE id = ?1 AND lease_holder = ?2",
                params![id.as_str(), self.holder],
            )
            .map_err(|e| StoreError::backend("Failed to release lease", e))?;
        Ok(())
    }
}
