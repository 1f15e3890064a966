//! Embedded metrics store
//!
//! Three append-only tables backed by SQLite: system samples, per-container
//! samples and the container action audit trail. Rows are never updated or
//! deleted.

use crate::error::{ReconcileError, Result};
use crate::models::{
    ActionRecord, ContainerSnapshot, PersistedAction, PersistedSample, SystemSnapshot,
};
use crate::observability::ReconcilerMetrics;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS system_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    total_memory_kb INTEGER,
    free_memory_kb INTEGER,
    used_memory_kb INTEGER,
    total_processes INTEGER,
    running_processes INTEGER,
    sleeping_processes INTEGER
);
CREATE TABLE IF NOT EXISTS container_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    pid INTEGER,
    name TEXT,
    cmdline TEXT,
    vsz_kb INTEGER,
    rss_kb INTEGER,
    memory_percent REAL,
    cpu_percent REAL,
    status TEXT DEFAULT 'active'
);
CREATE TABLE IF NOT EXISTS container_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    action TEXT,
    container_pid INTEGER,
    container_name TEXT,
    reason TEXT
);
";

/// Handle to the SQLite metrics database
///
/// The connection lives behind a mutex so the handle can be shared with the
/// shutdown path; `close` is idempotent and later writes fail with
/// [`ReconcileError::StoreClosed`].
pub struct MetricsStore {
    conn: Mutex<Option<Connection>>,
    metrics: ReconcilerMetrics,
}

impl MetricsStore {
    /// Open (or create) the database and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| ReconcileError::StoreOpen {
            path: path.to_path_buf(),
            source,
        };

        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;

        info!(path = %path.display(), "Metrics store opened");
        Ok(Self::from_connection(conn))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let open_err = |source| ReconcileError::StoreOpen {
            path: ":memory:".into(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            metrics: ReconcilerMetrics::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A poisoned lock only means a writer panicked mid-statement; the
        // connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(ReconcileError::StoreClosed)?;
        f(conn)
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&self) {
        if let Some(conn) = self.lock().take() {
            if let Err((_, e)) = conn.close() {
                warn!(error = %e, "Error closing metrics store");
            } else {
                info!("Metrics store closed");
            }
        }
    }

    pub fn try_record_system_sample(&self, snapshot: &SystemSnapshot) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO system_metrics
                    (total_memory_kb, free_memory_kb, used_memory_kb,
                     total_processes, running_processes, sleeping_processes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    snapshot.memory.total_kb as i64,
                    snapshot.memory.free_kb as i64,
                    snapshot.memory.used_kb as i64,
                    snapshot.process_summary.total as i64,
                    snapshot.process_summary.running as i64,
                    snapshot.process_summary.sleeping as i64,
                ],
            )
            .map_err(|source| ReconcileError::StoreWrite {
                table: "system_metrics",
                source,
            })?;
            Ok(())
        })
    }

    /// Write every container of the snapshot in one transaction
    pub fn try_record_container_samples(&self, snapshot: &ContainerSnapshot) -> Result<usize> {
        let write_err = |source| ReconcileError::StoreWrite {
            table: "container_metrics",
            source,
        };

        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(write_err)?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO container_metrics
                            (pid, name, cmdline, vsz_kb, rss_kb, memory_percent, cpu_percent)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )
                    .map_err(write_err)?;

                for container in &snapshot.containers {
                    stmt.execute(params![
                        container.pid,
                        container.name,
                        container.cmdline,
                        container.vsz_kb as i64,
                        container.rss_kb as i64,
                        container.memory_percent,
                        container.cpu_percent,
                    ])
                    .map_err(write_err)?;
                }
            }
            tx.commit().map_err(write_err)?;
            Ok(snapshot.containers.len())
        })
    }

    pub fn try_record_action(&self, action: &ActionRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO container_actions (action, container_pid, container_name, reason)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    action.action.as_str(),
                    action.container_pid,
                    action.container_name,
                    action.reason,
                ],
            )
            .map_err(|source| ReconcileError::StoreWrite {
                table: "container_actions",
                source,
            })?;
            Ok(())
        })
    }

    /// Best-effort system sample write; failures are logged
    pub fn record_system_sample(&self, snapshot: &SystemSnapshot) {
        if let Err(e) = self.try_record_system_sample(snapshot) {
            self.metrics.inc_store_write_errors();
            warn!(error = %e, "Failed to store system metrics");
        }
    }

    /// Best-effort container sample write; failures are logged
    pub fn record_container_samples(&self, snapshot: &ContainerSnapshot) {
        match self.try_record_container_samples(snapshot) {
            Ok(rows) => debug!(rows, "Stored container metrics"),
            Err(e) => {
                self.metrics.inc_store_write_errors();
                warn!(
                    error = %e,
                    containers = snapshot.containers.len(),
                    "Failed to store container metrics"
                );
            }
        }
    }

    /// Best-effort audit write; failures are logged
    pub fn record_action(&self, action: &ActionRecord) {
        if let Err(e) = self.try_record_action(action) {
            self.metrics.inc_store_write_errors();
            warn!(
                error = %e,
                container_pid = action.container_pid,
                container_name = %action.container_name,
                "Failed to record container action"
            );
        }
    }

    pub fn latest_system_sample(&self) -> Result<Option<PersistedSample>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, timestamp, total_memory_kb, free_memory_kb, used_memory_kb,
                        total_processes, running_processes, sleeping_processes
                 FROM system_metrics ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(PersistedSample {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        total_memory_kb: row.get::<_, i64>(2)? as u64,
                        free_memory_kb: row.get::<_, i64>(3)? as u64,
                        used_memory_kb: row.get::<_, i64>(4)? as u64,
                        total_processes: row.get::<_, i64>(5)? as u64,
                        running_processes: row.get::<_, i64>(6)? as u64,
                        sleeping_processes: row.get::<_, i64>(7)? as u64,
                    })
                },
            )
            .optional()
            .map_err(|source| ReconcileError::StoreWrite {
                table: "system_metrics",
                source,
            })
        })
    }

    /// Most recent actions, newest first
    pub fn recent_actions(&self, limit: usize) -> Result<Vec<PersistedAction>> {
        let read_err = |source| ReconcileError::StoreWrite {
            table: "container_actions",
            source,
        };

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, timestamp, action, container_pid, container_name, reason
                     FROM container_actions ORDER BY id DESC LIMIT ?1",
                )
                .map_err(read_err)?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok(PersistedAction {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        action: row.get(2)?,
                        container_pid: row.get(3)?,
                        container_name: row.get(4)?,
                        reason: row.get(5)?,
                    })
                })
                .map_err(read_err)?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_err)
        })
    }

    pub fn system_sample_count(&self) -> Result<u64> {
        self.count("system_metrics")
    }

    pub fn container_sample_count(&self) -> Result<u64> {
        self.count("container_metrics")
    }

    pub fn action_count(&self) -> Result<u64> {
        self.count("container_actions")
    }

    fn count(&self, table: &'static str) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(|source| ReconcileError::StoreWrite { table, source })
        })
    }
}
