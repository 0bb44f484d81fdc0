//! SQLite-backed task store.
//!
//! One `tasks` table, one connection behind a mutex. Every call runs on the
//! blocking pool and commits before it returns, so the scheduler and a probe
//! in the same process see each other's writes immediately.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::domain::{StatusCounts, TaskId, TaskRecord, TaskStatus, TaskType, TreadleError};
use crate::ports::{Clock, SystemClock, TaskStore};

/// Fixed-width so that text order equals time order.
const TS_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Also accepts rows written by `CURRENT_TIMESTAMP` (no fraction).
const TS_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    type        TEXT NOT NULL,
    status      TEXT NOT NULL CHECK (status IN (
                    'pending', 'running', 'done', 'failed',
                    'testing', 'test_failed', 'test_success')),
    value       TEXT,
    create_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    update_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_tasks_status_create_time ON tasks (status, create_time);
";

const SELECT_COLUMNS: &str = "SELECT id, type, status, value, create_time, update_time FROM tasks";

pub struct SqliteTaskStore {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open (or create) the database file, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TreadleError> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TreadleError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TreadleError::StoreIo(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        Self::bootstrap(conn, Some(path.to_path_buf()), clock)
    }

    pub fn in_memory() -> Result<Self, TreadleError> {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self, TreadleError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, None, clock)
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn bootstrap(
        conn: Connection,
        path: Option<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TreadleError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = ?path, "task store ready");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, TreadleError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, TreadleError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TreadleError::StoreIo("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| TreadleError::StoreIo(format!("store worker failed: {e}")))?
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn add_task(
        &self,
        task_type: TaskType,
        value: serde_json::Value,
    ) -> Result<TaskId, TreadleError> {
        let now = format_ts(self.clock.now());
        let value = serde_json::to_string(&value)
            .map_err(|e| TreadleError::InvalidPayload(e.to_string()))?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (type, status, value, create_time, update_time)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![task_type.as_str(), TaskStatus::Pending.as_str(), value, now],
            )?;
            Ok(TaskId::new(conn.last_insert_rowid()))
        })
        .await
    }

    async fn fetch_pending(&self) -> Result<Vec<TaskRecord>, TreadleError> {
        self.with_conn(|conn| {
            let sql =
                format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY create_time ASC, id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![TaskStatus::Pending.as_str()], RawRow::read)?;
            collect_records(rows)
        })
        .await
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), TreadleError> {
        let now = format_ts(self.clock.now());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let changed = match status.predecessors().first() {
                Some(from) => tx.execute(
                    "UPDATE tasks
                     SET status = ?1, update_time = MAX(?2, create_time)
                     WHERE id = ?3 AND status = ?4",
                    params![status.as_str(), now, id.get(), from.as_str()],
                )?,
                None => 0,
            };
            if changed == 0 {
                let current: Option<String> = tx
                    .query_row(
                        "SELECT status FROM tasks WHERE id = ?1",
                        params![id.get()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return match current {
                    None => Err(TreadleError::TaskNotFound(id)),
                    Some(current) => Err(TreadleError::InvalidTransition {
                        id,
                        from: parse_status(&current)?,
                        to: status,
                    }),
                };
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_task(&self, id: TaskId) -> Result<TaskRecord, TreadleError> {
        self.with_conn(move |conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
            let raw = conn
                .query_row(&sql, params![id.get()], RawRow::read)
                .optional()?;
            raw.ok_or(TreadleError::TaskNotFound(id))?.into_record()
        })
        .await
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskRecord>, TreadleError> {
        self.with_conn(move |conn| match status {
            Some(status) => {
                let sql = format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY id ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![status.as_str()], RawRow::read)?;
                collect_records(rows)
            }
            None => {
                let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], RawRow::read)?;
                collect_records(rows)
            }
        })
        .await
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, TreadleError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = StatusCounts::default();
            for row in rows {
                let (status, n) = row?;
                let n = usize::try_from(n).map_err(|_| {
                    TreadleError::StoreIo(format!("status count '{n}' out of range"))
                })?;
                counts.add(parse_status(&status)?, n);
            }
            Ok(counts)
        })
        .await
    }
}

/// Column values as stored, before domain conversion.
struct RawRow {
    id: i64,
    task_type: String,
    status: String,
    value: Option<String>,
    create_time: Option<String>,
    update_time: Option<String>,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_type: row.get(1)?,
            status: row.get(2)?,
            value: row.get(3)?,
            create_time: row.get(4)?,
            update_time: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<TaskRecord, TreadleError> {
        let create_time = parse_ts(self.create_time.as_deref())?;
        let update_time = parse_ts(self.update_time.as_deref())?;
        Ok(TaskRecord {
            id: TaskId::new(self.id),
            task_type: TaskType::new(self.task_type),
            status: parse_status(&self.status)?,
            value: decode_value(self.value),
            create_time,
            update_time: update_time.max(create_time),
        })
    }
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> Result<Vec<TaskRecord>, TreadleError> {
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// The payload column is opaque; text that is not JSON is handed to the
/// handler as a string and rejected there.
fn decode_value(raw: Option<String>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Null,
        Some(text) => {
            serde_json::from_str(&text).unwrap_or_else(|_| serde_json::Value::String(text))
        }
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus, TreadleError> {
    raw.parse::<TaskStatus>()
        .map_err(|e| TreadleError::StoreIo(e.to_string()))
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_WRITE_FORMAT).to_string()
}

fn parse_ts(raw: Option<&str>) -> Result<DateTime<Utc>, TreadleError> {
    let raw = raw.ok_or_else(|| TreadleError::StoreIo("missing timestamp".to_string()))?;
    NaiveDateTime::parse_from_str(raw, TS_READ_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TreadleError::StoreIo(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::store_contract;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn store_with_clock() -> (SqliteTaskStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 7, 21, 22, 13, 0).unwrap(),
        ));
        (SqliteTaskStore::in_memory_with_clock(clock.clone()).unwrap(), clock)
    }

    #[tokio::test]
    async fn add_then_fetch_includes_new_pending_task() {
        let (store, _) = store_with_clock();
        store_contract::add_then_fetch_includes_new_pending_task(&store).await;
    }

    #[tokio::test]
    async fn fetch_is_ordered_by_create_time() {
        let (store, clock) = store_with_clock();
        store_contract::fetch_is_ordered_by_create_time(&store, &clock).await;
    }

    #[tokio::test]
    async fn fetch_excludes_non_pending() {
        let (store, _) = store_with_clock();
        store_contract::fetch_excludes_non_pending(&store).await;
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let (store, _) = store_with_clock();
        store_contract::missing_ids_are_reported(&store).await;
    }

    #[tokio::test]
    async fn transitions_are_compare_and_set() {
        let (store, _) = store_with_clock();
        store_contract::transitions_are_compare_and_set(&store).await;
    }

    #[tokio::test]
    async fn update_time_never_precedes_create_time() {
        let (store, clock) = store_with_clock();
        store_contract::update_time_never_precedes_create_time(&store, &clock).await;
    }

    #[tokio::test]
    async fn listing_and_counts() {
        let (store, _) = store_with_clock();
        store_contract::listing_and_counts(&store).await;
    }

    #[tokio::test]
    async fn rows_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("task.sqlite");

        let id = {
            let store = SqliteTaskStore::open(&path).unwrap();
            let id = store
                .add_task(TaskType::new("print"), serde_json::json!({"message": "persist"}))
                .await
                .unwrap();
            store.update_status(id, TaskStatus::Running).await.unwrap();
            id
        };

        let reopened = SqliteTaskStore::open(&path).unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        let record = reopened.get_task(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Running);
        assert_eq!(record.value["message"], "persist");

        let next = reopened
            .add_task(TaskType::new("print"), serde_json::json!({}))
            .await
            .unwrap();
        assert!(next > id);
    }

    #[tokio::test]
    async fn legacy_rows_without_fractional_seconds_are_readable() {
        let (store, _) = store_with_clock();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO tasks (type, status, value) \
                     VALUES ('print', 'pending', 'not json')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let pending = store.fetch_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].value, serde_json::Value::String("not json".into()));
    }

    #[test]
    fn timestamps_keep_text_and_time_order_aligned() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1500);
        assert!(format_ts(a) < format_ts(b));
        assert_eq!(format_ts(a).len(), format_ts(b).len());
        assert_eq!(parse_ts(Some(&format_ts(b))).unwrap(), b);
        assert!(parse_ts(Some("2025-01-01 09:00:00")).is_ok());
        assert!(parse_ts(None).is_err());
    }
}
