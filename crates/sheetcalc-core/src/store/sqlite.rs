use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::{CellData, CellRecord, CellWrite, Store, StoreTx, Upserted, schema};
use crate::error::{Result, SheetError};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed cell store.
///
/// One connection is shared behind a mutex; a transaction holds the lock
/// from `BEGIN IMMEDIATE` until commit or rollback.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_path_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, busy_timeout)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a SQLite URI such as `file:name?mode=memory&cache=shared`.
    pub fn open_uri(uri: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(uri, flags)?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SheetError::Storage("connection lock poisoned".to_string()))
    }
}

impl Store for SqliteStore {
    fn get_cell(&self, sheet_id: &str, cell_id: &str) -> Result<CellData> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT raw_value, result FROM cells WHERE sheet_id = ?1 AND cell_id = ?2",
                params![sheet_id, cell_id],
                |r| {
                    Ok(CellData {
                        value: r.get(0)?,
                        result: r.get(1)?,
                    })
                },
            )
            .optional()?;

        match row {
            Some(cell) if !cell.value.is_empty() => Ok(cell),
            _ => Err(SheetError::NotFound(format!("cell {}/{}", sheet_id, cell_id))),
        }
    }

    fn get_sheet(&self, sheet_id: &str) -> Result<BTreeMap<String, CellData>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT cell_id, raw_value, result FROM cells WHERE sheet_id = ?1")?;
        let rows = stmt.query_map(params![sheet_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                CellData {
                    value: r.get(1)?,
                    result: r.get(2)?,
                },
            ))
        })?;

        let mut cells = BTreeMap::new();
        for row in rows {
            let (cell_id, data) = row?;
            cells.insert(cell_id, data);
        }

        if cells.is_empty() {
            return Err(SheetError::NotFound(format!("sheet {}", sheet_id)));
        }
        Ok(cells)
    }

    fn begin(&self) -> Result<Box<dyn StoreTx + '_>> {
        let conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so the existence check in
        // `upsert` can't race another writer.
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }
}

struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreTx for SqliteTx<'_> {
    fn batch_results(
        &mut self,
        sheet_id: &str,
        cell_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, f64>> {
        if cell_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT cell_id, result FROM cells WHERE sheet_id = ?1 AND cell_id IN ({})",
            placeholders(2, cell_ids.len())
        );
        let args = std::iter::once(sheet_id).chain(cell_ids.iter().map(String::as_str));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?))
        })?;

        let mut results = HashMap::new();
        for row in rows {
            let (cell_id, result) = row?;
            results.insert(cell_id, result);
        }
        Ok(results)
    }

    fn upsert(&mut self, cell: &CellWrite) -> Result<Upserted> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM cells WHERE sheet_id = ?1 AND cell_id = ?2",
                params![cell.sheet_id, cell.cell_id],
                |r| r.get(0),
            )
            .optional()?;

        let id: i64 = self.conn.query_row(
            r#"
            INSERT INTO cells (sheet_id, cell_id, raw_value, result) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (sheet_id, cell_id)
            DO UPDATE SET raw_value = excluded.raw_value, result = excluded.result
            RETURNING id
            "#,
            params![cell.sheet_id, cell.cell_id, cell.raw_value, cell.result],
            |r| r.get(0),
        )?;

        self.conn.execute(
            "DELETE FROM cell_dependencies WHERE cell_row_id = ?1",
            params![id],
        )?;
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO cell_dependencies (cell_row_id, dependency) VALUES (?1, ?2)",
            )?;
            for dependency in &cell.dependencies {
                stmt.execute(params![id, dependency])?;
            }
        }

        debug!(
            sheet = %cell.sheet_id,
            cell = %cell.cell_id,
            id,
            updated = existing.is_some(),
            "upserted cell"
        );
        Ok(Upserted {
            id,
            updated: existing.is_some(),
        })
    }

    fn dependencies_of(&mut self, sheet_id: &str, cell_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT d.dependency
            FROM cell_dependencies d
            JOIN cells c ON c.id = d.cell_row_id
            WHERE c.sheet_id = ?1 AND c.cell_id = ?2
            ORDER BY d.dependency
            "#,
        )?;
        let rows = stmt.query_map(params![sheet_id, cell_id], |r| r.get::<_, String>(0))?;

        let mut deps = Vec::new();
        for dep in rows {
            deps.push(dep?);
        }
        Ok(deps)
    }

    fn dependent_ids(&mut self, sheet_id: &str, cell_id: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT DISTINCT c.id
            FROM cell_dependencies d
            JOIN cells c ON c.id = d.cell_row_id
            WHERE c.sheet_id = ?1 AND d.dependency = ?2
            ORDER BY c.id
            "#,
        )?;
        let rows = stmt.query_map(params![sheet_id, cell_id], |r| r.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    fn records_by_ids(&mut self, ids: &[i64]) -> Result<Vec<CellRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, sheet_id, cell_id, raw_value, result FROM cells WHERE id IN ({}) ORDER BY id",
            placeholders(1, ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |r| {
            Ok(CellRecord {
                id: r.get(0)?,
                sheet_id: r.get(1)?,
                cell_id: r.get(2)?,
                raw_value: r.get(3)?,
                result: r.get(4)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                debug!(%err, "rollback failed");
            }
        }
    }
}
