use rusqlite::Connection;

pub(crate) const SCHEMA_VERSION: i64 = 1;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    // Edges are deleted with their owning row.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cells (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          sheet_id TEXT NOT NULL,
          cell_id TEXT NOT NULL,
          raw_value TEXT NOT NULL,
          result REAL NOT NULL,
          UNIQUE (sheet_id, cell_id)
        );

        CREATE INDEX IF NOT EXISTS idx_cells_sheet ON cells(sheet_id);

        CREATE TABLE IF NOT EXISTS cell_dependencies (
          cell_row_id INTEGER NOT NULL REFERENCES cells(id) ON DELETE CASCADE,
          dependency TEXT NOT NULL,
          PRIMARY KEY (cell_row_id, dependency)
        );

        CREATE INDEX IF NOT EXISTS idx_cell_dependencies_dependency
          ON cell_dependencies(dependency);
        "#,
    )?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |r| r.get(0))?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}
