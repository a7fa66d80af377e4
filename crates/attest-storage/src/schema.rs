use rusqlite::Connection;
use std::collections::HashSet;

pub(crate) const LOCK_FLAG_KEY: &str = "mapping_lock";

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS active_protocols (
          protocol TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS row_col_map (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          protocol TEXT NOT NULL,
          row_index INTEGER NOT NULL,
          original_column TEXT NOT NULL,
          renamed_column TEXT,
          rename_row INTEGER NOT NULL DEFAULT 0,
          description TEXT,
          UNIQUE (protocol, row_index, original_column)
        );

        CREATE INDEX IF NOT EXISTS idx_row_col_map_protocol ON row_col_map(protocol);

        CREATE TABLE IF NOT EXISTS attestation_log (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          site TEXT NOT NULL,
          timestamp TEXT NOT NULL,          -- '%Y-%m-%d %H:%M:%S', local time
          protocols_reviewed JSON NOT NULL, -- JSON array of protocol names
          protocols_completed JSON NOT NULL,
          description TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_attestation_log_timestamp ON attestation_log(timestamp);

        CREATE TABLE IF NOT EXISTS site_list (
          site TEXT PRIMARY KEY,
          position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_flags (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );
        "#,
    )?;

    // Mapping tables written before renames and notes were stored per record lack these columns.
    ensure_row_col_map_columns(conn)?;

    Ok(())
}

fn ensure_row_col_map_columns(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(row_col_map)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut existing = HashSet::new();
    for name in rows {
        existing.insert(name?);
    }

    if !existing.contains("renamed_column") {
        conn.execute("ALTER TABLE row_col_map ADD COLUMN renamed_column TEXT", [])?;
    }
    if !existing.contains("rename_row") {
        conn.execute(
            "ALTER TABLE row_col_map ADD COLUMN rename_row INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    if !existing.contains("description") {
        conn.execute("ALTER TABLE row_col_map ADD COLUMN description TEXT", [])?;
    }

    Ok(())
}
