use crate::schema::{self, LOCK_FLAG_KEY};
use crate::store::AttestStore;
use attest_model::{
    AttestationId, AttestationRecord, LockState, MappingRecord, NewAttestation, TIMESTAMP_FORMAT,
};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mapping records for `{protocol}` are inconsistent: {reason}")]
    InconsistentMapping { protocol: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open a SQLite URI, e.g. `file:attest?mode=memory&cache=shared` to share one in-memory
    /// database between several handles.
    pub fn open_uri(uri: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        Self::from_connection(Connection::open_with_flags(uri, flags)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl AttestStore for Storage {
    fn active_protocols(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare("SELECT protocol FROM active_protocols ORDER BY protocol")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn replace_active_protocols(&self, protocols: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM active_protocols", [])?;
        {
            let mut insert =
                tx.prepare("INSERT OR IGNORE INTO active_protocols (protocol) VALUES (?1)")?;
            for protocol in protocols {
                insert.execute(params![protocol])?;
            }
        }
        tx.commit()?;

        log::info!("active protocol selection replaced ({} protocols)", protocols.len());
        Ok(())
    }

    fn mappings(&self) -> Result<Vec<MappingRecord>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT protocol, row_index, original_column, renamed_column, rename_row, description
            FROM row_col_map
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map([], mapping_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn mappings_for(&self, protocol: &str) -> Result<Vec<MappingRecord>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT protocol, row_index, original_column, renamed_column, rename_row, description
            FROM row_col_map
            WHERE protocol = ?1
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map(params![protocol], mapping_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn replace_mappings_for(&self, protocol: &str, records: &[MappingRecord]) -> Result<()> {
        check_mapping_records(protocol, records)?;

        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM row_col_map WHERE protocol = ?1", params![protocol])?;
        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO row_col_map (
                  protocol, row_index, original_column, renamed_column, rename_row, description
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(protocol, row_index, original_column) DO UPDATE SET
                  renamed_column = excluded.renamed_column,
                  rename_row = excluded.rename_row,
                  description = excluded.description
                "#,
            )?;
            for record in records {
                insert.execute(params![
                    &record.protocol,
                    record.row_index as i64,
                    &record.original_column,
                    record.renamed_column.as_deref(),
                    record.header_row as i64,
                    record.description.as_deref(),
                ])?;
            }
        }
        tx.commit()?;

        log::info!(
            "mapping for `{protocol}` replaced: {removed} records removed, {} written",
            records.len()
        );
        Ok(())
    }

    fn clear_mappings_for(&self, protocols: &[String]) -> Result<usize> {
        if protocols.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut delete = tx.prepare("DELETE FROM row_col_map WHERE protocol = ?1")?;
            for protocol in protocols {
                removed += delete.execute(params![protocol])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn append_attestation(&self, entry: &NewAttestation) -> Result<AttestationRecord> {
        let reviewed = serde_json::to_string(&entry.protocols_reviewed)?;
        let completed = serde_json::to_string(&entry.protocols_completed)?;
        let timestamp = entry.timestamp.format(TIMESTAMP_FORMAT).to_string();

        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.execute(
            r#"
            INSERT INTO attestation_log (
              name, site, timestamp, protocols_reviewed, protocols_completed, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                &entry.name,
                &entry.site,
                timestamp,
                reviewed,
                completed,
                entry.description.as_deref()
            ],
        )?;
        let id = AttestationId(conn.last_insert_rowid());

        // Stored timestamps have second precision; hand back exactly what a reader will see.
        let mut record = entry.clone().with_id(id);
        record.timestamp = parse_timestamp(2, &timestamp)?;
        Ok(record)
    }

    fn attestations(&self) -> Result<Vec<AttestationRecord>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, timestamp, name, site, protocols_reviewed, protocols_completed, description
            FROM attestation_log
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(AttestationRecord {
                id: AttestationId(r.get(0)?),
                timestamp: parse_timestamp(1, &r.get::<_, String>(1)?)?,
                name: r.get(2)?,
                site: r.get(3)?,
                protocols_reviewed: parse_list(4, &r.get::<_, String>(4)?)?,
                protocols_completed: parse_list(5, &r.get::<_, String>(5)?)?,
                description: r.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_attestations(&self, ids: &[AttestationId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut delete = tx.prepare("DELETE FROM attestation_log WHERE id = ?1")?;
            let unique: HashSet<AttestationId> = ids.iter().copied().collect();
            for id in unique {
                removed += delete.execute(params![id.0])?;
            }
        }
        tx.commit()?;

        log::info!("deleted {removed} attestation records ({} requested)", ids.len());
        Ok(removed)
    }

    fn sites(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare("SELECT site FROM site_list ORDER BY position, site")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn replace_sites(&self, sites: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM site_list", [])?;
        {
            let mut insert =
                tx.prepare("INSERT OR IGNORE INTO site_list (site, position) VALUES (?1, ?2)")?;
            for (position, site) in sites
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .enumerate()
            {
                insert.execute(params![site, position as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn lock_state(&self) -> Result<LockState> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM app_flags WHERE key = ?1",
                params![LOCK_FLAG_KEY],
                |r| r.get(0),
            )
            .optional()?;
        Ok(LockState::from_stored(value.as_deref()))
    }

    fn set_lock_state(&self, state: LockState) -> Result<()> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.execute(
            r#"
            INSERT INTO app_flags (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![LOCK_FLAG_KEY, state.as_str()],
        )?;
        log::info!("mapping lock set to {state}");
        Ok(())
    }
}

fn check_mapping_records(protocol: &str, records: &[MappingRecord]) -> Result<()> {
    if let Some(other) = records.iter().find(|r| r.protocol != protocol) {
        return Err(StorageError::InconsistentMapping {
            protocol: protocol.to_string(),
            reason: format!("record belongs to `{}`", other.protocol),
        });
    }

    let mut header_rows = records.iter().map(|r| r.header_row);
    if let Some(first) = header_rows.next() {
        if let Some(other) = header_rows.find(|h| *h != first) {
            return Err(StorageError::InconsistentMapping {
                protocol: protocol.to_string(),
                reason: format!("header rows {first} and {other} disagree"),
            });
        }
    }

    Ok(())
}

fn mapping_from_row(r: &Row<'_>) -> rusqlite::Result<MappingRecord> {
    Ok(MappingRecord {
        protocol: r.get(0)?,
        row_index: non_negative(1, r.get(1)?)?,
        original_column: r.get(2)?,
        renamed_column: r.get(3)?,
        header_row: non_negative(4, r.get(4)?)?,
        description: r.get(5)?,
    })
}

fn non_negative(idx: usize, value: i64) -> rusqlite::Result<usize> {
    usize::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_list(idx: usize, value: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(protocol: &str, row: usize, column: &str, header_row: usize) -> MappingRecord {
        MappingRecord {
            protocol: protocol.into(),
            row_index: row,
            original_column: column.into(),
            renamed_column: None,
            header_row,
            description: None,
        }
    }

    #[test]
    fn rejects_records_for_another_protocol() {
        let storage = Storage::open_in_memory().unwrap();
        let err = storage
            .replace_mappings_for("CT Head", &[record("CT Chest", 0, "Name", 0)])
            .unwrap_err();
        assert!(matches!(err, StorageError::InconsistentMapping { .. }));
    }

    #[test]
    fn rejects_disagreeing_header_rows() {
        let storage = Storage::open_in_memory().unwrap();
        let err = storage
            .replace_mappings_for(
                "CT Head",
                &[record("CT Head", 0, "Name", 0), record("CT Head", 1, "Name", 2)],
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::InconsistentMapping { .. }));
        assert!(storage.mappings().unwrap().is_empty());
    }

    #[test]
    fn lock_flag_defaults_to_unlocked() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.lock_state().unwrap(), LockState::Unlocked);
        storage.set_lock_state(LockState::Locked).unwrap();
        assert_eq!(storage.lock_state().unwrap(), LockState::Locked);
        storage.set_lock_state(LockState::Unlocked).unwrap();
        assert_eq!(storage.lock_state().unwrap(), LockState::Unlocked);
    }

    #[test]
    fn site_list_keeps_order_and_drops_blanks() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .replace_sites(&["Overlook".into(), " ".into(), "MMC".into(), "Overlook".into()])
            .unwrap();
        assert_eq!(storage.sites().unwrap(), vec!["Overlook", "MMC"]);
    }
}
