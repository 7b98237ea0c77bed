//! DuckDB-backed key-record store.
//!
//! Records are never deleted: rows only change through `update` and
//! `update_if_status`, which the key manager uses for status transitions and
//! rotation pointers.

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use lockbox_types::{KeyId, KeyRecord, KeyRecordStore, KeyStatus, StoreError, StoreResult, UserId};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SELECT_COLUMNS: &str = "SELECT key_id, owner, wrapped_key, algorithm, status, created_at, rotated_at, replacement_key_id FROM key_records";

type RawRow = (
    String,
    String,
    Vec<u8>,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
);

#[derive(Clone)]
pub struct DuckKeyStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckKeyStore {
    /// Opens or creates a key store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(backend)?;
        // DuckDB defaults to most of system RAM per connection
        conn.execute_batch("PRAGMA memory_limit='64MB'; PRAGMA threads=1;")
            .map_err(backend)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory key store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS key_records (
                key_id VARCHAR PRIMARY KEY,
                owner VARCHAR NOT NULL,
                wrapped_key BLOB NOT NULL,
                algorithm VARCHAR NOT NULL,
                status VARCHAR NOT NULL,
                created_at BIGINT NOT NULL,
                rotated_at BIGINT,
                replacement_key_id VARCHAR
            );",
        )
        .map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn query(&self, sql: &str, args: &[&dyn duckdb::ToSql]) -> StoreResult<Vec<KeyRecord>> {
        let conn = self.conn.lock().map_err(crate::lock_poisoned)?;
        let mut stmt = conn.prepare(sql).map_err(backend)?;
        let rows: Vec<RawRow> = stmt
            .query_map(args, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(backend)?
            .collect::<Result<_, _>>()
            .map_err(backend)?;

        rows.into_iter().map(decode_row).collect()
    }
}

impl KeyRecordStore for DuckKeyStore {
    fn get(&self, key_id: &KeyId) -> StoreResult<KeyRecord> {
        let sql = format!("{SELECT_COLUMNS} WHERE key_id = ?");
        self.query(&sql, &[&key_id.as_str()])?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("key record {key_id}")))
    }

    fn create(&self, record: KeyRecord) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(crate::lock_poisoned)?;

        if stored_status(&conn, &record.key_id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "key record {} already exists",
                record.key_id
            )));
        }

        conn.execute(
            "INSERT INTO key_records (key_id, owner, wrapped_key, algorithm, status, created_at, rotated_at, replacement_key_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.key_id.as_str(),
                record.owner.to_string(),
                record.wrapped_key,
                record.algorithm,
                record.status.as_str(),
                to_nanos(record.created_at)?,
                record.rotated_at.map(to_nanos).transpose()?,
                record.replacement_key_id.as_ref().map(|k| k.as_str().to_string()),
            ],
        )
        .map_err(backend)?;

        debug!(key_id = %record.key_id, "created key record");
        Ok(())
    }

    fn update(&self, record: KeyRecord) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(crate::lock_poisoned)?;
        if write_record(&conn, &record, None)? == 0 {
            return Err(StoreError::NotFound(format!("key record {}", record.key_id)));
        }
        Ok(())
    }

    fn update_if_status(&self, record: KeyRecord, expected: KeyStatus) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(crate::lock_poisoned)?;
        if write_record(&conn, &record, Some(expected))? > 0 {
            return Ok(());
        }
        match stored_status(&conn, &record.key_id)? {
            Some(actual) => Err(StoreError::Conflict(format!(
                "key record {} is {actual}, expected {expected}",
                record.key_id
            ))),
            None => Err(StoreError::NotFound(format!("key record {}", record.key_id))),
        }
    }

    fn list_expiring_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<KeyRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status = ? AND created_at < ? ORDER BY created_at ASC"
        );
        self.query(&sql, &[&KeyStatus::Active.as_str(), &to_nanos(cutoff)?])
    }
}

const UPDATE_ROW: &str = "UPDATE key_records SET owner = ?, wrapped_key = ?, algorithm = ?, status = ?, created_at = ?, rotated_at = ?, replacement_key_id = ? WHERE key_id = ?";

/// Rewrites every column of `record`'s row, optionally only while the row
/// still has status `expected`. Returns the number of rows changed.
fn write_record(
    conn: &Connection,
    record: &KeyRecord,
    expected: Option<KeyStatus>,
) -> StoreResult<usize> {
    let owner = record.owner.to_string();
    let created_at = to_nanos(record.created_at)?;
    let rotated_at = record.rotated_at.map(to_nanos).transpose()?;
    let replacement = record.replacement_key_id.as_ref().map(|k| k.as_str().to_string());

    let result = match expected {
        None => conn.execute(
            UPDATE_ROW,
            params![
                owner,
                record.wrapped_key,
                record.algorithm,
                record.status.as_str(),
                created_at,
                rotated_at,
                replacement,
                record.key_id.as_str(),
            ],
        ),
        Some(expected) => conn.execute(
            &format!("{UPDATE_ROW} AND status = ?"),
            params![
                owner,
                record.wrapped_key,
                record.algorithm,
                record.status.as_str(),
                created_at,
                rotated_at,
                replacement,
                record.key_id.as_str(),
                expected.as_str(),
            ],
        ),
    };
    result.map_err(backend)
}

fn stored_status(conn: &Connection, key_id: &KeyId) -> StoreResult<Option<KeyStatus>> {
    let mut stmt = conn
        .prepare("SELECT status FROM key_records WHERE key_id = ?")
        .map_err(backend)?;
    let statuses: Vec<String> = stmt
        .query_map(params![key_id.as_str()], |row| row.get::<_, String>(0))
        .map_err(backend)?
        .collect::<Result<_, _>>()
        .map_err(backend)?;

    statuses
        .into_iter()
        .next()
        .map(|s| s.parse().map_err(StoreError::Backend))
        .transpose()
}

fn decode_row(row: RawRow) -> StoreResult<KeyRecord> {
    let (key_id, owner, wrapped_key, algorithm, status, created_at, rotated_at, replacement) = row;

    let owner: UserId = owner
        .parse()
        .map_err(|e| StoreError::Backend(format!("bad owner id in key record {key_id}: {e}")))?;
    let status: KeyStatus = status.parse().map_err(StoreError::Backend)?;

    Ok(KeyRecord {
        key_id: KeyId::from(key_id),
        owner,
        wrapped_key,
        algorithm,
        status,
        created_at: from_nanos(created_at)?,
        rotated_at: rotated_at.map(from_nanos).transpose()?,
        replacement_key_id: replacement.map(KeyId::from),
    })
}

// Timestamps are stored as nanoseconds since the epoch, the full precision
// of `DateTime<Utc>`. Representable range is 1677 to 2262.
fn to_nanos(t: DateTime<Utc>) -> StoreResult<i64> {
    t.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {t}")))
}

fn from_nanos(ns: i64) -> StoreResult<DateTime<Utc>> {
    const NANOS_PER_SEC: i64 = 1_000_000_000;
    DateTime::from_timestamp(ns.div_euclid(NANOS_PER_SEC), ns.rem_euclid(NANOS_PER_SEC) as u32)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {ns}")))
}

fn backend(e: duckdb::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}
