//! SQLite daily archive adapter.
//!
//! `date` is the primary key, so the at-most-one-record-per-day rule is
//! enforced by the database as well as by the archiver.

use crate::domain::archive::ArchiveRecord;
use crate::domain::error::PricedashError;
use crate::ports::archive_port::ArchivePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SqliteArchiveAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteArchiveAdapter {
    /// Opens (or creates) the database file and ensures the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PricedashError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                return Err(PricedashError::unavailable(
                    "daily archive",
                    format!("directory {} does not exist", dir.display()),
                ));
            }
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|e: r2d2::Error| PricedashError::unavailable("daily archive", e))?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, PricedashError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|e: r2d2::Error| PricedashError::unavailable("daily archive", e))?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PricedashError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PricedashError::unavailable("daily archive", e))
    }

    fn initialize_schema(&self) -> Result<(), PricedashError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS archive (
                    date TEXT PRIMARY KEY NOT NULL,
                    open REAL NOT NULL,
                    close REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL
                );",
            )
            .map_err(|e: rusqlite::Error| PricedashError::archive(e))
    }
}

impl ArchivePort for SqliteArchiveAdapter {
    fn read_records(&self) -> Result<Vec<ArchiveRecord>, PricedashError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT date, open, close, high, low FROM archive ORDER BY date ASC")
            .map_err(|e: rusqlite::Error| PricedashError::unavailable("daily archive", e))?;

        let rows = stmt
            .query_map([], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        date_str.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(ArchiveRecord {
                    date,
                    open: row.get(1)?,
                    close: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                })
            })
            .map_err(|e: rusqlite::Error| PricedashError::unavailable("daily archive", e))?;

        let mut records = Vec::new();
        for row in rows {
            match row {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping malformed archive row"),
            }
        }
        Ok(records)
    }

    fn append(&self, record: &ArchiveRecord) -> Result<(), PricedashError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| PricedashError::archive(e))?;

        let date = record.date.format("%Y-%m-%d").to_string();
        let exists: Option<String> = tx
            .query_row(
                "SELECT date FROM archive WHERE date = ?1",
                params![date],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e: rusqlite::Error| PricedashError::archive(e))?;
        if exists.is_some() {
            return Err(PricedashError::ArchiveConflict { date: record.date });
        }

        tx.execute(
            "INSERT INTO archive (date, open, close, high, low) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![date, record.open, record.close, record.high, record.low],
        )
        .map_err(|e: rusqlite::Error| PricedashError::archive(e))?;

        tx.commit()
            .map_err(|e: rusqlite::Error| PricedashError::archive(e))?;

        Ok(())
    }
}
