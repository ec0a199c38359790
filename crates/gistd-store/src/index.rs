// ABOUTME: SQLite-backed index of finished runs for list and lookup queries.
// ABOUTME: Always rebuildable from the JSONL journal; a queryable cache, not the source of truth.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use gistd_core::RunStatus;

use crate::store::RunRecord;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Summary row for one run, matching the list endpoint's shape.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub wid: String,
    pub name: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: String,
}

/// SQLite index over finished runs.
pub struct RunIndex {
    conn: Connection,
}

impl RunIndex {
    /// Open or create the index database at the given path.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory index, for tests.
    pub fn in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, IndexError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                wid TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Upsert one run row from a full record.
    pub fn upsert(&self, record: &RunRecord) -> Result<(), IndexError> {
        self.conn.execute(
            "INSERT INTO runs (wid, name, status, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(wid) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                started_at = excluded.started_at,
                finished_at = excluded.finished_at",
            params![
                record.wid,
                record.name,
                record.status.label(),
                record.started_at.to_rfc3339(),
                record.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up one run summary by workflow id.
    pub fn get(&self, wid: &str) -> Result<Option<RunSummary>, IndexError> {
        let row = self
            .conn
            .query_row(
                "SELECT wid, name, status, started_at, finished_at
                 FROM runs WHERE wid = ?1",
                params![wid],
                Self::row_to_summary,
            )
            .optional()?;
        Ok(row)
    }

    /// List run summaries, most recently started first.
    pub fn list(&self, limit: u32) -> Result<Vec<RunSummary>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT wid, name, status, started_at, finished_at
             FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::row_to_summary)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunSummary> {
        let status_str: String = row.get(2)?;
        let status = match status_str.as_str() {
            "running" => RunStatus::Running,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Completed,
        };
        Ok(RunSummary {
            wid: row.get(0)?,
            name: row.get(1)?,
            status,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
        })
    }
}
