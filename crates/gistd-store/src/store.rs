// ABOUTME: RunStore: the journal and index working together under one directory.
// ABOUTME: record() appends then indexes; lookups hit the index first, full records replay the journal.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gistd_core::RunStatus;

use crate::index::{IndexError, RunIndex, RunSummary};
use crate::journal::{JournalError, JsonlJournal};

/// A finished workflow run as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub wid: String,
    /// Workflow type name, e.g. "SummarizerOneType".
    pub name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Errors from the combined store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Durable storage for finished runs: one JSONL journal plus a SQLite
/// index, both under a single data directory.
pub struct RunStore {
    journal: JsonlJournal,
    index: RunIndex,
}

impl RunStore {
    /// Open the store under `dir`, creating `runs.jsonl` and `index.db`
    /// as needed. Existing journal entries are re-indexed so the index
    /// catches up after a crash between append and upsert.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let journal_path = dir.join("runs.jsonl");
        let journal = JsonlJournal::open(&journal_path)?;
        let index = RunIndex::open(&dir.join("index.db"))?;

        for record in JsonlJournal::replay(&journal_path)? {
            index.upsert(&record)?;
        }

        Ok(Self { journal, index })
    }

    /// Persist one finished run.
    pub fn record(&mut self, record: &RunRecord) -> Result<(), StoreError> {
        self.journal.append(record)?;
        self.index.upsert(record)?;
        tracing::debug!(wid = %record.wid, status = %record.status, "run journaled");
        Ok(())
    }

    /// Full record lookup by workflow id. The index answers existence; the
    /// journal supplies the stored result payload. The last journal entry
    /// for a wid wins.
    pub fn find(&self, wid: &str) -> Result<Option<RunRecord>, StoreError> {
        if self.index.get(wid)?.is_none() {
            return Ok(None);
        }
        let records = JsonlJournal::replay(self.journal.path())?;
        Ok(records.into_iter().rev().find(|r| r.wid == wid))
    }

    /// Run summaries, most recently started first.
    pub fn list(&self, limit: u32) -> Result<Vec<RunSummary>, StoreError> {
        Ok(self.index.list(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(wid: &str, status: RunStatus) -> RunRecord {
        RunRecord {
            wid: wid.to_string(),
            name: "SummarizerOneType".to_string(),
            status,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            result: Some(serde_json::json!({ "summary": { "title": wid } })),
            error: None,
        }
    }

    #[test]
    fn record_and_find_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = RunStore::open(dir.path()).unwrap();

        store.record(&record("run-1", RunStatus::Completed)).unwrap();

        let found = store.find("run-1").unwrap().unwrap();
        assert_eq!(found.wid, "run-1");
        assert_eq!(found.result.unwrap()["summary"]["title"], "run-1");
    }

    #[test]
    fn find_unknown_is_none() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        assert!(store.find("missing").unwrap().is_none());
    }

    #[test]
    fn reopen_rebuilds_index_from_journal() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = RunStore::open(dir.path()).unwrap();
            store.record(&record("run-1", RunStatus::Completed)).unwrap();
            store.record(&record("run-2", RunStatus::Failed)).unwrap();
        }

        // Remove the index database to simulate losing the cache.
        std::fs::remove_file(dir.path().join("index.db")).unwrap();

        let store = RunStore::open(dir.path()).unwrap();
        assert_eq!(store.list(10).unwrap().len(), 2);
        assert!(store.find("run-2").unwrap().is_some());
    }

    #[test]
    fn latest_record_for_a_wid_wins() {
        let dir = TempDir::new().unwrap();
        let mut store = RunStore::open(dir.path()).unwrap();

        let mut first = record("run-1", RunStatus::Failed);
        first.error = Some("boom".to_string());
        first.result = None;
        store.record(&first).unwrap();
        store.record(&record("run-1", RunStatus::Completed)).unwrap();

        let found = store.find("run-1").unwrap().unwrap();
        assert_eq!(found.status, RunStatus::Completed);
        assert!(found.error.is_none());
    }
}
