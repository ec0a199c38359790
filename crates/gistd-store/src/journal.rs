// ABOUTME: Append-only JSONL journal of finished workflow runs.
// ABOUTME: Crash-safe append, sequential replay, and repair for truncated files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::RunRecord;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An append-only JSONL journal backed by a file.
/// Each line is a single JSON-serialized RunRecord followed by a newline.
pub struct JsonlJournal {
    path: PathBuf,
    file: File,
}

impl JsonlJournal {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or create) a journal file at the given path, creating parent
    /// directories if needed. The file is opened in append mode.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append a single record as one JSON line and fsync to disk.
    pub fn append(&mut self, record: &RunRecord) -> Result<(), JournalError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.file, "{}", json)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay all records from a journal file, in append order.
    /// Empty lines are skipped; a missing file yields an empty list.
    pub fn replay(path: &Path) -> Result<Vec<RunRecord>, JournalError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: RunRecord = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }

    /// Repair a potentially corrupted journal by keeping only complete,
    /// parseable lines. Atomic temp-file + fsync + rename. Returns the
    /// count of valid records retained.
    pub fn repair(path: &Path) -> Result<usize, JournalError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut valid_lines: Vec<String> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if serde_json::from_str::<RunRecord>(&line).is_ok() {
                valid_lines.push(line);
            }
        }

        let count = valid_lines.len();

        let tmp_path = path.with_extension("jsonl.tmp");
        let mut tmp_file = File::create(&tmp_path)?;
        for line in &valid_lines {
            writeln!(tmp_file, "{}", line)?;
        }
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, path)?;

        // Fsync the parent directory so the rename itself is durable.
        if let Some(parent) = path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(count)
    }
}
