// ABOUTME: Workflow run visibility: step statuses, identification, and progress reporting.
// ABOUTME: The status timeline preserves insertion order; step updates overwrite in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single step in a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Overall execution status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Identification and metadata for one workflow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    /// Workflow type name, e.g. "SummarizerOneType".
    #[serde(default)]
    pub name: String,
    /// Workflow id, assigned when the run is started.
    #[serde(default)]
    pub wid: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub namespace: String,
}

/// One (step, status) pair in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub step: String,
    pub status: WorkflowStepStatus,
}

/// Ordered step timeline for a run. Updating an existing step replaces its
/// status without changing its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTimeline {
    entries: Vec<TimelineEntry>,
}

impl StatusTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, step: &str, status: WorkflowStepStatus) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.step == step) {
            entry.status = status;
        } else {
            self.entries.push(TimelineEntry {
                step: step.to_string(),
                status,
            });
        }
    }

    pub fn get(&self, step: &str) -> Option<WorkflowStepStatus> {
        self.entries
            .iter()
            .find(|e| e.step == step)
            .map(|e| e.status)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Queryable progress snapshot of a workflow run. Input and result are
/// carried as raw JSON so runs of different workflow types share one shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunProgress {
    #[serde(default)]
    pub status_timeline: StatusTimeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Last "still alive" tick from a long-running activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
}
