use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle of an analysis task.
///
/// PENDING ⇄ PROCESSING while retries remain, then COMPLETED or FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Label for the client-facing report view
    pub fn report_state(&self) -> &'static str {
        match self {
            TaskStatus::Pending | TaskStatus::Processing => "processing",
            TaskStatus::Completed => "ready",
            TaskStatus::Failed => "failed",
        }
    }
}

/// One queued post-interview report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTask {
    pub id: Uuid,

    /// Session the report is for (by id only)
    pub session_id: String,

    pub status: TaskStatus,

    /// Higher runs first
    pub priority: i32,

    pub retry_count: u32,
    pub max_retries: u32,

    /// Last failure, kept across retries
    pub error_message: Option<String>,

    /// Generator's reference to the finished report
    pub report_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisTask {
    pub fn new(session_id: impl Into<String>, priority: i32, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            status: TaskStatus::Pending,
            priority,
            retry_count: 0,
            max_retries,
            error_message: None,
            report_ref: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Queue-wide counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub counts: HashMap<TaskStatus, usize>,

    /// Whether the worker is processing a task right now
    pub processing: bool,
}

impl QueueStats {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}
