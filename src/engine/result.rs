// ABOUTME: Capability invocation responses and instruction-level result aggregation
// ABOUTME: Defines the immutable response type, per-task reports, and rollup status logic

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::metrics::CapabilityMetrics;

use super::task::{Task, TaskKind, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Immutable result of one capability invocation, including retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub execution_time: Duration,
    pub retries: u32,
    pub metrics: Option<CapabilityMetrics>,
}

impl Response {
    pub fn success(
        data: Value,
        execution_time: Duration,
        retries: u32,
        metrics: Option<CapabilityMetrics>,
    ) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(data),
            error: None,
            execution_time,
            retries,
            metrics,
        }
    }

    pub fn error(
        error: impl Into<String>,
        execution_time: Duration,
        retries: u32,
        metrics: Option<CapabilityMetrics>,
    ) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: None,
            error: Some(error.into()),
            execution_time,
            retries,
            metrics,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// What the scheduler hands back for one task: the task's terminal status
/// folded together with the capability response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub execution_time: Duration,
    pub retry_count: u32,
}

impl TaskReport {
    pub fn from_response(task: &Task, response: Response) -> Self {
        let status = if response.is_success() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        Self {
            task_id: task.task_id.clone(),
            kind: task.kind,
            status,
            data: response.data,
            error: response.error,
            execution_time: response.execution_time,
            retry_count: response.retries,
        }
    }

    pub fn failed(task: &Task, error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            task_id: task.task_id.clone(),
            kind: task.kind,
            status: TaskStatus::Failed,
            data: None,
            error: Some(error.into()),
            execution_time,
            retry_count: task.retry_count,
        }
    }

    /// A task never invoked because one of its dependencies ended in a
    /// terminal non-success state.
    pub fn skipped(task: &Task, failed_dependency: TaskKind) -> Self {
        Self {
            task_id: task.task_id.clone(),
            kind: task.kind,
            status: TaskStatus::Skipped,
            data: None,
            error: Some(format!("dependency_failed: {}", failed_dependency)),
            execution_time: Duration::ZERO,
            retry_count: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl std::fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstructionStatus::Success => write!(f, "success"),
            InstructionStatus::PartialSuccess => write!(f, "partial_success"),
            InstructionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InstructionSummary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
}

/// Aggregate outcome of one processed instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionResult {
    pub run_id: String,
    pub status: InstructionStatus,
    pub timestamp: DateTime<Utc>,
    pub results: IndexMap<TaskKind, TaskReport>,
    pub execution_time: Duration,
    pub summary: InstructionSummary,
}

impl InstructionResult {
    pub fn from_reports(
        run_id: String,
        results: IndexMap<TaskKind, TaskReport>,
        execution_time: Duration,
    ) -> Self {
        let total = results.len();
        let completed = results.values().filter(|r| r.is_completed()).count();
        let failed = results
            .values()
            .filter(|r| r.status == TaskStatus::Failed)
            .count();
        let skipped = results
            .values()
            .filter(|r| r.status == TaskStatus::Skipped)
            .count();

        let status = if completed > 0 && failed + skipped == 0 {
            InstructionStatus::Success
        } else if completed > 0 {
            InstructionStatus::PartialSuccess
        } else {
            InstructionStatus::Failed
        };

        Self {
            run_id,
            status,
            timestamp: Utc::now(),
            results,
            execution_time,
            summary: InstructionSummary {
                total_tasks: total,
                completed_tasks: completed,
                failed_tasks: failed,
                skipped_tasks: skipped,
            },
        }
    }

    pub fn report(&self, kind: TaskKind) -> Option<&TaskReport> {
        self.results.get(&kind)
    }

    /// Joined error detail across failed and skipped tasks, for the audit
    /// record.
    pub fn error_detail(&self) -> Option<String> {
        let parts: Vec<String> = self
            .results
            .values()
            .filter(|r| r.status != TaskStatus::Completed)
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.kind, e)))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}
