// ABOUTME: Instruction history records, query filters, and the sink trait

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::engine::result::InstructionStatus;
use crate::engine::task::TaskKind;

pub use memory::InMemoryHistory;

const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history storage failed: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// One audit entry per processed instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub task_type: TaskKind,
    pub input: String,
    pub result: Value,
    pub status: InstructionStatus,
    pub execution_time_seconds: f64,
    pub agents_involved: Vec<TaskKind>,
    pub error: Option<String>,
}

/// Filters for reading history back. All fields optional; an empty query
/// returns the most recent records up to the limit.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub task_type: Option<TaskKind>,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_QUERY_LIMIT)
    }

    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if let Some(start) = self.start_time {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if record.timestamp > end {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if record.task_type != task_type {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<()>;

    /// Matching records, newest first.
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>>;
}
