// ABOUTME: Core task types for the orchestration engine
// ABOUTME: Defines the capability-kind enum, priorities, and the per-task state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of capability kinds an instruction can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Order,
    Planning,
    SupplyChain,
    Finance,
    Prediction,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Order,
        TaskKind::Planning,
        TaskKind::SupplyChain,
        TaskKind::Finance,
        TaskKind::Prediction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Order => "order",
            TaskKind::Planning => "planning",
            TaskKind::SupplyChain => "supply_chain",
            TaskKind::Finance => "finance",
            TaskKind::Prediction => "prediction",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(TaskKind::Order),
            "planning" => Ok(TaskKind::Planning),
            "supply_chain" => Ok(TaskKind::SupplyChain),
            "finance" => Ok(TaskKind::Finance),
            "prediction" => Ok(TaskKind::Prediction),
            other => Err(format!("unknown task kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Scheduling rank: lower runs first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    /// Derive a priority from the extracted order quantity when the
    /// analyzer did not assign one.
    pub fn from_quantity(quantity: u64) -> Self {
        if quantity > 1000 {
            Priority::High
        } else if quantity > 100 {
            Priority::Normal
        } else {
            Priority::Low
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
            Priority::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// One unit of work bound to a capability. Owned by the scheduler for its
/// lifetime and discarded once folded into the instruction aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub kind: TaskKind,
    pub parameters: Value,
    pub status: TaskStatus,
    pub priority: Priority,
    pub dependencies: Vec<TaskKind>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        kind: TaskKind,
        parameters: Value,
        priority: Priority,
        dependencies: Vec<TaskKind>,
        max_retries: u32,
    ) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            kind,
            parameters,
            status: TaskStatus::Pending,
            priority,
            dependencies,
            retry_count: 0,
            max_retries,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
    }

    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.status = TaskStatus::Skipped;
        self.error = Some(reason.into());
    }
}
