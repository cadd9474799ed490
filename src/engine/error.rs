// ABOUTME: Error types for orchestration engine operations
// ABOUTME: Covers graph construction, resource admission, and dispatch failures

use thiserror::Error;

use super::task::TaskKind;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cyclic dependency among task kinds: {remaining:?}")]
    CyclicDependency { remaining: Vec<TaskKind> },

    #[error("task kind '{kind}' depends on itself")]
    SelfDependency { kind: TaskKind },

    #[error("no capability registered for task kind '{kind}'")]
    UnknownCapability { kind: TaskKind },

    #[error("scheduler shut down before task '{task_id}' completed")]
    SchedulerClosed { task_id: String },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] crate::analyzer::AnalyzerError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("task '{task_id}' already holds an allocation")]
    AlreadyAllocated { task_id: String },

    #[error("release requested for unknown task '{task_id}'")]
    UnknownAllocation { task_id: String },

    #[error("requirement for task '{task_id}' exceeds remaining capacity")]
    InsufficientCapacity { task_id: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
