// ABOUTME: Orchestration engine: tasks, graph building, admission control, scheduling

pub mod error;
pub mod graph;
pub mod pool;
pub mod result;
pub mod scheduler;
pub mod task;

pub use error::{EngineError, PoolError};
pub use graph::TaskGraphBuilder;
pub use pool::{ResourcePool, ResourceRequirement};
pub use result::{InstructionResult, InstructionStatus, Response, TaskReport};
pub use scheduler::TaskScheduler;
pub use task::{Priority, Task, TaskKind, TaskStatus};
