// ABOUTME: Millwright: instruction orchestration engine
// ABOUTME: Analyzes business instructions and runs them as dependency-ordered capability tasks

pub mod analyzer;
pub mod capability;
pub mod config;
pub mod engine;
pub mod history;
pub mod orchestrator;

pub use analyzer::{Analysis, InstructionAnalyzer, RuleBasedAnalyzer};
pub use capability::{Capability, CapabilityRegistry, RetryPolicy};
pub use config::Config;
pub use engine::{
    InstructionResult, InstructionStatus, Priority, ResourceRequirement, TaskGraphBuilder,
    TaskKind, TaskScheduler, TaskStatus,
};
pub use history::{HistoryQuery, HistoryRecord, HistorySink, InMemoryHistory};
pub use orchestrator::{DispatchMode, Orchestrator};

pub type Result<T> = anyhow::Result<T>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
