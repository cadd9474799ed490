// ABOUTME: Instruction analysis types and the analyzer trait
// ABOUTME: Turns free-text business instructions into a routed, structured analysis

pub mod error;
pub mod rules;

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::task::{Priority, TaskKind};

pub use error::AnalyzerError;
pub use rules::RuleBasedAnalyzer;

/// Fields pulled out of the instruction text. Everything is optional;
/// absent fields simply do not constrain downstream capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedInfo {
    pub quantity: Option<u64>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
    pub gpu: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_address: Option<String>,
    pub customer_id: Option<String>,
}

/// Structured reading of one instruction: which capability it is mainly
/// about, which capabilities must run, and in what dependency order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub main_task: TaskKind,
    pub required_agents: Vec<TaskKind>,
    pub dependencies: IndexMap<TaskKind, Vec<TaskKind>>,
    pub extracted_info: ExtractedInfo,
    pub priority: Option<Priority>,
    pub constraints: Vec<String>,
}

impl Analysis {
    /// Minimal analysis used when the real analyzer fails or times out:
    /// treat the instruction as a plain order so the run still produces a
    /// result instead of nothing.
    pub fn fallback() -> Self {
        Self {
            main_task: TaskKind::Order,
            required_agents: vec![TaskKind::Order],
            dependencies: IndexMap::new(),
            extracted_info: ExtractedInfo::default(),
            priority: None,
            constraints: Vec::new(),
        }
    }

    /// Analyzer-assigned priority, or one derived from the extracted
    /// quantity when the analyzer stayed silent.
    pub fn effective_priority(&self) -> Priority {
        self.priority
            .unwrap_or_else(|| Priority::from_quantity(self.extracted_info.quantity.unwrap_or(0)))
    }
}

#[async_trait]
pub trait InstructionAnalyzer: Send + Sync {
    async fn analyze(&self, instruction: &str) -> error::Result<Analysis>;
}
