// ABOUTME: Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use millwright::analyzer::error::{AnalyzerError, Result};
use millwright::analyzer::{Analysis, ExtractedInfo, InstructionAnalyzer, RuleBasedAnalyzer};
use millwright::TaskKind;

/// Analyzer that returns the same analysis for every instruction.
pub struct StaticAnalyzer {
    pub analysis: Analysis,
}

#[async_trait]
impl InstructionAnalyzer for StaticAnalyzer {
    async fn analyze(&self, _instruction: &str) -> Result<Analysis> {
        Ok(self.analysis.clone())
    }
}

/// Analyzer that always errors, to exercise the fallback path.
pub struct FailingAnalyzer;

#[async_trait]
impl InstructionAnalyzer for FailingAnalyzer {
    async fn analyze(&self, _instruction: &str) -> Result<Analysis> {
        Err(AnalyzerError::Backend("model unavailable".to_string()))
    }
}

pub fn analysis_for(required: Vec<TaskKind>, quantity: u64) -> Analysis {
    Analysis {
        main_task: *required.last().unwrap_or(&TaskKind::Order),
        required_agents: required,
        dependencies: RuleBasedAnalyzer::default_dependencies(),
        extracted_info: ExtractedInfo {
            quantity: Some(quantity),
            ..ExtractedInfo::default()
        },
        priority: None,
        constraints: Vec::new(),
    }
}

pub fn analysis_with_dependencies(
    required: Vec<TaskKind>,
    dependencies: IndexMap<TaskKind, Vec<TaskKind>>,
) -> Analysis {
    Analysis {
        dependencies,
        ..analysis_for(required, 100)
    }
}
