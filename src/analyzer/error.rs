// ABOUTME: Error types for instruction analysis

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("instruction text is empty")]
    EmptyInstruction,

    #[error("analysis backend failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
