// ABOUTME: Error types for capability invocations
// ABOUTME: Distinguishes recoverable (retryable) failures from permanent ones

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    #[error("unsupported operation '{0}'")]
    UnsupportedOperation(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("upstream data unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal capability error: {0}")]
    Internal(String),
}

impl CapabilityError {
    /// Only transient conditions are worth retrying; malformed input or an
    /// unsupported operation will fail identically on every attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CapabilityError::Transient(_) | CapabilityError::UpstreamUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
