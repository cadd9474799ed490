// ABOUTME: Capability trait, invocation handle, and the kind-indexed registry
// ABOUTME: Handles wrap each capability with retry, metrics, and status tracking

pub mod error;
pub mod finance;
pub mod metrics;
pub mod order;
pub mod planning;
pub mod prediction;
pub mod retry;
pub mod supply_chain;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::engine::result::Response;
use crate::engine::task::TaskKind;

pub use error::CapabilityError;
pub use metrics::CapabilityMetrics;
pub use retry::RetryPolicy;

/// Product attributes extracted from an instruction, shared by the
/// parameter structs of several capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub quantity: u64,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
    pub gpu: Option<String>,
}

/// One domain capability. Implementations are stateless; retry, metrics,
/// and status live in the surrounding [`CapabilityHandle`].
#[async_trait]
pub trait Capability: Send + Sync {
    fn kind(&self) -> TaskKind;

    async fn process(&self, parameters: &Value) -> error::Result<Value>;

    /// Model-backed capabilities override this; the rest report that there
    /// is nothing to train.
    async fn train(&self, _data: &Value) -> error::Result<Value> {
        Ok(json!({
            "message": format!("capability '{}' has no trainable model", self.kind()),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Idle,
    Processing,
    Error,
}

/// Point-in-time view of one registered capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub agent_type: TaskKind,
    pub status: CapabilityStatus,
    pub metrics: CapabilityMetrics,
}

struct HandleState {
    status: CapabilityStatus,
    metrics: CapabilityMetrics,
}

/// Holds the handle state for the duration of one invocation. If the
/// invocation future is dropped before reaching a terminal status (a call
/// deadline cancels it mid-await), the guard leaves the handle in `Error`
/// instead of a stale `Processing`.
struct ProcessingGuard<'a> {
    state: MutexGuard<'a, HandleState>,
    completed: bool,
}

impl<'a> ProcessingGuard<'a> {
    fn begin(mut state: MutexGuard<'a, HandleState>) -> Self {
        state.status = CapabilityStatus::Processing;
        Self {
            state,
            completed: false,
        }
    }

    fn complete(&mut self, status: CapabilityStatus) {
        self.state.status = status;
        self.completed = true;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.state.status = CapabilityStatus::Error;
        }
    }
}

impl std::ops::Deref for ProcessingGuard<'_> {
    type Target = HandleState;

    fn deref(&self) -> &HandleState {
        &self.state
    }
}

impl std::ops::DerefMut for ProcessingGuard<'_> {
    fn deref_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }
}

/// Wraps a capability with its retry policy and mutable bookkeeping. The
/// async mutex is held for the full invocation, including backoff sleeps,
/// so requests to one capability are serialized and its metrics are
/// updated atomically with the status transitions.
pub struct CapabilityHandle {
    pub agent_id: String,
    capability: Box<dyn Capability>,
    retry: RetryPolicy,
    state: Mutex<HandleState>,
}

impl CapabilityHandle {
    pub fn new(capability: Box<dyn Capability>, retry: RetryPolicy) -> Self {
        let agent_id = format!("{}-{}", capability.kind(), uuid::Uuid::new_v4());
        Self {
            agent_id,
            capability,
            retry,
            state: Mutex::new(HandleState {
                status: CapabilityStatus::Idle,
                metrics: CapabilityMetrics::default(),
            }),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.capability.kind()
    }

    /// Run the capability against `parameters`, retrying recoverable
    /// failures per the handle's policy.
    pub async fn invoke(&self, parameters: &Value) -> Response {
        let mut state = ProcessingGuard::begin(self.state.lock().await);

        let started = Instant::now();
        let mut retries: u32 = 0;

        loop {
            let attempt_started = Instant::now();
            match self.capability.process(parameters).await {
                Ok(data) => {
                    state.metrics.record_success(attempt_started.elapsed());
                    state.complete(CapabilityStatus::Idle);
                    return Response::success(
                        data,
                        started.elapsed(),
                        retries,
                        Some(state.metrics.clone()),
                    );
                }
                Err(err) => {
                    state.metrics.record_failure(attempt_started.elapsed(), &err);
                    if self.retry.allows_retry(retries, &err) {
                        retries += 1;
                        let delay = self.retry.delay_before(retries);
                        debug!(
                            agent_id = %self.agent_id,
                            retry = retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying capability after recoverable failure"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    warn!(agent_id = %self.agent_id, error = %err, "capability invocation failed");
                    state.complete(CapabilityStatus::Error);
                    return Response::error(
                        err.to_string(),
                        started.elapsed(),
                        retries,
                        Some(state.metrics.clone()),
                    );
                }
            }
        }
    }

    pub async fn train(&self, data: &Value) -> Response {
        let started = Instant::now();
        match self.capability.train(data).await {
            Ok(out) => Response::success(out, started.elapsed(), 0, None),
            Err(err) => Response::error(err.to_string(), started.elapsed(), 0, None),
        }
    }

    pub async fn get_status(&self) -> AgentStatus {
        let state = self.state.lock().await;
        AgentStatus {
            agent_id: self.agent_id.clone(),
            agent_type: self.kind(),
            status: state.status,
            metrics: state.metrics.clone(),
        }
    }

    /// Clear metrics and any sticky error status.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.metrics.reset();
        state.status = CapabilityStatus::Idle;
    }
}

/// All registered capabilities, indexed by kind. Immutable once built, so
/// lookups need no locking.
pub struct CapabilityRegistry {
    handles: HashMap<TaskKind, Arc<CapabilityHandle>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Registry with the five built-in capabilities, all sharing one retry
    /// policy.
    pub fn with_builtin(retry: RetryPolicy) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(order::OrderCapability), retry.clone());
        registry.register(Box::new(planning::PlanningCapability), retry.clone());
        registry.register(Box::new(supply_chain::SupplyChainCapability), retry.clone());
        registry.register(Box::new(finance::FinanceCapability), retry.clone());
        registry.register(Box::new(prediction::PredictionCapability), retry);
        registry
    }

    pub fn register(&mut self, capability: Box<dyn Capability>, retry: RetryPolicy) {
        let handle = CapabilityHandle::new(capability, retry);
        self.handles.insert(handle.kind(), Arc::new(handle));
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<CapabilityHandle>> {
        self.handles.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<TaskKind> = self.handles.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub async fn statuses(&self) -> Vec<AgentStatus> {
        let mut statuses = Vec::with_capacity(self.handles.len());
        for kind in self.kinds() {
            if let Some(handle) = self.get(kind) {
                statuses.push(handle.get_status().await);
            }
        }
        statuses
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_builtin(RetryPolicy::default())
    }
}
