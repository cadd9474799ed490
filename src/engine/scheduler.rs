// ABOUTME: Priority- and resource-aware task scheduler
// ABOUTME: Admits tasks against the resource pool and drains a priority wait queue on release

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::capability::CapabilityRegistry;

use super::error::EngineError;
use super::pool::{PoolStats, ResourcePool, ResourceRequirement};
use super::result::TaskReport;
use super::task::Task;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// A task parked until the pool can admit it. Ordered by priority rank,
/// then by arrival sequence, so equal-priority waiters run FIFO.
struct Waiting {
    rank: u8,
    seq: u64,
    task: Task,
    tx: oneshot::Sender<TaskReport>,
}

impl PartialEq for Waiting {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for Waiting {}

impl PartialOrd for Waiting {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiting {
    // BinaryHeap is a max-heap; reverse so the lowest (rank, seq) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.rank, other.seq).cmp(&(self.rank, self.seq))
    }
}

struct WaitQueue {
    next_seq: u64,
    waiting: BinaryHeap<Waiting>,
}

struct Inner {
    pool: ResourcePool,
    registry: Arc<CapabilityRegistry>,
    queue: Mutex<WaitQueue>,
    call_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub pool: PoolStats,
    pub queued: usize,
}

/// Runs tasks against the capability registry, bounding concurrency with
/// the resource pool. Callers await `run_task`; tasks that do not fit are
/// queued and started eagerly as running tasks release capacity.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

impl TaskScheduler {
    pub fn new(registry: Arc<CapabilityRegistry>, capacity: ResourceRequirement) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool: ResourcePool::new(capacity),
                registry,
                queue: Mutex::new(WaitQueue {
                    next_seq: 0,
                    waiting: BinaryHeap::new(),
                }),
                call_timeout: DEFAULT_CALL_TIMEOUT,
            }),
        }
    }

    /// Builder-style override; only effective before the scheduler is
    /// cloned or handed to other tasks.
    pub fn with_call_timeout(self, call_timeout: Duration) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Self {
                inner: Arc::new(Inner {
                    call_timeout,
                    ..inner
                }),
            },
            Err(shared) => Self { inner: shared },
        }
    }

    /// Run one task to a terminal report. Admission and queuing decisions
    /// happen under the queue lock so a concurrent release cannot slip
    /// between a failed allocation and the enqueue.
    pub async fn run_task(&self, task: Task) -> TaskReport {
        enum Admission {
            Run(Task),
            Wait(oneshot::Receiver<TaskReport>, Task),
            Refused(TaskReport),
        }

        let requirement = ResourceRequirement::for_kind(task.kind);

        let admission = {
            let mut queue = self.inner.queue.lock();
            match self.inner.pool.try_allocate(&task.task_id, requirement) {
                Ok(true) => Admission::Run(task),
                Ok(false) => {
                    let (tx, rx) = oneshot::channel();
                    let seq = queue.next_seq;
                    queue.next_seq += 1;
                    debug!(
                        task_id = %task.task_id,
                        kind = %task.kind,
                        seq,
                        cpu_utilization = self.inner.pool.stats().cpu_utilization(),
                        "task queued for resources"
                    );
                    let placeholder = task.clone();
                    queue.waiting.push(Waiting {
                        rank: task.priority.rank(),
                        seq,
                        task,
                        tx,
                    });
                    Admission::Wait(rx, placeholder)
                }
                Err(err) => {
                    Admission::Refused(TaskReport::failed(&task, err.to_string(), Duration::ZERO))
                }
            }
        };

        match admission {
            Admission::Run(task) => {
                // Admitted inline; execute on this caller's future.
                let task_id = task.task_id.clone();
                let report = self.inner.execute(task).await;
                Inner::release_and_drain(&self.inner, &task_id);
                report
            }
            Admission::Wait(rx, placeholder) => rx.await.unwrap_or_else(|_| {
                let err = EngineError::SchedulerClosed {
                    task_id: placeholder.task_id.clone(),
                };
                TaskReport::failed(&placeholder, err.to_string(), Duration::ZERO)
            }),
            Admission::Refused(report) => report,
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            pool: self.inner.pool.stats(),
            queued: self.inner.queue.lock().waiting.len(),
        }
    }
}

impl Inner {
    /// Invoke the capability for an admitted task. The caller is
    /// responsible for releasing the allocation afterwards.
    async fn execute(&self, mut task: Task) -> TaskReport {
        task.mark_running();
        let started = Instant::now();

        let handle = match self.registry.get(task.kind) {
            Some(handle) => handle,
            None => {
                warn!(kind = %task.kind, "no capability registered");
                let err = EngineError::UnknownCapability { kind: task.kind };
                task.mark_failed(err.to_string());
                return TaskReport::failed(&task, err.to_string(), started.elapsed());
            }
        };

        match timeout(self.call_timeout, handle.invoke(&task.parameters)).await {
            Ok(response) => TaskReport::from_response(&task, response),
            Err(_) => {
                warn!(task_id = %task.task_id, kind = %task.kind, "capability invocation timed out");
                task.mark_failed(format!(
                    "capability timed out after {:?}",
                    self.call_timeout
                ));
                TaskReport::failed(
                    &task,
                    task.error.clone().unwrap_or_default(),
                    started.elapsed(),
                )
            }
        }
    }

    /// Return a finished task's resources and start every waiter that now
    /// fits, best-priority first. Runs entirely under the queue lock so the
    /// drain sees a consistent pool.
    fn release_and_drain(inner: &Arc<Inner>, task_id: &str) {
        let mut queue = inner.queue.lock();

        if let Err(err) = inner.pool.release(task_id) {
            // Admission and release are paired one-to-one; reaching this
            // indicates scheduler state corruption.
            error!(task_id, %err, "resource release failed");
        }

        let mut still_waiting = Vec::new();
        while let Some(waiter) = queue.waiting.pop() {
            let requirement = ResourceRequirement::for_kind(waiter.task.kind);
            match inner.pool.try_allocate(&waiter.task.task_id, requirement) {
                Ok(true) => {
                    debug!(task_id = %waiter.task.task_id, "queued task admitted");
                    let inner = Arc::clone(inner);
                    tokio::spawn(async move {
                        let task_id = waiter.task.task_id.clone();
                        let report = inner.execute(waiter.task).await;
                        Inner::release_and_drain(&inner, &task_id);
                        // Receiver gone means the caller gave up waiting.
                        let _ = waiter.tx.send(report);
                    });
                }
                Ok(false) => still_waiting.push(waiter),
                Err(err) => {
                    let report =
                        TaskReport::failed(&waiter.task, err.to_string(), Duration::ZERO);
                    let _ = waiter.tx.send(report);
                }
            }
        }
        for waiter in still_waiting {
            queue.waiting.push(waiter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::error::Result as CapResult;
    use crate::capability::{Capability, CapabilityError, CapabilityStatus, RetryPolicy};
    use crate::engine::task::{Priority, TaskKind, TaskStatus};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use tokio::time::sleep;

    struct SlowCapability {
        kind: TaskKind,
        delay: Duration,
    }

    #[async_trait]
    impl Capability for SlowCapability {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        async fn process(&self, parameters: &Value) -> CapResult<Value> {
            sleep(self.delay).await;
            Ok(parameters.clone())
        }
    }

    struct FlakyCapability {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl Capability for FlakyCapability {
        fn kind(&self) -> TaskKind {
            TaskKind::Finance
        }

        async fn process(&self, _parameters: &Value) -> CapResult<Value> {
            if self.calls.fetch_add(1, AtomicOrdering::SeqCst) < self.failures {
                Err(CapabilityError::Transient("not yet".into()))
            } else {
                Ok(json!({"ok": true}))
            }
        }
    }

    fn registry_with(capability: Box<dyn Capability>) -> Arc<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            capability,
            RetryPolicy::new(3, Duration::from_millis(1)),
        );
        Arc::new(registry)
    }

    fn task(kind: TaskKind, priority: Priority) -> Task {
        Task::new(kind, json!({}), priority, vec![], 3)
    }

    #[tokio::test]
    async fn test_task_runs_and_reports() {
        let registry = registry_with(Box::new(SlowCapability {
            kind: TaskKind::Order,
            delay: Duration::from_millis(5),
        }));
        let scheduler = TaskScheduler::new(registry, ResourceRequirement::new(4.0, 4096.0));

        let report = scheduler.run_task(task(TaskKind::Order, Priority::Normal)).await;
        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(scheduler.stats().pool.allocated_tasks, 0);
    }

    #[tokio::test]
    async fn test_contention_queues_then_admits_on_release() {
        // Prediction needs 0.5 cpu; a 0.9 cpu pool fits only one at a time.
        let registry = registry_with(Box::new(SlowCapability {
            kind: TaskKind::Prediction,
            delay: Duration::from_millis(50),
        }));
        let scheduler = TaskScheduler::new(registry, ResourceRequirement::new(0.9, 100.0));

        let first = scheduler.run_task(task(TaskKind::Prediction, Priority::Normal));
        let second = scheduler.run_task(task(TaskKind::Prediction, Priority::Normal));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.status, TaskStatus::Completed);
        assert_eq!(b.status, TaskStatus::Completed);

        let stats = scheduler.stats();
        assert_eq!(stats.pool.allocated_tasks, 0);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_higher_priority_waiter_admitted_first() {
        let registry = registry_with(Box::new(SlowCapability {
            kind: TaskKind::Prediction,
            delay: Duration::from_millis(40),
        }));
        let scheduler = TaskScheduler::new(registry, ResourceRequirement::new(0.9, 100.0));

        // Occupy the pool, then queue a low- and a high-priority task.
        let blocker = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler
                    .run_task(task(TaskKind::Prediction, Priority::Normal))
                    .await
            })
        };
        sleep(Duration::from_millis(10)).await;

        let low = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                let report = scheduler
                    .run_task(task(TaskKind::Prediction, Priority::Low))
                    .await;
                (Instant::now(), report)
            })
        };
        sleep(Duration::from_millis(5)).await;
        let high = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                let report = scheduler
                    .run_task(task(TaskKind::Prediction, Priority::High))
                    .await;
                (Instant::now(), report)
            })
        };

        blocker.await.unwrap();
        let (low_done, low_report) = low.await.unwrap();
        let (high_done, high_report) = high.await.unwrap();

        assert_eq!(low_report.status, TaskStatus::Completed);
        assert_eq!(high_report.status, TaskStatus::Completed);
        // The high-priority task arrived later but finished earlier.
        assert!(high_done < low_done);
    }

    #[tokio::test]
    async fn test_retries_surface_in_report() {
        let registry = registry_with(Box::new(FlakyCapability {
            calls: AtomicU32::new(0),
            failures: 2,
        }));
        let scheduler = TaskScheduler::new(registry, ResourceRequirement::new(4.0, 4096.0));

        let report = scheduler.run_task(task(TaskKind::Finance, Priority::Normal)).await;
        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(report.retry_count, 2);
    }

    #[tokio::test]
    async fn test_unregistered_kind_fails_fast() {
        let registry = Arc::new(CapabilityRegistry::new());
        let scheduler = TaskScheduler::new(registry, ResourceRequirement::new(4.0, 4096.0));

        let report = scheduler.run_task(task(TaskKind::Planning, Priority::Normal)).await;
        assert_eq!(report.status, TaskStatus::Failed);
        let error = report.error.unwrap();
        assert!(error.contains("no capability registered"));
        assert!(error.contains("'planning'"));
        // Resources held during the failed dispatch were returned.
        assert_eq!(scheduler.stats().pool.allocated_tasks, 0);
    }

    #[tokio::test]
    async fn test_call_timeout_produces_failed_report() {
        let registry = registry_with(Box::new(SlowCapability {
            kind: TaskKind::Order,
            delay: Duration::from_secs(10),
        }));
        let scheduler = TaskScheduler::new(registry, ResourceRequirement::new(4.0, 4096.0))
            .with_call_timeout(Duration::from_millis(20));

        let report = scheduler.run_task(task(TaskKind::Order, Priority::Normal)).await;
        assert_eq!(report.status, TaskStatus::Failed);
        assert!(report.error.unwrap().contains("timed out"));
        assert_eq!(scheduler.stats().pool.allocated_tasks, 0);
    }

    #[tokio::test]
    async fn test_call_timeout_leaves_capability_in_error_not_processing() {
        let registry = registry_with(Box::new(SlowCapability {
            kind: TaskKind::Order,
            delay: Duration::from_secs(30),
        }));
        let scheduler = TaskScheduler::new(Arc::clone(&registry), ResourceRequirement::new(4.0, 4096.0))
            .with_call_timeout(Duration::from_millis(20));

        let report = scheduler.run_task(task(TaskKind::Order, Priority::Normal)).await;
        assert_eq!(report.status, TaskStatus::Failed);

        // The cancelled invocation must not leave the handle stuck reporting
        // an in-flight request.
        let status = registry.get(TaskKind::Order).unwrap().get_status().await;
        assert_eq!(status.status, CapabilityStatus::Error);
    }
}
