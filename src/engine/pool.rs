// ABOUTME: Resource pool for task admission control
// ABOUTME: Tracks a weighted cpu/memory budget and per-task allocations under one critical section

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::PoolError;
use super::task::TaskKind;

/// Static cpu/memory weights a task of a given kind consumes while running.
/// The same shape describes the pool's total capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub cpu: f64,
    pub memory: f64,
}

impl ResourceRequirement {
    pub const fn new(cpu: f64, memory: f64) -> Self {
        Self { cpu, memory }
    }

    /// Requirement table per capability kind. Kinds without a tuned entry
    /// fall back to the default weights.
    pub fn for_kind(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Order => Self::new(0.2, 20.0),
            TaskKind::Planning => Self::new(0.3, 25.0),
            TaskKind::SupplyChain => Self::new(0.25, 25.0),
            TaskKind::Finance => Self::new(0.15, 15.0),
            TaskKind::Prediction => Self::new(0.5, 40.0),
        }
    }

    pub fn fits_within(&self, available: &ResourceRequirement) -> bool {
        self.cpu <= available.cpu && self.memory <= available.memory
    }
}

impl Default for ResourceRequirement {
    fn default() -> Self {
        Self::new(0.2, 20.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub capacity: ResourceRequirement,
    pub available: ResourceRequirement,
    pub allocated_tasks: usize,
}

impl PoolStats {
    pub fn cpu_utilization(&self) -> f64 {
        if self.capacity.cpu == 0.0 {
            0.0
        } else {
            (self.capacity.cpu - self.available.cpu) / self.capacity.cpu * 100.0
        }
    }
}

#[derive(Debug)]
struct PoolState {
    available: ResourceRequirement,
    allocated: HashMap<String, ResourceRequirement>,
}

/// Admission budget bounding how many tasks may run concurrently.
///
/// Invariant: `available + sum(allocated) == capacity` at all times. Every
/// operation runs under a single mutex so check-then-act is atomic and
/// over-admission races cannot occur.
#[derive(Debug)]
pub struct ResourcePool {
    capacity: ResourceRequirement,
    state: Mutex<PoolState>,
}

impl ResourcePool {
    pub fn new(capacity: ResourceRequirement) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                available: capacity,
                allocated: HashMap::new(),
            }),
        }
    }

    pub fn can_allocate(&self, requirement: &ResourceRequirement) -> bool {
        let state = self.state.lock();
        requirement.fits_within(&state.available)
    }

    /// Atomically check and allocate. Returns `Ok(false)` when the
    /// requirement does not fit right now (the caller should queue), and an
    /// error only when `task_id` already holds an allocation.
    pub fn try_allocate(
        &self,
        task_id: &str,
        requirement: ResourceRequirement,
    ) -> Result<bool, PoolError> {
        let mut state = self.state.lock();

        if state.allocated.contains_key(task_id) {
            return Err(PoolError::AlreadyAllocated {
                task_id: task_id.to_string(),
            });
        }
        if !requirement.fits_within(&state.available) {
            return Ok(false);
        }

        state.available.cpu -= requirement.cpu;
        state.available.memory -= requirement.memory;
        state.allocated.insert(task_id.to_string(), requirement);

        debug!(
            task_id,
            cpu = requirement.cpu,
            memory = requirement.memory,
            "allocated resources"
        );
        Ok(true)
    }

    /// Allocate or fail. Unlike `try_allocate` this treats an unsatisfiable
    /// requirement as an error; used when the caller has already decided the
    /// task must run now.
    pub fn allocate(
        &self,
        task_id: &str,
        requirement: ResourceRequirement,
    ) -> Result<(), PoolError> {
        if self.try_allocate(task_id, requirement)? {
            Ok(())
        } else {
            Err(PoolError::InsufficientCapacity {
                task_id: task_id.to_string(),
            })
        }
    }

    /// Restore a running task's weights to the pool. Releasing an id that
    /// holds no allocation fails fast rather than silently double-crediting.
    pub fn release(&self, task_id: &str) -> Result<ResourceRequirement, PoolError> {
        let mut state = self.state.lock();

        let requirement =
            state
                .allocated
                .remove(task_id)
                .ok_or_else(|| PoolError::UnknownAllocation {
                    task_id: task_id.to_string(),
                })?;

        state.available.cpu += requirement.cpu;
        state.available.memory += requirement.memory;

        debug!(task_id, "released resources");
        Ok(requirement)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.capacity,
            available: state.available,
            allocated_tasks: state.allocated.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(cpu: f64, memory: f64) -> ResourceRequirement {
        ResourceRequirement::new(cpu, memory)
    }

    #[test]
    fn test_allocate_and_release_conserves_budget() {
        let pool = ResourcePool::new(req(1.0, 100.0));
        let before = pool.stats().available;

        pool.allocate("a", req(0.6, 60.0)).unwrap();
        pool.allocate("b", req(0.3, 30.0)).unwrap();

        let during = pool.stats();
        assert!((during.available.cpu - 0.1).abs() < 1e-9);
        assert_eq!(during.allocated_tasks, 2);

        pool.release("a").unwrap();
        pool.release("b").unwrap();

        let after = pool.stats().available;
        assert!((after.cpu - before.cpu).abs() < 1e-9);
        assert!((after.memory - before.memory).abs() < 1e-9);
        assert_eq!(pool.stats().allocated_tasks, 0);
    }

    #[test]
    fn test_over_capacity_is_queued_not_allocated() {
        let pool = ResourcePool::new(req(1.0, 100.0));

        assert!(pool.try_allocate("a", req(0.6, 60.0)).unwrap());
        assert!(!pool.try_allocate("b", req(0.6, 60.0)).unwrap());
        assert_eq!(pool.stats().allocated_tasks, 1);

        pool.release("a").unwrap();
        assert!(pool.try_allocate("b", req(0.6, 60.0)).unwrap());
    }

    #[test]
    fn test_double_allocate_fails() {
        let pool = ResourcePool::new(req(2.0, 200.0));
        pool.allocate("a", req(0.1, 10.0)).unwrap();

        let err = pool.try_allocate("a", req(0.1, 10.0)).unwrap_err();
        assert_eq!(
            err,
            PoolError::AlreadyAllocated {
                task_id: "a".to_string()
            }
        );
    }

    #[test]
    fn test_double_release_fails() {
        let pool = ResourcePool::new(req(1.0, 100.0));
        pool.allocate("a", req(0.5, 50.0)).unwrap();

        pool.release("a").unwrap();
        let err = pool.release("a").unwrap_err();
        assert_eq!(
            err,
            PoolError::UnknownAllocation {
                task_id: "a".to_string()
            }
        );

        // No double credit happened.
        let stats = pool.stats();
        assert!((stats.available.cpu - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_can_allocate_previews_without_admitting() {
        let pool = ResourcePool::new(req(1.0, 100.0));
        assert!(pool.can_allocate(&req(0.6, 60.0)));
        // previewing does not consume anything
        assert_eq!(pool.stats().allocated_tasks, 0);
        assert!((pool.stats().cpu_utilization() - 0.0).abs() < 1e-9);

        pool.allocate("a", req(0.6, 60.0)).unwrap();
        assert!(!pool.can_allocate(&req(0.6, 60.0)));
        assert!(pool.can_allocate(&req(0.4, 40.0)));
        assert!((pool.stats().cpu_utilization() - 60.0).abs() < 1e-9);

        pool.release("a").unwrap();
        assert!(pool.can_allocate(&req(0.6, 60.0)));
    }

    #[test]
    fn test_memory_alone_can_exhaust() {
        let pool = ResourcePool::new(req(4.0, 50.0));
        assert!(pool.try_allocate("a", req(0.1, 40.0)).unwrap());
        assert!(!pool.try_allocate("b", req(0.1, 20.0)).unwrap());
    }

    #[test]
    fn test_requirement_table_covers_all_kinds() {
        for kind in TaskKind::ALL {
            let r = ResourceRequirement::for_kind(kind);
            assert!(r.cpu > 0.0 && r.memory > 0.0);
        }
    }
}
