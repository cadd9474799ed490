// ABOUTME: Task graph builder
// ABOUTME: Orders required capabilities by dependency and materializes their parameters

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde_json::{json, Value};
use tracing::debug;

use crate::analyzer::Analysis;

use super::error::{EngineError, Result};
use super::task::{Priority, Task, TaskKind};

// Per-unit cost assumptions used when seeding finance and component
// parameters from an extracted quantity.
const MATERIALS_UNIT_COST: f64 = 5000.0;
const LABOR_UNIT_COST: f64 = 1000.0;
const EQUIPMENT_FLAT_COST: f64 = 100_000.0;
const OTHER_UNIT_COST: f64 = 500.0;

const CPU_UNIT_COST: f64 = 2500.0;
const MEMORY_UNIT_COST: f64 = 800.0;
const STORAGE_UNIT_COST: f64 = 600.0;
const GPU_UNIT_COST: f64 = 5000.0;

/// Turns an [`Analysis`] into a dependency-ordered task list. Ordering is
/// deterministic: tasks are emitted by repeatedly scanning the required
/// kinds in analysis order and appending the first whose dependencies are
/// already placed.
pub struct TaskGraphBuilder {
    max_retries: u32,
}

impl TaskGraphBuilder {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn build(&self, analysis: &Analysis, priority: Priority) -> Result<Vec<Task>> {
        let required = dedupe(&analysis.required_agents);
        validate(&required, &analysis.dependencies)?;

        let mut ordered: Vec<TaskKind> = Vec::with_capacity(required.len());
        while ordered.len() < required.len() {
            let next = required.iter().copied().find(|kind| {
                !ordered.contains(kind)
                    && deps_of(&analysis.dependencies, *kind)
                        .iter()
                        // kinds outside the required set are considered satisfied
                        .all(|dep| ordered.contains(dep) || !required.contains(dep))
            });

            match next {
                Some(kind) => ordered.push(kind),
                None => {
                    let remaining: Vec<TaskKind> = required
                        .iter()
                        .copied()
                        .filter(|k| !ordered.contains(k))
                        .collect();
                    return Err(EngineError::CyclicDependency { remaining });
                }
            }
        }

        debug!(order = ?ordered, "task graph resolved");

        Ok(ordered
            .iter()
            .map(|&kind| {
                let deps: Vec<TaskKind> = deps_of(&analysis.dependencies, kind)
                    .iter()
                    .copied()
                    .filter(|dep| required.contains(dep))
                    .collect();
                Task::new(
                    kind,
                    self.parameters_for(kind, analysis, priority),
                    priority,
                    deps,
                    self.max_retries,
                )
            })
            .collect())
    }

    /// Seed parameters for each capability from the extracted instruction
    /// fields, shaped the way the capability's parameter struct expects.
    fn parameters_for(&self, kind: TaskKind, analysis: &Analysis, priority: Priority) -> Value {
        let info = &analysis.extracted_info;
        let quantity = info.quantity.unwrap_or(0);
        let product_info = json!({
            "quantity": quantity,
            "cpu": info.cpu,
            "memory": info.memory,
            "storage": info.storage,
            "gpu": info.gpu,
        });

        match kind {
            TaskKind::Order => json!({
                "priority": priority,
                "constraints": analysis.constraints,
                "product_info": product_info,
                "customer_id": info.customer_id,
                "delivery_date": info.delivery_date,
                "delivery_address": info.delivery_address,
            }),
            TaskKind::Planning => json!({
                "product_info": product_info,
                "deadline": info.delivery_date,
            }),
            TaskKind::SupplyChain => json!({
                "plan_details": {
                    "mps": {
                        "total_quantity": quantity,
                        "deadline": info.delivery_date,
                    },
                },
                "components": [
                    {"name": "cpu", "unit_cost": CPU_UNIT_COST},
                    {"name": "memory", "unit_cost": MEMORY_UNIT_COST},
                    {"name": "storage", "unit_cost": STORAGE_UNIT_COST},
                    {"name": "gpu", "unit_cost": GPU_UNIT_COST},
                ],
            }),
            TaskKind::Finance => json!({
                "operation_type": "budget",
                "materials_amount": quantity as f64 * MATERIALS_UNIT_COST,
                "labor_amount": quantity as f64 * LABOR_UNIT_COST,
                "equipment_amount": EQUIPMENT_FLAT_COST,
                "other_amount": quantity as f64 * OTHER_UNIT_COST,
            }),
            TaskKind::Prediction => json!({
                "product_info": product_info,
                "target": "demand",
                "horizon_days": 30,
            }),
        }
    }
}

impl Default for TaskGraphBuilder {
    fn default() -> Self {
        Self::new(3)
    }
}

fn dedupe(kinds: &[TaskKind]) -> Vec<TaskKind> {
    let mut seen = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        if !seen.contains(&kind) {
            seen.push(kind);
        }
    }
    seen
}

fn deps_of(dependencies: &IndexMap<TaskKind, Vec<TaskKind>>, kind: TaskKind) -> &[TaskKind] {
    dependencies.get(&kind).map(Vec::as_slice).unwrap_or(&[])
}

/// Structural validation ahead of ordering: self-dependencies and cycles
/// among the required kinds are rejected up front.
fn validate(required: &[TaskKind], dependencies: &IndexMap<TaskKind, Vec<TaskKind>>) -> Result<()> {
    let mut graph = DiGraph::<TaskKind, ()>::new();
    let mut nodes = IndexMap::new();
    for &kind in required {
        nodes.insert(kind, graph.add_node(kind));
    }

    for &kind in required {
        for dep in deps_of(dependencies, kind) {
            if *dep == kind {
                return Err(EngineError::SelfDependency { kind });
            }
            if let Some(&dep_node) = nodes.get(dep) {
                graph.add_edge(dep_node, nodes[&kind], ());
            }
        }
    }

    toposort(&graph, None).map_err(|cycle| EngineError::CyclicDependency {
        remaining: vec![graph[cycle.node_id()]],
    })?;
    Ok(())
}
