// ABOUTME: Orchestrator driving one instruction end to end
// ABOUTME: Analysis with fallback, graph build, batched dispatch, result rollup, audit record

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::json;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::analyzer::{Analysis, InstructionAnalyzer};
use crate::capability::CapabilityRegistry;
use crate::engine::error::Result;
use crate::engine::graph::TaskGraphBuilder;
use crate::engine::result::{InstructionResult, InstructionStatus, TaskReport};
use crate::engine::scheduler::TaskScheduler;
use crate::engine::task::{Task, TaskKind, TaskStatus};
use crate::history::{HistoryRecord, HistorySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Ready tasks of each dependency wave run concurrently.
    #[default]
    Parallel,
    /// Tasks run strictly one at a time in graph order.
    Sequential,
}

pub struct Orchestrator {
    analyzer: Arc<dyn InstructionAnalyzer>,
    registry: Arc<CapabilityRegistry>,
    scheduler: TaskScheduler,
    graph: TaskGraphBuilder,
    history: Arc<dyn HistorySink>,
    analyzer_timeout: Duration,
    mode: DispatchMode,
}

impl Orchestrator {
    pub fn new(
        analyzer: Arc<dyn InstructionAnalyzer>,
        registry: Arc<CapabilityRegistry>,
        scheduler: TaskScheduler,
        graph: TaskGraphBuilder,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            analyzer,
            registry,
            scheduler,
            graph,
            history,
            analyzer_timeout: Duration::from_secs(5),
            mode: DispatchMode::Parallel,
        }
    }

    pub fn with_analyzer_timeout(mut self, analyzer_timeout: Duration) -> Self {
        self.analyzer_timeout = analyzer_timeout;
        self
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Process one instruction to a terminal result. Exactly one history
    /// record is written per call, whatever the outcome.
    #[instrument(skip(self, instruction), fields(run_id))]
    pub async fn process_instruction(&self, instruction: &str) -> Result<InstructionResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let started = Instant::now();

        let analysis = self.analyze_with_fallback(instruction).await;
        let priority = analysis.effective_priority();

        let tasks = match self.graph.build(&analysis, priority) {
            Ok(tasks) => tasks,
            Err(err) => {
                self.record(
                    &run_id,
                    instruction,
                    &analysis,
                    json!({"error": err.to_string()}),
                    InstructionStatus::Failed,
                    started.elapsed(),
                    Some(err.to_string()),
                )
                .await;
                return Err(err);
            }
        };

        info!(
            run_id = %run_id,
            main_task = %analysis.main_task,
            tasks = tasks.len(),
            %priority,
            "dispatching instruction"
        );

        let results = match self.mode {
            DispatchMode::Parallel => self.dispatch_parallel(tasks).await,
            DispatchMode::Sequential => self.dispatch_sequential(tasks).await,
        };

        let result = InstructionResult::from_reports(run_id.clone(), results, started.elapsed());
        let error = result.error_detail();
        self.record(
            &run_id,
            instruction,
            &analysis,
            serde_json::to_value(&result).unwrap_or_else(|_| json!({})),
            result.status,
            result.execution_time,
            error,
        )
        .await;

        Ok(result)
    }

    async fn analyze_with_fallback(&self, instruction: &str) -> Analysis {
        match timeout(self.analyzer_timeout, self.analyzer.analyze(instruction)).await {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(err)) => {
                warn!(%err, "analysis failed, using fallback");
                Analysis::fallback()
            }
            Err(_) => {
                warn!("analysis timed out, using fallback");
                Analysis::fallback()
            }
        }
    }

    /// Dispatch in dependency waves: everything whose dependencies have
    /// completed runs in one concurrent batch. Tasks downstream of a
    /// failure are skipped, not run.
    async fn dispatch_parallel(&self, tasks: Vec<Task>) -> IndexMap<TaskKind, TaskReport> {
        let mut pending: Vec<Task> = tasks;
        let mut results: IndexMap<TaskKind, TaskReport> = IndexMap::new();

        while !pending.is_empty() {
            let remaining_kinds: Vec<TaskKind> = pending.iter().map(|t| t.kind).collect();
            let mut batch = Vec::new();
            let mut rest = Vec::new();

            for task in pending {
                let ready = task
                    .dependencies
                    .iter()
                    .all(|dep| !remaining_kinds.contains(dep));
                if ready {
                    batch.push(task);
                } else {
                    rest.push(task);
                }
            }

            if batch.is_empty() {
                // Graph validation makes this unreachable, but refuse to spin.
                for task in rest {
                    let dep = task.dependencies.first().copied().unwrap_or(task.kind);
                    results.insert(task.kind, TaskReport::skipped(&task, dep));
                }
                break;
            }

            let mut to_run = Vec::new();
            for task in batch {
                match self.failed_dependency(&task, &results) {
                    Some(dep) => {
                        results.insert(task.kind, TaskReport::skipped(&task, dep));
                    }
                    None => to_run.push(task),
                }
            }

            let reports = join_all(
                to_run
                    .into_iter()
                    .map(|task| self.scheduler.run_task(task)),
            )
            .await;
            for report in reports {
                results.insert(report.kind, report);
            }

            pending = rest;
        }

        results
    }

    async fn dispatch_sequential(&self, tasks: Vec<Task>) -> IndexMap<TaskKind, TaskReport> {
        let mut results: IndexMap<TaskKind, TaskReport> = IndexMap::new();
        for task in tasks {
            match self.failed_dependency(&task, &results) {
                Some(dep) => {
                    results.insert(task.kind, TaskReport::skipped(&task, dep));
                }
                None => {
                    let report = self.scheduler.run_task(task).await;
                    results.insert(report.kind, report);
                }
            }
        }
        results
    }

    fn failed_dependency(
        &self,
        task: &Task,
        results: &IndexMap<TaskKind, TaskReport>,
    ) -> Option<TaskKind> {
        task.dependencies.iter().copied().find(|dep| {
            results
                .get(dep)
                .is_some_and(|r| matches!(r.status, TaskStatus::Failed | TaskStatus::Skipped))
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        run_id: &str,
        instruction: &str,
        analysis: &Analysis,
        result: serde_json::Value,
        status: InstructionStatus,
        execution_time: Duration,
        error: Option<String>,
    ) {
        let record = HistoryRecord {
            timestamp: chrono::Utc::now(),
            task_id: run_id.to_string(),
            task_type: analysis.main_task,
            input: instruction.to_string(),
            result,
            status,
            execution_time_seconds: execution_time.as_secs_f64(),
            agents_involved: analysis.required_agents.clone(),
            error,
        };
        // Auditing must not take the instruction result down with it.
        if let Err(err) = self.history.append(record).await {
            warn!(%err, run_id, "failed to append history record");
        }
    }
}
