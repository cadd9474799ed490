// ABOUTME: End-to-end orchestrator tests
// ABOUTME: Instruction in, ordered task results and exactly one history record out

mod common;

use std::sync::Arc;

use indexmap::IndexMap;
use millwright::engine::error::EngineError;
use millwright::engine::graph::TaskGraphBuilder;
use millwright::history::HistoryQuery;
use millwright::{
    CapabilityRegistry, DispatchMode, HistorySink, InMemoryHistory, InstructionStatus,
    Orchestrator, ResourceRequirement, RetryPolicy, RuleBasedAnalyzer, TaskKind, TaskScheduler,
    TaskStatus,
};

use common::{analysis_for, analysis_with_dependencies, FailingAnalyzer, StaticAnalyzer};

fn orchestrator(
    analyzer: Arc<dyn millwright::InstructionAnalyzer>,
    history: Arc<InMemoryHistory>,
) -> Orchestrator {
    let registry = Arc::new(CapabilityRegistry::with_builtin(RetryPolicy::new(
        3,
        std::time::Duration::from_millis(1),
    )));
    let scheduler = TaskScheduler::new(Arc::clone(&registry), ResourceRequirement::new(4.0, 4096.0));
    Orchestrator::new(
        analyzer,
        registry,
        scheduler,
        TaskGraphBuilder::default(),
        history,
    )
}

#[tokio::test]
async fn test_production_instruction_runs_pipeline_in_order() {
    let history = Arc::new(InMemoryHistory::default());
    let analyzer = Arc::new(StaticAnalyzer {
        analysis: analysis_for(
            vec![
                TaskKind::Order,
                TaskKind::Planning,
                TaskKind::Finance,
            ],
            500,
        ),
    });

    let result = orchestrator(analyzer, Arc::clone(&history))
        .process_instruction("produce 500 computers")
        .await
        .unwrap();

    assert_eq!(result.status, InstructionStatus::Success);
    assert_eq!(result.summary.total_tasks, 3);
    assert_eq!(result.summary.completed_tasks, 3);

    // results preserve dependency order
    let kinds: Vec<TaskKind> = result.results.keys().copied().collect();
    assert_eq!(
        kinds,
        vec![TaskKind::Order, TaskKind::Planning, TaskKind::Finance]
    );

    // each capability produced its domain document
    let order = result.report(TaskKind::Order).unwrap();
    assert!(order.data.as_ref().unwrap()["order_id"]
        .as_str()
        .unwrap()
        .starts_with("ORD_"));
    let planning = result.report(TaskKind::Planning).unwrap();
    assert!(planning.data.as_ref().unwrap()["mps"]["total_quantity"] == 500);
    let finance = result.report(TaskKind::Finance).unwrap();
    assert_eq!(
        finance.data.as_ref().unwrap()["total_amount"],
        500.0 * 5000.0 + 500.0 * 1000.0 + 100_000.0 + 500.0 * 500.0
    );

    // exactly one audit record
    let records = history.query(&HistoryQuery::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, InstructionStatus::Success);
    assert_eq!(records[0].agents_involved.len(), 3);
}

#[tokio::test]
async fn test_analyzer_failure_falls_back_to_order_only() {
    let history = Arc::new(InMemoryHistory::default());

    let result = orchestrator(Arc::new(FailingAnalyzer), Arc::clone(&history))
        .process_instruction("do something unintelligible")
        .await
        .unwrap();

    assert_eq!(result.status, InstructionStatus::Success);
    assert_eq!(result.summary.total_tasks, 1);
    assert!(result.report(TaskKind::Order).is_some());

    let records = history.query(&HistoryQuery::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task_type, TaskKind::Order);
}

#[tokio::test]
async fn test_cyclic_dependencies_fail_and_still_audited() {
    let history = Arc::new(InMemoryHistory::default());
    let analyzer = Arc::new(StaticAnalyzer {
        analysis: analysis_with_dependencies(
            vec![TaskKind::Order, TaskKind::Planning],
            IndexMap::from([
                (TaskKind::Order, vec![TaskKind::Planning]),
                (TaskKind::Planning, vec![TaskKind::Order]),
            ]),
        ),
    });

    let err = orchestrator(analyzer, Arc::clone(&history))
        .process_instruction("tangled request")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CyclicDependency { .. }));

    let records = history.query(&HistoryQuery::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, InstructionStatus::Failed);
}

#[tokio::test]
async fn test_failed_dependency_skips_downstream() {
    let history = Arc::new(InMemoryHistory::default());
    // A malformed customer id makes the order capability fail without retry.
    let mut analysis = analysis_for(vec![TaskKind::Order, TaskKind::Planning], 100);
    analysis.extracted_info.customer_id = Some("not-a-valid-id".to_string());
    let analyzer = Arc::new(StaticAnalyzer { analysis });

    let result = orchestrator(analyzer, Arc::clone(&history))
        .process_instruction("produce for a bad customer")
        .await
        .unwrap();

    assert_eq!(result.status, InstructionStatus::Failed);

    let order = result.report(TaskKind::Order).unwrap();
    assert_eq!(order.status, TaskStatus::Failed);
    assert_eq!(order.retry_count, 0);

    let planning = result.report(TaskKind::Planning).unwrap();
    assert_eq!(planning.status, TaskStatus::Skipped);
    assert_eq!(
        planning.error.as_deref(),
        Some("dependency_failed: order")
    );

    let records = history.query(&HistoryQuery::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].error.as_ref().unwrap().contains("order"));
}

#[tokio::test]
async fn test_sequential_mode_matches_parallel_results() {
    let history = Arc::new(InMemoryHistory::default());
    let analyzer = Arc::new(StaticAnalyzer {
        analysis: analysis_for(
            vec![
                TaskKind::Order,
                TaskKind::Planning,
                TaskKind::SupplyChain,
                TaskKind::Finance,
            ],
            200,
        ),
    });

    let result = orchestrator(analyzer, history)
        .with_dispatch_mode(DispatchMode::Sequential)
        .process_instruction("produce 200 machines end to end")
        .await
        .unwrap();

    assert_eq!(result.status, InstructionStatus::Success);
    let kinds: Vec<TaskKind> = result.results.keys().copied().collect();
    assert_eq!(
        kinds,
        vec![
            TaskKind::Order,
            TaskKind::Planning,
            TaskKind::SupplyChain,
            TaskKind::Finance,
        ]
    );
}

#[tokio::test]
async fn test_rule_based_end_to_end() {
    let history = Arc::new(InMemoryHistory::default());

    let result = orchestrator(Arc::new(RuleBasedAnalyzer::new()), Arc::clone(&history))
        .process_instruction("produce 1500 computers with i9 CPU and 32GB memory")
        .await
        .unwrap();

    assert_eq!(result.status, InstructionStatus::Success);
    assert_eq!(result.summary.total_tasks, 2);

    // quantity over 1000 drives high priority through to the order document
    let order = result.report(TaskKind::Order).unwrap();
    assert_eq!(order.data.as_ref().unwrap()["priority"], "high");

    let planning = result.report(TaskKind::Planning).unwrap();
    assert_eq!(
        planning.data.as_ref().unwrap()["mps"]["total_quantity"],
        1500
    );
}
