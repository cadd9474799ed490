// ABOUTME: Rule-based instruction analyzer
// ABOUTME: Keyword routing plus regex extraction of quantities, specs, and delivery details

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::engine::task::{Priority, TaskKind};

use super::error::{AnalyzerError, Result};
use super::{Analysis, ExtractedInfo, InstructionAnalyzer};

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:units?|pcs|computers?|machines?)").expect("quantity pattern")
});
static MEMORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*GB").expect("memory pattern"));
static STORAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*TB").expect("storage pattern"));
static CPU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(i[579]|ryzen\s*\d*)\b").expect("cpu pattern"));
static GPU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)RTX\s*(\d{4})").expect("gpu pattern"));
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("date pattern"));
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)deliver(?:y)?\s+to\s+([^,.]+)").expect("address pattern")
});
static CUSTOMER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(CUS_\d{8})\b").expect("customer pattern"));

/// Routes instructions on keyword hits and extracts structured fields with
/// regexes. Deterministic and dependency-free; a model-backed analyzer can
/// replace it behind the same trait.
pub struct RuleBasedAnalyzer;

impl RuleBasedAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Capability dependency order used for every instruction this
    /// analyzer routes. Kinds outside `required_agents` are pruned by the
    /// graph builder.
    pub fn default_dependencies() -> IndexMap<TaskKind, Vec<TaskKind>> {
        IndexMap::from([
            (TaskKind::Order, vec![]),
            (TaskKind::Planning, vec![TaskKind::Order]),
            (TaskKind::SupplyChain, vec![TaskKind::Planning]),
            (TaskKind::Prediction, vec![TaskKind::Order]),
            (
                TaskKind::Finance,
                vec![TaskKind::Order, TaskKind::Planning, TaskKind::SupplyChain],
            ),
        ])
    }

    fn route(text: &str) -> TaskKind {
        if text.contains("produce") || text.contains("manufactur") {
            TaskKind::Planning
        } else if text.contains("procure") || text.contains("supply") || text.contains("purchase") {
            TaskKind::SupplyChain
        } else if text.contains("budget") || text.contains("financ") || text.contains("cost") {
            TaskKind::Finance
        } else if text.contains("forecast") || text.contains("predict") {
            TaskKind::Prediction
        } else {
            TaskKind::Order
        }
    }

    fn extract(text: &str) -> ExtractedInfo {
        let capture = |re: &Regex| {
            re.captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };

        ExtractedInfo {
            quantity: capture(&QUANTITY).and_then(|q| q.parse().ok()),
            cpu: capture(&CPU),
            memory: capture(&MEMORY).map(|gb| format!("{}GB", gb)),
            storage: capture(&STORAGE).map(|tb| format!("{}TB", tb)),
            gpu: capture(&GPU).map(|model| format!("NVIDIA RTX {}", model)),
            delivery_date: capture(&ISO_DATE)
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            delivery_address: capture(&ADDRESS),
            customer_id: capture(&CUSTOMER),
        }
    }
}

impl Default for RuleBasedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstructionAnalyzer for RuleBasedAnalyzer {
    async fn analyze(&self, instruction: &str) -> Result<Analysis> {
        let trimmed = instruction.trim();
        if trimmed.is_empty() {
            return Err(AnalyzerError::EmptyInstruction);
        }

        let lower = trimmed.to_lowercase();
        let main_task = Self::route(&lower);

        // Every run starts from an order; the routed capability joins it.
        let mut required_agents = vec![TaskKind::Order];
        if main_task != TaskKind::Order {
            required_agents.push(main_task);
        }

        let mut constraints = Vec::new();
        let mut priority = None;
        if lower.contains("urgent") || lower.contains("asap") {
            constraints.push("expedite".to_string());
            priority = Some(Priority::High);
        }

        let extracted_info = Self::extract(trimmed);
        debug!(
            main_task = %main_task,
            quantity = ?extracted_info.quantity,
            "analyzed instruction"
        );

        Ok(Analysis {
            main_task,
            required_agents,
            dependencies: Self::default_dependencies(),
            extracted_info,
            priority,
            constraints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn analyze(text: &str) -> Analysis {
        RuleBasedAnalyzer::new().analyze(text).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_instruction_rejected() {
        let err = RuleBasedAnalyzer::new().analyze("   ").await.unwrap_err();
        assert_eq!(err, AnalyzerError::EmptyInstruction);
    }

    #[tokio::test]
    async fn test_keyword_routing() {
        assert_eq!(
            analyze("produce 500 computers").await.main_task,
            TaskKind::Planning
        );
        assert_eq!(
            analyze("purchase raw materials").await.main_task,
            TaskKind::SupplyChain
        );
        assert_eq!(
            analyze("prepare the quarterly budget").await.main_task,
            TaskKind::Finance
        );
        assert_eq!(
            analyze("forecast demand next month").await.main_task,
            TaskKind::Prediction
        );
        assert_eq!(
            analyze("ship 10 units to the depot").await.main_task,
            TaskKind::Order
        );
    }

    #[tokio::test]
    async fn test_order_always_required_first() {
        let analysis = analyze("produce 500 computers").await;
        assert_eq!(
            analysis.required_agents,
            vec![TaskKind::Order, TaskKind::Planning]
        );

        let order_only = analyze("new order for 10 units").await;
        assert_eq!(order_only.required_agents, vec![TaskKind::Order]);
    }

    #[tokio::test]
    async fn test_extraction() {
        let analysis = analyze(
            "URGENT: produce 1500 computers with i9 CPU, 32GB memory, 1TB storage \
             and RTX 4090, deliver to 14 Harbor Road, due 2026-10-01 for CUS_00012345",
        )
        .await;

        let info = &analysis.extracted_info;
        assert_eq!(info.quantity, Some(1500));
        assert_eq!(info.cpu.as_deref(), Some("i9"));
        assert_eq!(info.memory.as_deref(), Some("32GB"));
        assert_eq!(info.storage.as_deref(), Some("1TB"));
        assert_eq!(info.gpu.as_deref(), Some("NVIDIA RTX 4090"));
        assert_eq!(
            info.delivery_date,
            NaiveDate::from_ymd_opt(2026, 10, 1)
        );
        assert_eq!(info.delivery_address.as_deref(), Some("14 Harbor Road"));
        assert_eq!(info.customer_id.as_deref(), Some("CUS_00012345"));
    }

    #[tokio::test]
    async fn test_urgency_sets_priority_and_constraint() {
        let analysis = analyze("urgent order for 10 units").await;
        assert_eq!(analysis.priority, Some(Priority::High));
        assert_eq!(analysis.constraints, vec!["expedite".to_string()]);
        assert_eq!(analysis.effective_priority(), Priority::High);
    }

    #[tokio::test]
    async fn test_quantity_drives_priority_when_not_urgent() {
        let analysis = analyze("produce 1500 computers").await;
        assert!(analysis.priority.is_none());
        assert_eq!(analysis.effective_priority(), Priority::High);
    }
}
