// ABOUTME: Supply chain capability
// ABOUTME: Derives procurement, inventory policy, and logistics from a production plan

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::task::TaskKind;

use super::error::{CapabilityError, Result};
use super::Capability;

const PROCUREMENT_BUFFER: f64 = 1.2;
const SAFETY_STOCK_RATIO: f64 = 0.2;
const REORDER_POINT_RATIO: f64 = 0.3;

#[derive(Debug, Deserialize)]
struct SupplyChainParams {
    plan_details: Option<PlanDetails>,
    components: Option<Vec<Component>>,
}

#[derive(Debug, Deserialize)]
struct PlanDetails {
    mps: Mps,
}

#[derive(Debug, Deserialize)]
struct Mps {
    #[serde(default)]
    total_quantity: u64,
    deadline: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Component {
    name: String,
    unit_cost: f64,
}

pub struct SupplyChainCapability;

#[async_trait]
impl Capability for SupplyChainCapability {
    fn kind(&self) -> TaskKind {
        TaskKind::SupplyChain
    }

    async fn process(&self, parameters: &Value) -> Result<Value> {
        let params: SupplyChainParams = serde_json::from_value(parameters.clone())
            .map_err(|e| CapabilityError::InvalidParameters(e.to_string()))?;

        let plan = params
            .plan_details
            .ok_or_else(|| CapabilityError::MissingParameter("plan_details".into()))?;

        let quantity = plan.mps.total_quantity;
        let now = Utc::now();

        let procurement = json!({
            "procurement_id": format!("PRC_{}", now.format("%Y%m%d%H%M%S")),
            // one procurement cycle day per 10 units of demand
            "cycle_days": quantity / 10,
            "order_quantity": (quantity as f64 * PROCUREMENT_BUFFER).ceil() as u64,
            "components": component_orders(quantity, params.components.as_deref()),
        });

        let safety_stock = (quantity as f64 * SAFETY_STOCK_RATIO).ceil() as u64;
        let inventory = json!({
            "current_stock": 0,
            "safety_stock": safety_stock,
            "reorder_point": (quantity as f64 * REORDER_POINT_RATIO).ceil() as u64 + safety_stock,
        });

        let (mode, transit_days) = transport_mode(quantity);
        let logistics = json!({
            "transport_mode": mode,
            "estimated_transit_days": transit_days,
            "deadline": plan.mps.deadline,
        });

        Ok(json!({
            "supply_chain_id": format!("SCM_{}", now.format("%Y%m%d%H%M%S")),
            "procurement": procurement,
            "inventory": inventory,
            "logistics": logistics,
            "created_at": now.to_rfc3339(),
        }))
    }
}

/// Bulk shipments go by sea, mid-size by land, small urgent lots by air.
fn transport_mode(quantity: u64) -> (&'static str, u64) {
    if quantity > 1000 {
        ("sea", 30)
    } else if quantity > 100 {
        ("land", 7)
    } else {
        ("air", 3)
    }
}

fn component_orders(quantity: u64, components: Option<&[Component]>) -> Vec<Value> {
    let buffered = (quantity as f64 * PROCUREMENT_BUFFER).ceil() as u64;
    components
        .unwrap_or(&[])
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "quantity": buffered,
                "estimated_cost": c.unit_cost * buffered as f64,
            })
        })
        .collect()
}
