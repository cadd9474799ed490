// ABOUTME: Order intake capability
// ABOUTME: Validates customer references and materializes an order document

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::engine::task::{Priority, TaskKind};

use super::error::{CapabilityError, Result};
use super::{Capability, ProductInfo};

static CUSTOMER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CUS_\d{8}$").expect("customer id pattern"));

#[derive(Debug, Deserialize)]
struct OrderParams {
    customer_id: Option<String>,
    #[serde(default)]
    product_info: ProductInfo,
    #[serde(default = "default_priority")]
    priority: Priority,
    delivery_date: Option<NaiveDate>,
    delivery_address: Option<String>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

pub struct OrderCapability;

#[async_trait]
impl Capability for OrderCapability {
    fn kind(&self) -> TaskKind {
        TaskKind::Order
    }

    async fn process(&self, parameters: &Value) -> Result<Value> {
        let params: OrderParams = serde_json::from_value(parameters.clone())
            .map_err(|e| CapabilityError::InvalidParameters(e.to_string()))?;

        // Orders raised from a bare instruction carry no customer reference;
        // only reject one that is present but malformed.
        if let Some(id) = &params.customer_id {
            if !CUSTOMER_ID.is_match(id) {
                return Err(CapabilityError::InvalidParameters(format!(
                    "customer_id '{}' does not match CUS_ followed by 8 digits",
                    id
                )));
            }
        }

        let now = Utc::now();
        let order_id = format!("ORD_{}", now.format("%Y%m%d%H%M%S"));

        Ok(json!({
            "order_id": order_id,
            "customer_id": params.customer_id,
            "product": {
                "quantity": params.product_info.quantity,
                "specifications": {
                    "cpu": params.product_info.cpu,
                    "memory": params.product_info.memory,
                    "storage": params.product_info.storage,
                    "gpu": params.product_info.gpu,
                },
            },
            "priority": params.priority,
            "delivery_date": params.delivery_date,
            "delivery_address": params.delivery_address,
            "status": "created",
            "created_at": now.to_rfc3339(),
        }))
    }
}
