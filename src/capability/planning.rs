// ABOUTME: Production planning capability
// ABOUTME: Sizes production cycles against daily capacity and lays out a job schedule

use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::task::TaskKind;

use super::error::{CapabilityError, Result};
use super::{Capability, ProductInfo};

const DAILY_CAPACITY: u64 = 100;
const WORKING_DAYS_PER_WEEK: u64 = 5;

#[derive(Debug, Deserialize)]
struct PlanningParams {
    product_info: Option<ProductInfo>,
    deadline: Option<NaiveDate>,
}

pub struct PlanningCapability;

#[async_trait]
impl Capability for PlanningCapability {
    fn kind(&self) -> TaskKind {
        TaskKind::Planning
    }

    async fn process(&self, parameters: &Value) -> Result<Value> {
        let params: PlanningParams = serde_json::from_value(parameters.clone())
            .map_err(|e| CapabilityError::InvalidParameters(e.to_string()))?;

        let product = params
            .product_info
            .ok_or_else(|| CapabilityError::MissingParameter("product_info".into()))?;

        let quantity = product.quantity;
        let today = Utc::now().date_naive();

        // Base cycle count from raw capacity, stretched by weekend downtime.
        let base_cycles = quantity.div_ceil(DAILY_CAPACITY).max(1);
        let mut cycles = base_cycles + (base_cycles / WORKING_DAYS_PER_WEEK) * 2;
        let mut daily_output = quantity.div_ceil(cycles).min(DAILY_CAPACITY);

        if let Some(deadline) = params.deadline {
            let available = (deadline - today).num_days();
            if available <= 0 {
                return Err(CapabilityError::InvalidParameters(format!(
                    "deadline {} has already passed",
                    deadline
                )));
            }
            let available = available as u64;
            if available < cycles {
                // Compress into the remaining window and overrun daily capacity
                // if that is what the deadline demands.
                cycles = available;
                daily_output = quantity.div_ceil(cycles);
            }
        }

        let schedule = job_schedule(today, cycles, daily_output, quantity);
        let completion_date = schedule
            .last()
            .and_then(|job| job["date"].as_str().map(str::to_owned));

        Ok(json!({
            "plan_id": format!("PLN_{}", Utc::now().format("%Y%m%d%H%M%S")),
            "mps": {
                "total_quantity": quantity,
                "production_cycles": cycles,
                "daily_output": daily_output,
                "daily_capacity": DAILY_CAPACITY,
                "deadline": params.deadline,
                "estimated_completion": completion_date,
            },
            "job_schedule": schedule,
            "created_at": Utc::now().to_rfc3339(),
        }))
    }
}

/// One job per production cycle, placed on consecutive working days.
fn job_schedule(start: NaiveDate, cycles: u64, daily_output: u64, total: u64) -> Vec<Value> {
    let mut jobs = Vec::with_capacity(cycles as usize);
    let mut date = start;
    let mut remaining = total;

    for n in 1..=cycles {
        while date.weekday().num_days_from_monday() >= 5 {
            date += ChronoDuration::days(1);
        }
        let output = remaining.min(daily_output);
        remaining = remaining.saturating_sub(output);
        jobs.push(json!({
            "job_id": format!("JOB_{}_{}", date.format("%Y%m%d"), n),
            "date": date.format("%Y-%m-%d").to_string(),
            "quantity": output,
        }));
        date += ChronoDuration::days(1);
    }
    jobs
}
