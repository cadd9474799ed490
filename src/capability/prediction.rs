// ABOUTME: Prediction capability
// ABOUTME: Generates demand, price, and inventory forecasts over a rolling horizon

use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::task::TaskKind;

use super::error::{CapabilityError, Result};
use super::{Capability, ProductInfo};

const DEFAULT_HORIZON_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
struct PredictionParams {
    product_info: Option<ProductInfo>,
    #[serde(default)]
    target: ForecastTarget,
    #[serde(default = "default_horizon")]
    horizon_days: u32,
}

fn default_horizon() -> u32 {
    DEFAULT_HORIZON_DAYS
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ForecastTarget {
    #[default]
    Demand,
    Price,
    Inventory,
}

pub struct PredictionCapability;

#[async_trait]
impl Capability for PredictionCapability {
    fn kind(&self) -> TaskKind {
        TaskKind::Prediction
    }

    async fn process(&self, parameters: &Value) -> Result<Value> {
        let params: PredictionParams = serde_json::from_value(parameters.clone())
            .map_err(|e| CapabilityError::InvalidParameters(e.to_string()))?;

        let product = params
            .product_info
            .ok_or_else(|| CapabilityError::MissingParameter("product_info".into()))?;

        let points = match params.target {
            ForecastTarget::Demand => demand_forecast(&product, params.horizon_days),
            ForecastTarget::Price => price_forecast(&product, params.horizon_days),
            ForecastTarget::Inventory => inventory_forecast(&product, params.horizon_days),
        };

        Ok(json!({
            "prediction_id": format!("PRD_{}", Utc::now().format("%Y%m%d%H%M%S")),
            "target": match params.target {
                ForecastTarget::Demand => "demand",
                ForecastTarget::Price => "price",
                ForecastTarget::Inventory => "inventory",
            },
            "horizon_days": params.horizon_days,
            "forecast": points,
            "created_at": Utc::now().to_rfc3339(),
        }))
    }
}

fn forecast_dates(horizon: u32) -> impl Iterator<Item = (u32, String, bool)> {
    let start = Utc::now().date_naive();
    (0..horizon).map(move |i| {
        let date = start + ChronoDuration::days(i as i64 + 1);
        let weekend = date.weekday().num_days_from_monday() >= 5;
        (i, date.format("%Y-%m-%d").to_string(), weekend)
    })
}

/// Weekday demand follows a five-day wave around the base quantity;
/// weekends drop to 70%. Confidence decays the further out we look.
fn demand_forecast(product: &ProductInfo, horizon: u32) -> Vec<Value> {
    let base = product.quantity.max(1) as f64;
    forecast_dates(horizon)
        .map(|(i, date, weekend)| {
            let value = if weekend {
                base * 0.7
            } else {
                base * (1.0 + 0.1 * ((i % 5) as f64 - 2.0))
            };
            json!({
                "date": date,
                "value": value.max(0.0).round(),
                "confidence": (0.8 - 0.01 * i as f64).max(0.0),
            })
        })
        .collect()
}

fn base_price(product: &ProductInfo) -> f64 {
    let mut price = 5000.0;
    if product.cpu.as_deref().is_some_and(|c| c.contains("i9")) {
        price += 1000.0;
    }
    if product.memory.as_deref().is_some_and(|m| m.contains("32")) {
        price += 500.0;
    }
    if product.storage.as_deref().is_some_and(|s| s.contains('1')) {
        price += 300.0;
    }
    if product
        .gpu
        .as_deref()
        .is_some_and(|g| g.to_ascii_lowercase().contains("rtx"))
    {
        price += 2000.0;
    }
    price
}

fn price_forecast(product: &ProductInfo, horizon: u32) -> Vec<Value> {
    let base = base_price(product);
    forecast_dates(horizon)
        .map(|(i, date, _)| {
            let value = base * (1.0 + 0.05 * ((i % 3) as f64 - 1.0));
            json!({
                "date": date,
                "value": (value * 100.0).round() / 100.0,
                "confidence": (0.9 - 0.01 * i as f64).max(0.0),
            })
        })
        .collect()
}

/// Projects stock level day by day: weekday production feeds the pool while
/// consumption drains it, weekends consume lightly with no production.
fn inventory_forecast(product: &ProductInfo, horizon: u32) -> Vec<Value> {
    let quantity = product.quantity.max(1) as f64;
    let daily = quantity / 30.0;
    let mut level = quantity / 2.0;

    forecast_dates(horizon)
        .map(|(i, date, weekend)| {
            let (produced, consumed) = if weekend {
                (0.0, daily * 0.3)
            } else {
                (daily, daily * 0.9)
            };
            level = (level + produced - consumed).max(0.0);
            json!({
                "date": date,
                "value": level.round(),
                "confidence": (0.85 - 0.01 * i as f64).max(0.0),
            })
        })
        .collect()
}
