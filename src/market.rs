//! Market data fetching and normalization
//!
//! Calls the external batch pricing endpoint and turns its condition-keyed
//! records into a uniform snapshot. The Near Mint record is authoritative
//! for the headline market price, currency, last-sold info and trends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalogue::{Grade, ProductRef};
use crate::error::{PricingError, Result};

/// Short condition codes in the order they are displayed
pub const CONDITION_NAMES: &[(&str, &str)] = &[
    ("NM", "Near Mint"),
    ("LP", "Lightly Played"),
    ("MP", "Moderately Played"),
    ("HP", "Heavily Played"),
    ("DMG", "Damaged"),
];

/// Spread of the per-condition low/high band around the reported value.
/// A presentation heuristic, not observed data.
pub const PRICE_BAND_SPREAD: f64 = 0.10;

/// Per-condition record from the market data API
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionRecord {
    pub condition: String,
    pub value: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub last_sold_price: Option<f64>,
    #[serde(default)]
    pub last_sold_date: Option<String>,
    #[serde(default)]
    pub trends: Option<HashMap<String, TrendEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendEntry {
    pub percentage_change: f64,
    #[serde(default)]
    pub previous_value: Option<f64>,
}

/// Raw batch response, keyed by product id directly or under `data`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MarketResponse {
    Wrapped {
        data: HashMap<String, Vec<ConditionRecord>>,
    },
    Bare(HashMap<String, Vec<ConditionRecord>>),
}

impl MarketResponse {
    pub fn into_map(self) -> HashMap<String, Vec<ConditionRecord>> {
        match self {
            MarketResponse::Wrapped { data } => data,
            MarketResponse::Bare(map) => map,
        }
    }
}

/// Price band for one display condition
#[derive(Debug, Clone, Serialize)]
pub struct ConditionBand {
    pub condition: String,
    pub low: f64,
    pub market: f64,
    pub high: f64,
}

/// Normalized market data for one product
#[derive(Debug, Clone, Serialize)]
pub struct PricingSnapshot {
    pub product_id: String,
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    pub market_price: Option<f64>,
    pub currency: Option<String>,
    pub conditions: Vec<ConditionBand>,
    pub last_sold_price: Option<f64>,
    pub last_sold_date: Option<String>,
    pub trend_1d: Option<f64>,
    pub trend_7d: Option<f64>,
    pub trend_30d: Option<f64>,
}

/// Pricing for a card: the first resolved variant is the headline, the
/// rest ride along as variants.
#[derive(Debug, Clone, Serialize)]
pub struct CardPricing {
    pub headline: PricingSnapshot,
    pub variants: Vec<PricingSnapshot>,
}

/// HTTP client for the market data batch API
pub struct MarketClient {
    http: reqwest::Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    /// Fetch condition records for a batch of product ids
    pub async fn fetch_batch(
        &self,
        product_ids: &[String],
    ) -> Result<HashMap<String, Vec<ConditionRecord>>> {
        let url = format!("{}/prices/batch", self.base_url);
        log::debug!("Market data fetch for {} product(s)", product_ids.len());

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "productIds": product_ids }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PricingError::HttpStatus(response.status()));
        }

        let parsed: MarketResponse = response.json().await?;
        Ok(parsed.into_map())
    }
}

fn display_condition(code: &str) -> Option<&'static str> {
    CONDITION_NAMES
        .iter()
        .find(|(short, _)| short.eq_ignore_ascii_case(code))
        .map(|(_, display)| *display)
}

fn trend(record: &ConditionRecord, window: &str) -> Option<f64> {
    record
        .trends
        .as_ref()
        .and_then(|t| t.get(window))
        .map(|t| t.percentage_change)
}

/// Normalize the condition records of one product into a snapshot
pub fn normalize(product: &ProductRef, records: &[ConditionRecord]) -> PricingSnapshot {
    let mut conditions = Vec::new();
    for (code, display) in CONDITION_NAMES {
        if let Some(record) = records
            .iter()
            .find(|r| r.condition.eq_ignore_ascii_case(code))
        {
            conditions.push(ConditionBand {
                condition: display.to_string(),
                low: record.value * (1.0 - PRICE_BAND_SPREAD),
                market: record.value,
                high: record.value * (1.0 + PRICE_BAND_SPREAD),
            });
        }
    }
    // unknown condition codes still get a band, after the known ones
    for record in records {
        if display_condition(&record.condition).is_none() {
            conditions.push(ConditionBand {
                condition: record.condition.clone(),
                low: record.value * (1.0 - PRICE_BAND_SPREAD),
                market: record.value,
                high: record.value * (1.0 + PRICE_BAND_SPREAD),
            });
        }
    }

    let near_mint = records
        .iter()
        .find(|r| r.condition.eq_ignore_ascii_case("NM"));

    match near_mint {
        Some(nm) => PricingSnapshot {
            product_id: product.product_id.clone(),
            material: product.material.clone(),
            grade: product.grade.clone(),
            market_price: Some(nm.value),
            currency: nm.currency.clone(),
            conditions,
            last_sold_price: nm.last_sold_price,
            last_sold_date: nm.last_sold_date.clone(),
            trend_1d: trend(nm, "1d"),
            trend_7d: trend(nm, "7d"),
            trend_30d: trend(nm, "30d"),
        },
        // no Near Mint record: market price is reported as absent
        None => PricingSnapshot {
            product_id: product.product_id.clone(),
            material: product.material.clone(),
            grade: product.grade.clone(),
            market_price: None,
            currency: None,
            conditions,
            last_sold_price: None,
            last_sold_date: None,
            trend_1d: None,
            trend_7d: None,
            trend_30d: None,
        },
    }
}
