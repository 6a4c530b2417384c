//! JSON payloads exchanged over the HTTP read surface.
//!
//! Every successful response carries `success: true`; failures use
//! [`ErrorResponse`]. The `cached` flag tells whether the payload was served
//! from the query cache.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commodity::Category;
use crate::provider::Provider;
use crate::quote::PriceQuote;

/// Default history window, in days.
pub const DEFAULT_HISTORY_DAYS: u32 = 30;
/// Largest accepted history window, in days.
pub const MAX_HISTORY_DAYS: u32 = 365;

/// Response of `GET /api/market/prices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesResponse {
    /// Always `true`.
    pub success: bool,
    /// Normalized quotes.
    pub data: Vec<PriceQuote>,
    /// Whether the payload came from the cache.
    pub cached: bool,
    /// Requested provider; `None` when read from stored quotes.
    pub source: Option<Provider>,
    /// Time the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Response of `GET /api/market/prices/{commodity}/history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Always `true`.
    pub success: bool,
    /// Commodity as requested.
    pub commodity: String,
    /// Window length in days.
    pub period_days: u32,
    /// Stored quotes observed within the window, newest first.
    pub data: Vec<PriceQuote>,
    /// Whether the payload came from the cache.
    pub cached: bool,
}

/// Direction of a commodity price relative to its baseline.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Stable,
}

/// Overall market mood derived from the trend counts.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Trend of a single commodity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommodityTrend {
    /// Commodity display name.
    pub commodity: String,
    /// Latest stored price.
    pub price: f64,
    /// Catalog baseline price.
    pub baseline: f64,
    /// Deviation from the baseline, in percent.
    pub change_pct: f64,
    /// Classified direction.
    pub direction: Direction,
}

/// Trend analysis over the stored quotes of one category (or all).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendReport {
    /// Category filter, `None` for all categories.
    pub category: Option<Category>,
    /// Commodities above the baseline.
    pub trending_up: Vec<CommodityTrend>,
    /// Commodities below the baseline.
    pub trending_down: Vec<CommodityTrend>,
    /// Commodities near the baseline.
    pub stable: Vec<CommodityTrend>,
    /// Mean absolute deviation from baseline, in percent.
    pub volatility_index: f64,
    /// Overall mood.
    pub market_sentiment: Sentiment,
}

/// Response of `GET /api/market/trends`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsResponse {
    /// Always `true`.
    pub success: bool,
    /// The analysis.
    pub data: TrendReport,
    /// Whether the payload came from the cache.
    pub cached: bool,
}

/// Kind of market alert.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceSurge,
    PriceDrop,
}

/// Alert severity.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

/// A significant price movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketAlert {
    /// Surge or drop.
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// Commodity display name.
    pub commodity: String,
    /// Market the quote came from.
    pub market: String,
    /// Human-readable summary.
    pub message: String,
    /// How far the price moved.
    pub severity: Severity,
    /// Observation time of the triggering quote.
    pub timestamp: DateTime<Utc>,
}

/// Response of `GET /api/market/alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    /// Always `true`.
    pub success: bool,
    /// Alerts, most severe first.
    pub data: Vec<MarketAlert>,
    /// Number of alerts.
    pub count: usize,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `true`.
    pub success: bool,
    /// Status text.
    pub message: String,
}

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Short, generic description of what failed.
    pub error: String,
    /// Underlying cause.
    pub message: String,
}

impl ErrorResponse {
    /// Create a failure body.
    pub fn new(error: &str, message: impl ToString) -> Self {
        ErrorResponse {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_kind_is_serialized_as_type() {
        let alert = MarketAlert {
            kind: AlertKind::PriceSurge,
            commodity: "Wheat".into(),
            market: "Nairobi".into(),
            message: "Wheat up 6.0% against baseline".into(),
            severity: Severity::Medium,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "price_surge");
        assert_eq!(value["severity"], "medium");
    }

    #[test]
    fn prices_response_decodes_without_source() {
        let body = r#"{"success":true,"data":[],"cached":true,"source":null,
                       "timestamp":"2026-01-01T00:00:00Z"}"#;
        let resp: PricesResponse = serde_json::from_str(body).unwrap();
        assert!(resp.cached);
        assert_eq!(resp.source, None);
    }
}
