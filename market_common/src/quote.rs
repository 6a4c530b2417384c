//! Normalized price quote.
//!
//! A `PriceQuote` is what every price source produces, what the scheduler writes
//! to storage and what the read endpoints return. `(commodity, market)` is its
//! natural identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single commodity price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Commodity display name (e.g. `Maize`).
    pub commodity: String,
    /// Non-negative price in `currency` per `unit`.
    pub price: f64,
    /// Quantity basis (e.g. `per 90kg bag`).
    pub unit: String,
    /// ISO currency code of `price`.
    pub currency: String,
    /// Market or exchange the price was observed on.
    pub market: String,
    /// Free-text geographic qualifier.
    pub location: String,
    /// When the quote was generated or fetched.
    pub observed_at: DateTime<Utc>,
    /// Identifier of the provider that produced the quote.
    pub source: String,
}

impl PriceQuote {
    /// Storage identity of the quote.
    pub fn key(&self) -> (String, String) {
        (self.commodity.clone(), self.market.clone())
    }

    /// Relative deviation of `price` from `baseline`, in percent.
    pub fn deviation_pct(&self, baseline: f64) -> Option<f64> {
        if baseline <= 0.0 {
            return None;
        }
        Some((self.price - baseline) / baseline * 100.0)
    }
}

/// Round a price to two decimals.
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
