//! Synthetic quotes around the catalog baseline prices.
//!
//! Used when no external provider is configured. Each quote is the baseline
//! price moved by a uniform random variation in `[-10%, +10%]`, so repeated
//! generations for a baseline `P` stay within `[0.9·P, 1.1·P]`.

use chrono::Utc;
use market_common::commodity::{self, BASELINE_CURRENCY, Commodity};
use market_common::quote::round_price;
use market_common::{PriceQuote, Provider};
use rand::Rng;

use super::{FetchItems, PriceSource};

/// Largest relative move applied to a baseline price.
pub const MAX_VARIATION: f64 = 0.10;

/// Baseline used for identifiers without a catalog entry.
pub const DEFAULT_BASELINE: f64 = 100.0;

/// Default market name stamped on synthetic quotes.
pub const DEFAULT_MARKET: &str = "Nairobi Agricultural Exchange";

/// Default location stamped on synthetic quotes.
pub const DEFAULT_LOCATION: &str = "Nairobi, Kenya";

/// Generator of synthetic quotes for a single market.
#[derive(Debug, Clone)]
pub struct DemoSource {
    market: String,
    location: String,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new(DEFAULT_MARKET, DEFAULT_LOCATION)
    }
}

impl DemoSource {
    /// Create a generator stamping `market` and `location` on every quote.
    pub fn new(market: &str, location: &str) -> Self {
        Self {
            market: market.to_string(),
            location: location.to_string(),
        }
    }

    /// Move `baseline` by a random variation of at most ±[`MAX_VARIATION`].
    ///
    /// The result is rounded to two decimals and never negative.
    pub fn perturb<R: Rng>(baseline: f64, rng: &mut R) -> f64 {
        let variation: f64 = rng.random_range(-MAX_VARIATION..=MAX_VARIATION);
        round_price((baseline * (1.0 + variation)).max(0.0))
    }

    /// Generate a quote for one commodity identifier.
    pub fn quote_for<R: Rng>(&self, raw: &str, rng: &mut R) -> PriceQuote {
        let entry = commodity::resolve(raw);
        let baseline = entry.baseline_price.unwrap_or(DEFAULT_BASELINE);
        PriceQuote {
            commodity: entry.display_name,
            price: Self::perturb(baseline, rng),
            unit: entry.unit,
            currency: BASELINE_CURRENCY.to_string(),
            market: self.market.clone(),
            location: self.location.clone(),
            observed_at: Utc::now(),
            source: Provider::Demo.to_string(),
        }
    }
}

impl PriceSource for DemoSource {
    fn provider(&self) -> Provider {
        Provider::Demo
    }

    fn fetch_each(&self, commodities: &[String]) -> FetchItems {
        let mut rng = rand::rng();
        let items = if commodities.is_empty() {
            Commodity::DEMO_DEFAULTS
                .iter()
                .map(|c| Ok(self.quote_for(&c.to_string(), &mut rng)))
                .collect()
        } else {
            commodities
                .iter()
                .map(|c| Ok(self.quote_for(c, &mut rng)))
                .collect()
        };
        Ok(items)
    }
}
