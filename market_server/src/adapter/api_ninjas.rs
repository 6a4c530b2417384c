//! api-ninjas.com commodity prices.
//!
//! The endpoint answers one commodity per request, so a fetch issues one lookup
//! per identifier and a failed lookup only fails that item.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use market_common::commodity::{self, Commodity};
use market_common::{PriceQuote, Provider, Result};
use serde::Deserialize;

use super::{FetchItems, PriceSource, checked_price, get_json};

/// Commodity price endpoint of api-ninjas.com.
pub const BASE_URL: &str = "https://api.api-ninjas.com/v1/commodityprice";

/// Commodities requested when no filter is given.
pub const DEFAULT_SET: [Commodity; 4] = [
    Commodity::Wheat,
    Commodity::Maize,
    Commodity::Soybeans,
    Commodity::Coffee,
];

const FALLBACK_MARKET: &str = "API Ninjas";
const LOCATION: &str = "Global";
const CURRENCY: &str = "USD";

/// Body of one commodity price lookup.
#[derive(Deserialize, Debug, Clone)]
pub struct CommodityPrice {
    /// Provider's name of the contract (ignored in favor of the catalog name).
    #[serde(default)]
    pub name: Option<String>,
    /// Exchange the contract trades on.
    #[serde(default)]
    pub exchange: Option<String>,
    /// Last price.
    pub price: f64,
    /// Unix timestamp of the last update, in seconds.
    #[serde(default)]
    pub updated: Option<i64>,
}

/// api-ninjas.com price source. Issues one request per commodity.
pub struct ApiNinjasSource {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl ApiNinjasSource {
    /// Create a source authenticating with `api_key`.
    pub fn new(client: reqwest::blocking::Client, api_key: &str) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Convert a single lookup into a quote for the requested identifier.
    pub fn to_quote(raw: &str, body: CommodityPrice) -> Result<PriceQuote> {
        let provider = Provider::ApiNinjas;
        let entry = commodity::resolve(raw);
        Ok(PriceQuote {
            price: checked_price(provider, &entry.provider_symbol, body.price)?,
            commodity: entry.display_name,
            unit: entry.exchange_unit,
            currency: CURRENCY.to_string(),
            market: body
                .exchange
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_MARKET.to_string()),
            location: LOCATION.to_string(),
            observed_at: body
                .updated
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .unwrap_or_else(Utc::now),
            source: provider.to_string(),
        })
    }
}

impl PriceSource for ApiNinjasSource {
    fn provider(&self) -> Provider {
        Provider::ApiNinjas
    }

    fn fetch_each(&self, commodities: &[String]) -> FetchItems {
        let requested: Vec<String> = if commodities.is_empty() {
            DEFAULT_SET.iter().map(|c| c.to_string()).collect()
        } else {
            commodities.to_vec()
        };

        let items = requested
            .iter()
            .map(|raw| {
                let symbol = commodity::resolve(raw).provider_symbol.to_lowercase();
                debug!("api-ninjas lookup for {}", symbol);
                let request = self
                    .client
                    .get(&self.base_url)
                    .header("X-Api-Key", &self.api_key)
                    .query(&[("name", symbol.as_str())]);
                let item = get_json(self.provider(), request).and_then(|body| Self::to_quote(raw, body));
                if let Err(e) = &item {
                    warn!("api-ninjas lookup for {} failed: {}", symbol, e);
                }
                item
            })
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::http_client;
    use crate::adapter::tests::serve_json;
    use std::time::Duration;

    fn source(body: &str) -> ApiNinjasSource {
        let client = http_client(Duration::from_secs(5)).unwrap();
        ApiNinjasSource::new(client, "k").with_base_url(&serve_json(body))
    }

    #[test]
    fn one_lookup_per_commodity() {
        let source = source(r#"{"exchange": "CBOT", "price": 10.25}"#);
        let quotes = source
            .fetch_quotes(&["soybeans".to_string(), "wheat".to_string()])
            .unwrap();
        let names: Vec<&str> = quotes.iter().map(|q| q.commodity.as_str()).collect();
        assert_eq!(names, ["Soybeans", "Wheat"]);
    }

    #[test]
    fn failed_lookups_are_separate_items() {
        let source = source(r#"{"name": "Wheat"}"#);
        let items = source.fetch_each(&[]).unwrap();
        assert_eq!(items.len(), DEFAULT_SET.len());
        assert!(items.iter().all(|item| matches!(
            item,
            Err(market_common::MarketError::MalformedProviderResponse { .. })
        )));
    }

    #[test]
    fn uses_exchange_as_market() {
        let body: CommodityPrice = serde_json::from_str(
            r#"{"exchange": "CBOT", "name": "Soybean Futures", "price": 10.25, "updated": 1760000000}"#,
        )
        .unwrap();
        let quote = ApiNinjasSource::to_quote("soybeans", body).unwrap();
        assert_eq!(quote.commodity, "Soybeans");
        assert_eq!(quote.market, "CBOT");
        assert_eq!(quote.unit, "per bushel");
        assert_eq!(quote.price, 10.25);
        assert_eq!(quote.source, "api-ninjas");
    }

    #[test]
    fn unknown_commodity_keeps_raw_name_and_fallback_unit() {
        let body: CommodityPrice = serde_json::from_str(r#"{"price": 3.0}"#).unwrap();
        let quote = ApiNinjasSource::to_quote("lumber", body).unwrap();
        assert_eq!(quote.commodity, "lumber");
        assert_eq!(quote.unit, "per unit");
        assert_eq!(quote.market, FALLBACK_MARKET);
    }

    #[test]
    fn body_without_price_does_not_parse() {
        assert!(serde_json::from_str::<CommodityPrice>(r#"{"name": "Wheat"}"#).is_err());
    }

    #[test]
    fn negative_price_is_rejected() {
        let body: CommodityPrice = serde_json::from_str(r#"{"price": -2.0}"#).unwrap();
        assert!(ApiNinjasSource::to_quote("wheat", body).is_err());
    }
}
