//! commodities-api.com latest rates.
//!
//! One request carries every requested symbol. Rates are exchange prices in US
//! dollars per exchange unit, so quotes use the catalog's exchange unit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use market_common::commodity::{self, Commodity};
use market_common::{MarketError, PriceQuote, Provider, Result};
use serde::Deserialize;

use super::{FetchItems, PriceSource, checked_price, get_json};

/// Latest-rates endpoint of commodities-api.com.
pub const BASE_URL: &str = "https://commodities-api.com/api/latest";

const MARKET: &str = "Commodities-API";
const LOCATION: &str = "Global";
const CURRENCY: &str = "USD";

/// Body of the latest-rates endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct LatestResponse {
    /// Unix timestamp of the rates, in seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Price per provider symbol.
    #[serde(default)]
    pub data: Option<HashMap<String, f64>>,
}

/// commodities-api.com price source.
pub struct CommoditiesApiSource {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl CommoditiesApiSource {
    /// Create a source using `api_key` against the public endpoint.
    pub fn new(client: reqwest::blocking::Client, api_key: &str) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Point the source at another endpoint.
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Convert a response into one result per requested identifier.
    ///
    /// A body without `data` fails as a whole; a symbol missing from `data` or
    /// carrying an invalid price fails only its own item.
    pub fn to_quotes(response: LatestResponse, requested: &[String]) -> FetchItems {
        let provider = Provider::CommoditiesApi;
        let data = response
            .data
            .ok_or_else(|| MarketError::malformed(provider, "missing `data` object"))?;
        let observed_at = response
            .timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        let items: Vec<Result<PriceQuote>> = requested
            .iter()
            .map(|raw| {
                let entry = commodity::resolve(raw);
                let price = data
                    .get(&entry.provider_symbol)
                    .copied()
                    .ok_or_else(|| {
                        MarketError::malformed(
                            provider,
                            format!("no rate for {}", entry.provider_symbol),
                        )
                    })?;
                Ok(PriceQuote {
                    price: checked_price(provider, &entry.provider_symbol, price)?,
                    commodity: entry.display_name,
                    unit: entry.exchange_unit,
                    currency: CURRENCY.to_string(),
                    market: MARKET.to_string(),
                    location: LOCATION.to_string(),
                    observed_at,
                    source: provider.to_string(),
                })
            })
            .collect();
        Ok(items)
    }
}

impl PriceSource for CommoditiesApiSource {
    fn provider(&self) -> Provider {
        Provider::CommoditiesApi
    }

    fn fetch_each(&self, commodities: &[String]) -> FetchItems {
        let requested: Vec<String> = if commodities.is_empty() {
            Commodity::DEMO_DEFAULTS.iter().map(|c| c.to_string()).collect()
        } else {
            commodities.to_vec()
        };
        let symbols: Vec<String> = requested
            .iter()
            .map(|c| commodity::resolve(c).provider_symbol)
            .collect();

        let request = self.client.get(&self.base_url).query(&[
            ("access_key", self.api_key.as_str()),
            ("symbols", symbols.join(",").as_str()),
        ]);
        let response: LatestResponse = get_json(self.provider(), request)?;
        Self::to_quotes(response, &requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_symbols_back_to_catalog_names() {
        let body = r#"{"timestamp": 1760000000, "data": {"WHEAT": 5.42, "CORN": 4.1}}"#;
        let response: LatestResponse = serde_json::from_str(body).unwrap();
        let quotes: Vec<PriceQuote> = CommoditiesApiSource::to_quotes(
            response,
            &["wheat".to_string(), "maize".to_string()],
        )
        .unwrap()
        .into_iter()
        .collect::<Result<_>>()
        .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].commodity, "Wheat");
        assert_eq!(quotes[0].unit, "per bushel");
        assert_eq!(quotes[1].commodity, "Maize");
        assert_eq!(quotes[1].price, 4.1);
        assert_eq!(quotes[0].observed_at.timestamp(), 1760000000);
        assert_eq!(quotes[0].source, "commodities-api");
    }

    #[test]
    fn missing_data_is_malformed() {
        let response: LatestResponse = serde_json::from_str(r#"{"error": "bad key"}"#).unwrap();
        let err = CommoditiesApiSource::to_quotes(response, &["wheat".into()]).unwrap_err();
        assert!(matches!(err, MarketError::MalformedProviderResponse { .. }));
    }

    #[test]
    fn missing_symbol_fails_only_its_item() {
        let body = r#"{"data": {"WHEAT": 5.42, "COFFEE": -1.0}}"#;
        let response: LatestResponse = serde_json::from_str(body).unwrap();
        let items = CommoditiesApiSource::to_quotes(
            response,
            &["wheat".into(), "tea".into(), "coffee".into()],
        )
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().commodity, "Wheat");
        let missing = items[1].as_ref().unwrap_err();
        assert!(matches!(missing, MarketError::MalformedProviderResponse { .. }));
        assert!(missing.to_string().contains("TEA"));
        assert!(items[2].is_err());
    }

    #[test]
    fn read_path_fails_on_any_missing_symbol() {
        let body = r#"{"data": {"WHEAT": 5.42}}"#;
        let response: LatestResponse = serde_json::from_str(body).unwrap();
        let items = CommoditiesApiSource::to_quotes(response, &["wheat".into(), "coffee".into()]).unwrap();
        let err = items.into_iter().collect::<Result<Vec<_>>>().unwrap_err();
        assert!(err.to_string().contains("COFFEE"));
    }
}
