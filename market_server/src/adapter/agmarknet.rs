//! data.gov.in Agmarknet mandi prices.
//!
//! The resource lists daily prices per Indian wholesale market. Prices are
//! quoted in rupees per quintal and arrive as strings. A requested commodity
//! that no market reports comes back as a failed item of its own.

use chrono::Utc;
use log::warn;
use market_common::commodity;
use market_common::{MarketError, PriceQuote, Provider, Result};
use serde::{Deserialize, Deserializer};

use super::{FetchItems, PriceSource, checked_price, get_json};

/// Daily mandi price resource.
pub const BASE_URL: &str =
    "https://api.data.gov.in/resource/9ef84268-d588-465a-a308-a864a43d0070";

const RECORD_LIMIT: &str = "100";
const UNIT: &str = "per quintal";
const CURRENCY: &str = "INR";

/// Body of the resource query.
#[derive(Deserialize, Debug, Clone)]
pub struct RecordsResponse {
    /// Price records; absent on error payloads.
    #[serde(default)]
    pub records: Option<Vec<MandiRecord>>,
}

/// One market/commodity price row.
#[derive(Deserialize, Debug, Clone)]
pub struct MandiRecord {
    /// State of the market.
    #[serde(default)]
    pub state: String,
    /// District of the market.
    #[serde(default)]
    pub district: String,
    /// Market (mandi) name.
    pub market: String,
    /// Commodity name as reported.
    pub commodity: String,
    /// Most frequent traded price of the day.
    #[serde(deserialize_with = "deserialize_price")]
    pub modal_price: f64,
}

// Prices arrive as strings ("2150") but occasionally as plain numbers.
fn deserialize_price<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Number(f64),
        Text(String),
    }

    match RawPrice::deserialize(deserializer)? {
        RawPrice::Number(n) => Ok(n),
        RawPrice::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Agmarknet price source.
pub struct AgmarknetSource {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl AgmarknetSource {
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

    /// Convert records into quotes, keeping only the requested commodities.
    ///
    /// Several markets may report the same commodity; each becomes its own
    /// item. Every requested commodity without any record adds a malformed item.
    pub fn to_quotes(response: RecordsResponse, requested: &[String]) -> FetchItems {
        let provider = Provider::Agmarknet;
        let records = response
            .records
            .ok_or_else(|| MarketError::malformed(provider, "missing `records` array"))?;
        let wanted: Vec<String> = requested
            .iter()
            .map(|c| commodity::resolve(c).display_name)
            .collect();
        let mut found = vec![false; wanted.len()];
        let observed_at = Utc::now();

        let mut items: Vec<Result<PriceQuote>> = Vec::new();
        for record in records {
            let entry = commodity::resolve(&record.commodity);
            let matched: Vec<usize> = wanted
                .iter()
                .enumerate()
                .filter(|(_, w)| w.eq_ignore_ascii_case(&entry.display_name))
                .map(|(i, _)| i)
                .collect();
            if !wanted.is_empty() && matched.is_empty() {
                continue;
            }
            matched.iter().for_each(|&i| found[i] = true);
            items.push(
                checked_price(provider, &record.commodity, record.modal_price).map(|price| {
                    PriceQuote {
                        price,
                        commodity: entry.display_name,
                        unit: UNIT.to_string(),
                        currency: CURRENCY.to_string(),
                        location: location(&record.district, &record.state),
                        market: record.market,
                        observed_at,
                        source: provider.to_string(),
                    }
                }),
            );
        }

        for (name, _) in wanted.iter().zip(&found).filter(|(_, found)| !**found) {
            warn!("Agmarknet has no record for {}", name);
            items.push(Err(MarketError::malformed(
                provider,
                format!("no record for {}", name),
            )));
        }
        Ok(items)
    }
}

fn location(district: &str, state: &str) -> String {
    match (district.trim(), state.trim()) {
        ("", "") => "India".to_string(),
        ("", state) => state.to_string(),
        (district, "") => district.to_string(),
        (district, state) => format!("{}, {}", district, state),
    }
}

impl PriceSource for AgmarknetSource {
    fn provider(&self) -> Provider {
        Provider::Agmarknet
    }

    fn fetch_each(&self, commodities: &[String]) -> FetchItems {
        let request = self.client.get(&self.base_url).query(&[
            ("api-key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", RECORD_LIMIT),
        ]);
        let response: RecordsResponse = get_json(self.provider(), request)?;
        Self::to_quotes(response, commodities)
    }
}
