//! Price source adapter.
//!
//! Every provider implements [`PriceSource`] and returns normalized
//! [`PriceQuote`]s. [`PriceAdapter`] dispatches a request to the source registered
//! for the selected [`Provider`]; remote providers without an API key are served
//! by the synthetic demo source instead.
//!
//! Sources report one result per item. The read path collapses them into a
//! single all-or-nothing answer with [`PriceAdapter::fetch`]; the scheduler uses
//! [`PriceAdapter::fetch_each`] so a bad item only costs that item.

pub mod agmarknet;
pub mod api_ninjas;
pub mod commodities_api;
pub mod demo;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use market_common::{MarketError, PriceQuote, Provider, Result};

pub use agmarknet::AgmarknetSource;
pub use api_ninjas::ApiNinjasSource;
pub use commodities_api::CommoditiesApiSource;
pub use demo::DemoSource;

const USER_AGENT: &str = "farm-market-sync/0.1";

/// Outcome of a fetch: the request as a whole, then every item on its own.
pub type FetchItems = Result<Vec<Result<PriceQuote>>>;

/// A provider of commodity quotes.
pub trait PriceSource: Send + Sync {
    /// Provider this source implements.
    fn provider(&self) -> Provider;

    /// Fetch one result per requested commodity identifier, or per item of the
    /// provider's default set when `commodities` is empty.
    ///
    /// The outer error means the provider could not be asked at all; an inner
    /// error affects only that item.
    fn fetch_each(&self, commodities: &[String]) -> FetchItems;

    /// Fetch every quote or fail with the first item error.
    fn fetch_quotes(&self, commodities: &[String]) -> Result<Vec<PriceQuote>> {
        self.fetch_each(commodities)?.into_iter().collect()
    }
}

/// Build the blocking HTTP client shared by the remote sources.
///
/// Every request made with it is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| MarketError::Server(format!("Failed to create HTTP client: {}", e)))
}

/// Send `request` and decode a JSON body, mapping every failure to a provider error.
pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    provider: Provider,
    request: reqwest::blocking::RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .map_err(|e| MarketError::unavailable(provider, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(MarketError::unavailable(provider, format!("HTTP {}", status)));
    }
    let body = response
        .text()
        .map_err(|e| MarketError::unavailable(provider, e))?;
    serde_json::from_str(&body).map_err(|e| MarketError::malformed(provider, e))
}

/// Reject negative or non-finite prices coming from a remote payload.
pub(crate) fn checked_price(provider: Provider, symbol: &str, price: f64) -> Result<f64> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(MarketError::malformed(
            provider,
            format!("invalid price {} for {}", price, symbol),
        ))
    }
}

/// Dispatches quote requests to the registered sources.
pub struct PriceAdapter {
    demo: Arc<dyn PriceSource>,
    sources: HashMap<Provider, Arc<dyn PriceSource>>,
}

impl PriceAdapter {
    /// Adapter that only knows the demo source.
    pub fn new(demo: DemoSource) -> Self {
        Self {
            demo: Arc::new(demo),
            sources: HashMap::new(),
        }
    }

    /// Register `source` for its provider, replacing the previous one.
    pub fn register(&mut self, source: Arc<dyn PriceSource>) {
        let provider = source.provider();
        debug!("Registered price source {}", provider);
        if provider == Provider::Demo {
            self.demo = source;
        } else {
            self.sources.insert(provider, source);
        }
    }

    /// Builder-style [`Self::register`].
    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.register(source);
        self
    }

    /// Whether `provider` is served by a real source (not the demo fallback).
    pub fn is_live(&self, provider: Provider) -> bool {
        provider == Provider::Demo || self.sources.contains_key(&provider)
    }

    fn source_for(&self, provider: Provider) -> &Arc<dyn PriceSource> {
        match (provider, self.sources.get(&provider)) {
            (Provider::Demo, _) => &self.demo,
            (_, Some(source)) => source,
            (_, None) => {
                warn!("{} has no API key configured, serving demo quotes", provider);
                &self.demo
            }
        }
    }

    /// Fetch quotes from `provider`. Any failed item fails the whole request.
    pub fn fetch(&self, provider: Provider, commodities: &[String]) -> Result<Vec<PriceQuote>> {
        let source = self.source_for(provider);
        let quotes = source.fetch_quotes(commodities)?;
        debug!("{} returned {} quotes", source.provider(), quotes.len());
        Ok(quotes)
    }

    /// Fetch from `provider`, keeping item failures separate.
    pub fn fetch_each(&self, provider: Provider, commodities: &[String]) -> FetchItems {
        let source = self.source_for(provider);
        let items = source.fetch_each(commodities)?;
        debug!("{} returned {} items", source.provider(), items.len());
        Ok(items)
    }
}
