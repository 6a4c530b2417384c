//! Read path of the market endpoints.
//!
//! Every cached read follows the same shape: build the deterministic key, answer
//! from the cache when the entry is fresh, otherwise compute the payload (adapter
//! call or storage read), cache it and answer with `cached = false`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use market_common::api::{DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS, MarketAlert, TrendReport};
use market_common::commodity::Category;
use market_common::{MarketError, PriceQuote, Provider, Result};

use crate::adapter::PriceAdapter;
use crate::analysis;
use crate::model::cache::{CacheKey, TtlCache};
use crate::model::store::{QuoteFilter, QuoteStore};

/// Parameters of a price listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceQuery {
    /// Provider to ask; `None` reads the quotes synced by the scheduler.
    pub source: Option<Provider>,
    /// Commodity identifiers; empty means the provider's default set.
    pub commodities: Vec<String>,
}

/// A payload together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    /// The payload.
    pub value: T,
    /// Whether it was served from the cache.
    pub cached: bool,
}

/// Payloads kept in the query cache.
#[derive(Debug, Clone)]
enum CachedPayload {
    Quotes(Vec<PriceQuote>),
    Trends(TrendReport),
}

/// Market read service shared by all HTTP workers.
pub struct MarketService {
    adapter: Arc<PriceAdapter>,
    store: Arc<dyn QuoteStore>,
    cache: TtlCache<CachedPayload>,
}

impl MarketService {
    /// Create a service whose cache entries live for `cache_ttl`.
    pub fn new(adapter: Arc<PriceAdapter>, store: Arc<dyn QuoteStore>, cache_ttl: Duration) -> Self {
        Self {
            adapter,
            store,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Current quotes, from a provider or from storage.
    pub fn prices(&self, query: &PriceQuery) -> Result<Cached<Vec<PriceQuote>>> {
        let key = CacheKey::prices(query.source, &query.commodities);
        if let Some(CachedPayload::Quotes(quotes)) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            return Ok(Cached { value: quotes, cached: true });
        }

        let quotes = match query.source {
            Some(provider) => self.adapter.fetch(provider, &query.commodities)?,
            None => self.store.find(&QuoteFilter::commodities(&query.commodities))?,
        };
        info!("Computed {} ({} quotes)", key, quotes.len());
        self.cache.set(key, CachedPayload::Quotes(quotes.clone()));
        Ok(Cached { value: quotes, cached: false })
    }

    /// Stored quotes of `commodity` observed within the last `days` days.
    pub fn history(&self, commodity: &str, days: Option<u32>) -> Result<Cached<Vec<PriceQuote>>> {
        let days = validate_days(days)?;
        if commodity.trim().is_empty() {
            return Err(MarketError::InvalidQuery("commodity must not be empty".to_string()));
        }
        let key = CacheKey::history(commodity, days);
        if let Some(CachedPayload::Quotes(quotes)) = self.cache.get(&key) {
            return Ok(Cached { value: quotes, cached: true });
        }

        let filter = QuoteFilter {
            commodities: vec![commodity.to_string()],
            since: Some(Utc::now() - chrono::Duration::days(i64::from(days))),
        };
        let quotes = self.store.find(&filter)?;
        self.cache.set(key, CachedPayload::Quotes(quotes.clone()));
        Ok(Cached { value: quotes, cached: false })
    }

    /// Trend report over stored quotes, optionally limited to one category.
    pub fn trends(&self, category: Option<Category>) -> Result<Cached<TrendReport>> {
        let label = category.map(|c| c.to_string());
        let key = CacheKey::trends(label.as_deref());
        if let Some(CachedPayload::Trends(report)) = self.cache.get(&key) {
            return Ok(Cached { value: report, cached: true });
        }

        let quotes = self.store.find(&QuoteFilter::default())?;
        let report = analysis::trends(&quotes, category);
        self.cache.set(key, CachedPayload::Trends(report.clone()));
        Ok(Cached { value: report, cached: false })
    }

    /// Alerts over stored quotes. Always computed fresh.
    pub fn alerts(&self) -> Result<Vec<MarketAlert>> {
        let quotes = self.store.find(&QuoteFilter::default())?;
        Ok(analysis::alerts(&quotes))
    }
}

/// Apply the default history window and reject out-of-range values.
pub fn validate_days(days: Option<u32>) -> Result<u32> {
    match days.unwrap_or(DEFAULT_HISTORY_DAYS) {
        d @ 1..=MAX_HISTORY_DAYS => Ok(d),
        d => Err(MarketError::InvalidQuery(format!(
            "days must be between 1 and {}, got {}",
            MAX_HISTORY_DAYS, d
        ))),
    }
}
