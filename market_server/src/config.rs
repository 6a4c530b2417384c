//! Server configuration.
//!
//! Every option can be given as a flag or through the environment, and every
//! option has a default, so the server runs without any configuration: demo
//! quotes, in-memory storage, five-minute cache, hourly synchronization.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;
use market_common::{Provider, Result};

use crate::adapter::{
    self, AgmarknetSource, ApiNinjasSource, CommoditiesApiSource, DemoSource, PriceAdapter,
    demo::{DEFAULT_LOCATION, DEFAULT_MARKET},
};
use crate::model::store::{MemoryStore, QuoteStore, SnapshotStore};
use crate::scheduler::SyncOptions;

/// Parsed server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "market_server", version, about = "Farm market-price service", long_about = None)]
pub struct ServerConfig {
    /// Address the HTTP read surface listens on.
    #[arg(long, env = "MARKET_BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// Number of HTTP worker threads.
    #[arg(long, env = "MARKET_HTTP_WORKERS", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Lifetime of query cache entries, in seconds.
    #[arg(long, env = "MARKET_CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Time between two synchronization cycles, in seconds.
    #[arg(long, env = "MARKET_SYNC_INTERVAL_SECS", default_value_t = 3600,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub sync_interval_secs: u64,

    /// Provider the scheduler synchronizes from.
    #[arg(long, env = "MARKET_SYNC_SOURCE", value_enum, ignore_case = true, default_value_t = Provider::Demo)]
    pub sync_source: Provider,

    /// Comma-separated commodities to synchronize; empty means the provider default set.
    #[arg(long, env = "MARKET_SYNC_COMMODITIES", default_value = "")]
    pub sync_commodities: String,

    /// Timeout of every call to an external provider, in seconds.
    #[arg(long, env = "MARKET_FETCH_TIMEOUT_SECS", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout_secs: u64,

    /// Snapshot file for quotes; without it quotes are kept in memory only.
    #[arg(long, env = "MARKET_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Market name stamped on demo quotes.
    #[arg(long, env = "MARKET_NAME", default_value = DEFAULT_MARKET)]
    pub market_name: String,

    /// Location stamped on demo quotes.
    #[arg(long, env = "MARKET_LOCATION", default_value = DEFAULT_LOCATION)]
    pub market_location: String,

    /// commodities-api.com access key.
    #[arg(long, env = "COMMODITIES_API_KEY", hide_env_values = true)]
    pub commodities_api_key: Option<String>,

    /// api-ninjas.com key.
    #[arg(long, env = "API_NINJAS_KEY", hide_env_values = true)]
    pub api_ninjas_key: Option<String>,

    /// data.gov.in key for Agmarknet.
    #[arg(long, env = "DATA_GOV_IN_KEY", hide_env_values = true)]
    pub data_gov_in_key: Option<String>,
}

impl ServerConfig {
    /// Query cache time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Synchronization cadence.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Provider call timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Usable API key of `provider`. Blank values and the placeholder `demo`
    /// count as absent.
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Demo => None,
            Provider::CommoditiesApi => self.commodities_api_key.as_deref(),
            Provider::ApiNinjas => self.api_ninjas_key.as_deref(),
            Provider::Agmarknet => self.data_gov_in_key.as_deref(),
        };
        key.map(str::trim)
            .filter(|k| !k.is_empty() && !k.eq_ignore_ascii_case("demo"))
    }

    /// Scheduler settings.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            provider: self.sync_source,
            commodities: market_common::commodity::parse_list(&self.sync_commodities),
            interval: self.sync_interval(),
        }
    }

    /// Adapter with the demo source plus every remote source that has a key.
    pub fn build_adapter(&self) -> Result<PriceAdapter> {
        let demo = DemoSource::new(&self.market_name, &self.market_location);
        let mut adapter = PriceAdapter::new(demo);
        let client = adapter::http_client(self.fetch_timeout())?;

        if let Some(key) = self.api_key(Provider::CommoditiesApi) {
            adapter.register(Arc::new(CommoditiesApiSource::new(client.clone(), key)));
        }
        if let Some(key) = self.api_key(Provider::ApiNinjas) {
            adapter.register(Arc::new(ApiNinjasSource::new(client.clone(), key)));
        }
        if let Some(key) = self.api_key(Provider::Agmarknet) {
            adapter.register(Arc::new(AgmarknetSource::new(client, key)));
        }
        Ok(adapter)
    }

    /// Snapshot store when a path is configured, memory store otherwise.
    pub fn build_store(&self) -> Result<Arc<dyn QuoteStore>> {
        match &self.store_path {
            Some(path) => Ok(Arc::new(SnapshotStore::open(path)?)),
            None => {
                info!("No store path configured, keeping quotes in memory");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}
