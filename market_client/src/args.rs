//! Command-line arguments for the market client.
//!
//! This module defines the CLI interface using `clap` and turns a parsed query
//! into the request URL. See `main` for end-to-end usage.
use clap::{Parser, Subcommand};
use market_common::commodity::Category;
use market_common::net::{self, ALERTS_PATH, HTTP_PORT, PRICES_PATH, TRENDS_PATH};
use market_common::{MarketError, Provider, Result};
use reqwest::Url;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "market_client", version, about = "Query the farm market-price service", long_about = None)]
pub struct Args {
    /// Base URL of the market server.
    #[arg(long, env = "MARKET_SERVER_URL", default_value_t = default_server())]
    pub server: String,

    /// Repeat the query every N seconds until Ctrl+C.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub watch: Option<u64>,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// What to ask the server.
    #[command(subcommand)]
    pub query: Query,
}

fn default_server() -> String {
    format!("http://{}", net::addr("127.0.0.1", HTTP_PORT))
}

/// One read endpoint and its parameters.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Query {
    /// Current prices, live from a provider or as last synchronized.
    Prices {
        /// Provider to ask; without it the server answers from stored quotes.
        #[arg(long, value_enum, ignore_case = true)]
        source: Option<Provider>,
        /// Comma-separated commodities, e.g. `wheat,rice`.
        #[arg(long)]
        commodities: Option<String>,
    },
    /// Stored quotes of one commodity.
    History {
        /// Commodity identifier, e.g. `maize` or `live_cattle`.
        commodity: String,
        /// Window length in days.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Trend report, optionally for one category.
    Trends {
        /// Category such as `grains` or `dairy`.
        #[arg(long)]
        category: Option<Category>,
    },
    /// Current price alerts.
    Alerts,
}

impl Query {
    /// Full request URL of this query against `server`.
    pub fn url(&self, server: &str) -> Result<Url> {
        let base = Url::parse(server.trim())
            .map_err(|e| MarketError::InvalidQuery(format!("invalid server URL `{}`: {}", server, e)))?;
        let path = match self {
            Query::Prices { .. } => PRICES_PATH.to_string(),
            Query::History { commodity, .. } => net::history_path(commodity.trim()),
            Query::Trends { .. } => TRENDS_PATH.to_string(),
            Query::Alerts => ALERTS_PATH.to_string(),
        };
        let mut url = base
            .join(&path)
            .map_err(|e| MarketError::InvalidQuery(e.to_string()))?;

        let params: Vec<(&str, String)> = match self {
            Query::Prices { source, commodities } => {
                let mut params = Vec::new();
                if let Some(source) = source {
                    params.push(("source", source.to_string()));
                }
                if let Some(list) = commodities {
                    params.push(("commodities", list.trim().to_string()));
                }
                params
            }
            Query::History { days, .. } => days.iter().map(|d| ("days", d.to_string())).collect(),
            Query::Trends { category } => category
                .iter()
                .map(|c| ("category", c.to_string()))
                .collect(),
            Query::Alerts => Vec::new(),
        };
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }
}
