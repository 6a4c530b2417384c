//! Market Client: a small CLI for the farm market-price server. It sends one
//! read request, decodes the JSON envelope and logs the result. With `--watch`
//! the query is repeated on an interval until Ctrl+C.
//!
//! Usage example (CLI):
//! ```bash
//! market_client prices --source demo --commodities wheat,rice
//! market_client --server http://10.0.0.5:5000 history maize --days 7
//! market_client --watch 60 alerts
//! ```
#![warn(missing_docs)]
mod args;

use crate::args::{Args, Query};
use clap::Parser;
use log::{error, info, warn};
use market_common::api::{
    AlertsResponse, ErrorResponse, HistoryResponse, PricesResponse, TrendsResponse,
};
use market_common::{MarketError, PriceQuote, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

const SLEEP_STEP: Duration = Duration::from_millis(200);

fn fetch(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .map_err(|e| MarketError::Server(format!("Request to {} failed: {}", url, e)))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| MarketError::Server(format!("Failed to read response: {}", e)))?;
    if status.is_success() {
        return Ok(body);
    }
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => Err(MarketError::Server(format!("{} ({}): {}", err.error, status, err.message))),
        Err(_) => Err(MarketError::Server(format!("HTTP {}", status))),
    }
}

fn log_quote(quote: &PriceQuote) {
    info!(
        "QUOTE: {} {:.2} {} {} @ {} ({}) source={} observed={}",
        quote.commodity,
        quote.price,
        quote.currency,
        quote.unit,
        quote.market,
        quote.location,
        quote.source,
        quote.observed_at
    );
}

/// Runs `query` once and logs the decoded payload.
fn run_query(client: &Client, url: &Url, query: &Query) -> Result<()> {
    let body = fetch(client, url)?;
    match query {
        Query::Prices { .. } => {
            let response: PricesResponse = serde_json::from_str(&body)?;
            let origin = response
                .source
                .map(|p| p.to_string())
                .unwrap_or_else(|| "stored".to_string());
            info!(
                "{} prices from {} (cached={})",
                response.data.len(),
                origin,
                response.cached
            );
            response.data.iter().for_each(log_quote);
        }
        Query::History { .. } => {
            let response: HistoryResponse = serde_json::from_str(&body)?;
            info!(
                "{} history over {} days: {} quotes (cached={})",
                response.commodity,
                response.period_days,
                response.data.len(),
                response.cached
            );
            response.data.iter().for_each(log_quote);
        }
        Query::Trends { .. } => {
            let response: TrendsResponse = serde_json::from_str(&body)?;
            let report = response.data;
            info!(
                "Sentiment {:?}, volatility {:.2}% (cached={})",
                report.market_sentiment, report.volatility_index, response.cached
            );
            for trend in report
                .trending_up
                .iter()
                .chain(&report.trending_down)
                .chain(&report.stable)
            {
                info!(
                    "TREND: {} {:?} {:+.2}% (price {:.2}, baseline {:.2})",
                    trend.commodity, trend.direction, trend.change_pct, trend.price, trend.baseline
                );
            }
        }
        Query::Alerts => {
            let response: AlertsResponse = serde_json::from_str(&body)?;
            if response.count == 0 {
                info!("No alerts");
            }
            for alert in &response.data {
                warn!("ALERT [{:?}] {}", alert.severity, alert.message);
            }
        }
    }
    Ok(())
}

/// Sleeps for `period` in short steps; returns early once `shutdown` is set.
fn wait(period: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + period;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_STEP.min(deadline - now));
    }
}

fn main() -> Result<(), MarketError> {
    init_logger();
    let args = Args::parse();
    let url = args.query.url(&args.server)?;
    let client = Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .map_err(|e| MarketError::Server(format!("Failed to create HTTP client: {}", e)))?;

    let Some(period) = args.watch.map(Duration::from_secs) else {
        return run_query(&client, &url, &args.query);
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| MarketError::Server(format!("Failed to set Ctrl+C handler: {}", e)))?;
    }

    info!("Watching {} every {}s. Press Ctrl+C to exit.", url, period.as_secs());
    while !shutdown.load(Ordering::Relaxed) {
        if let Err(e) = run_query(&client, &url, &args.query) {
            error!("{}", e);
        }
        wait(period, &shutdown);
    }
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
