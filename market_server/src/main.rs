//! Farm market-price server.
//!
//! The binary wires together four building blocks:
//!
//! - `PriceAdapter` turns one of several providers (or the synthetic demo
//!   source) into normalized `PriceQuote`s.
//! - `SyncScheduler` runs the adapter at start and then on a fixed interval,
//!   upserting every quote into the `QuoteStore` by `(commodity, market)`.
//! - `MarketService` answers reads through a TTL query cache.
//! - `HttpServer` exposes the reads as JSON over a pool of `tiny_http` workers.
//!
//! Shutdown:
//! - Ctrl+C signals the main thread over a crossbeam channel.
//! - HTTP workers are stopped first, then the scheduler, which finishes the quote
//!   it is storing and abandons the rest of its cycle.
//!
//! Every option has a default; see `config` for the flags and environment
//! variables.
#![warn(missing_docs)]
use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::scheduler::SyncScheduler;
use crate::service::MarketService;
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;
use market_common::MarketError;
use market_common::Result;
use std::sync::Arc;

pub mod adapter;
pub mod analysis;
pub mod config;
pub mod http;
pub mod model;
pub mod scheduler;
pub mod service;

fn main() -> Result<(), MarketError> {
    init_logger();
    let config = ServerConfig::parse();

    let store = config.build_store()?;
    let adapter = Arc::new(config.build_adapter()?);
    let service = Arc::new(MarketService::new(
        Arc::clone(&adapter),
        Arc::clone(&store),
        config.cache_ttl(),
    ));
    info!(
        "Cache TTL {}s, fetch timeout {}s, {} quotes in store",
        config.cache_ttl_secs,
        config.fetch_timeout_secs,
        store.len()?
    );

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down server...");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| MarketError::Server(format!("Failed to set Ctrl+C handler: {}", e)))?;

    let mut scheduler = SyncScheduler::start(adapter, store, config.sync_options());
    let mut http = HttpServer::start(&config.bind, config.workers, service)?;

    let _ = shutdown_rx.recv();
    http.stop();
    scheduler.stop();
    info!("Server stopped");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
