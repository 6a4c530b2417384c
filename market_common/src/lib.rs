//!
//! Common types and utilities shared by the market server and client.
//!
//! This crate aggregates:
//! - `error`: unified error type `MarketError` used across the workspace.
//! - `result`: handy `Result<T, MarketError>` alias.
//! - `commodity`: the commodity catalog with baseline prices and units.
//! - `provider`: selector for the interchangeable price sources.
//! - `quote`: the normalized `PriceQuote` record.
//! - `api`: JSON envelopes exchanged over the HTTP read surface.
//! - `net`: networking constants and route paths.
#![warn(missing_docs)]
pub mod api;
pub mod commodity;
pub mod error;
pub mod net;
pub mod provider;
pub mod quote;
pub mod result;

pub use commodity::{Category, Commodity, CommoditySpec};
pub use error::MarketError;
pub use provider::Provider;
pub use quote::PriceQuote;
pub use result::Result;
