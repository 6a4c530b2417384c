//! Domain models and utilities for the market server.
//!
//! This module groups the stateful building blocks shared by the scheduler and
//! the read service:
//! - `cache`: TTL query cache and deterministic cache keys.
//! - `store`: quote storage abstraction with in-memory and snapshot backends.

pub mod cache;
pub mod store;
