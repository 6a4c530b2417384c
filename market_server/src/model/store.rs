//! Quote storage.
//!
//! The scheduler is the only writer; read paths only `find`. Every store is keyed
//! by `(commodity, market)`: upserting a quote for an existing pair replaces the
//! stored record, so repeating a write is always safe.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};
use market_common::commodity;
use market_common::{MarketError, PriceQuote, Result};

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the key.
    Created,
    /// An existing record was replaced.
    Updated,
}

/// Selection of stored quotes.
#[derive(Debug, Clone, Default)]
pub struct QuoteFilter {
    /// Commodity identifiers; empty selects every commodity.
    pub commodities: Vec<String>,
    /// Only quotes observed at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl QuoteFilter {
    /// Filter on a list of commodity identifiers.
    pub fn commodities(commodities: &[String]) -> Self {
        Self {
            commodities: commodities.to_vec(),
            since: None,
        }
    }

    fn matches(&self, quote: &PriceQuote, names: &[String]) -> bool {
        let commodity_ok = names.is_empty()
            || names.iter().any(|n| n.eq_ignore_ascii_case(&quote.commodity));
        let since_ok = self.since.is_none_or(|since| quote.observed_at >= since);
        commodity_ok && since_ok
    }
}

/// Storage abstraction over create/find/upsert of quotes.
pub trait QuoteStore: Send + Sync {
    /// Create or replace the record keyed by `(quote.commodity, quote.market)`.
    fn upsert(&self, quote: &PriceQuote) -> Result<UpsertOutcome>;

    /// Quotes matching `filter`, newest first.
    fn find(&self, filter: &QuoteFilter) -> Result<Vec<PriceQuote>>;

    /// Number of stored records.
    fn len(&self) -> Result<usize>;
}

type QuoteMap = HashMap<(String, String), PriceQuote>;

/// Volatile store for tests and zero-configuration runs.
#[derive(Default)]
pub struct MemoryStore {
    quotes: Mutex<QuoteMap>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records(records: Vec<PriceQuote>) -> Self {
        let quotes = records.into_iter().map(|q| (q.key(), q)).collect();
        Self {
            quotes: Mutex::new(quotes),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QuoteMap>> {
        Ok(self.quotes.lock()?)
    }
}

fn insert(map: &mut QuoteMap, quote: &PriceQuote) -> (UpsertOutcome, Option<PriceQuote>) {
    match map.insert(quote.key(), quote.clone()) {
        Some(previous) => (UpsertOutcome::Updated, Some(previous)),
        None => (UpsertOutcome::Created, None),
    }
}

fn select(map: &QuoteMap, filter: &QuoteFilter) -> Vec<PriceQuote> {
    // Resolve identifiers once so aliases such as `corn` match stored `Maize`.
    let names: Vec<String> = filter
        .commodities
        .iter()
        .map(|c| commodity::resolve(c).display_name)
        .collect();
    let mut found: Vec<PriceQuote> = map
        .values()
        .filter(|q| filter.matches(q, &names))
        .cloned()
        .collect();
    found.sort_by(|a, b| {
        b.observed_at
            .cmp(&a.observed_at)
            .then_with(|| a.commodity.cmp(&b.commodity))
            .then_with(|| a.market.cmp(&b.market))
    });
    found
}

impl QuoteStore for MemoryStore {
    fn upsert(&self, quote: &PriceQuote) -> Result<UpsertOutcome> {
        let mut map = self.lock()?;
        Ok(insert(&mut map, quote).0)
    }

    fn find(&self, filter: &QuoteFilter) -> Result<Vec<PriceQuote>> {
        let map = self.lock()?;
        Ok(select(&map, filter))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

/// Store persisted to a `bincode` snapshot file.
///
/// The whole record set is rewritten after every upsert: written to a sibling
/// temporary file, then renamed over the snapshot, so an interrupted write never
/// leaves a truncated snapshot behind. A failed write restores the previous record.
pub struct SnapshotStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl SnapshotStore {
    /// Open the snapshot at `path`; a missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<PriceQuote> = if path.exists() {
            let bytes = fs::read(&path)?;
            let (records, _) =
                bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
            records
        } else {
            Vec::new()
        };
        info!("Opened quote snapshot {} ({} records)", path.display(), records.len());
        Ok(Self {
            inner: MemoryStore::with_records(records),
            path,
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &QuoteMap) -> Result<()> {
        let records: Vec<&PriceQuote> = map.values().collect();
        let bytes = bincode::serde::encode_to_vec(&records, bincode::config::standard())?;
        let tmp = self.path.with_extension("tmp");
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Snapshot {} written ({} records)", self.path.display(), records.len());
        Ok(())
    }
}

impl QuoteStore for SnapshotStore {
    fn upsert(&self, quote: &PriceQuote) -> Result<UpsertOutcome> {
        let mut map = self.inner.lock()?;
        let (outcome, previous) = insert(&mut map, quote);
        if let Err(e) = self.persist(&map) {
            match previous {
                Some(previous) => map.insert(previous.key(), previous),
                None => map.remove(&quote.key()),
            };
            return Err(MarketError::StorageWriteFailure {
                commodity: quote.commodity.clone(),
                market: quote.market.clone(),
                reason: e.to_string(),
            });
        }
        Ok(outcome)
    }

    fn find(&self, filter: &QuoteFilter) -> Result<Vec<PriceQuote>> {
        self.inner.find(filter)
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }
}
