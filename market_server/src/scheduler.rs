//! Periodic market-price synchronization.
//!
//! The `SyncScheduler` runs a background thread that asks the [`PriceAdapter`]
//! for the configured provider's quotes and upserts them into the [`QuoteStore`].
//!
//! Event model:
//! - one cycle right after start, then one per tick of a `crossbeam_channel::tick`
//!   timer;
//! - crossbeam `select!` multiplexes the timer with the stop channel;
//! - dropping the stop sender is the shutdown signal, so it is observed both by the
//!   `select!` and between items of a running cycle.
//!
//! Design notes:
//! - A single worker thread means cycles never overlap. The tick channel holds at
//!   most one pending tick, so a late tick runs strictly after the current cycle.
//! - A quote the provider could not deliver, or a failed upsert, is logged and
//!   counted; the cycle moves on to the next item.
//! - Errors and panics of one cycle are logged; the timer loop keeps running.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, TryRecvError, select, tick};
use log::{error, info, warn};
use market_common::{Provider, Result};

use crate::adapter::PriceAdapter;
use crate::model::store::{QuoteStore, UpsertOutcome};

/// Default cadence of the synchronization.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// What to synchronize and how often.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Provider asked on every cycle.
    pub provider: Provider,
    /// Commodity identifiers; empty means the provider's default set.
    pub commodities: Vec<String>,
    /// Time between two cycles.
    pub interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            provider: Provider::Demo,
            commodities: Vec::new(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Outcome of one synchronization cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items returned by the adapter, rejected ones included.
    pub fetched: usize,
    /// Newly created records.
    pub created: usize,
    /// Replaced records.
    pub updated: usize,
    /// Items rejected by the provider plus upserts that failed.
    pub failed: usize,
    /// Whether shutdown interrupted the cycle before every quote was handled.
    pub abandoned: bool,
}

impl SyncReport {
    /// Quotes written successfully.
    pub fn stored(&self) -> usize {
        self.created + self.updated
    }
}

/// Handle of the background synchronization thread.
pub struct SyncScheduler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Start the synchronization thread. The first cycle runs immediately.
    pub fn start(
        adapter: Arc<PriceAdapter>,
        store: Arc<dyn QuoteStore>,
        options: SyncOptions,
    ) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = thread::spawn(move || {
            info!(
                "Market sync started: provider={}, every {}s (Thread ID: {:?})",
                options.provider,
                options.interval.as_secs(),
                thread::current().id()
            );
            let ticker = tick(options.interval);
            run_guarded(&adapter, store.as_ref(), &options, &stop_rx);

            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => run_guarded(&adapter, store.as_ref(), &options, &stop_rx),
                }
            }
            info!("Market sync stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signal shutdown and wait for the thread. A running cycle finishes its
    /// current item and abandons the rest.
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Market sync thread panicked");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    matches!(stop_rx.try_recv(), Ok(()) | Err(TryRecvError::Disconnected))
}

// Never lets an error or a panic escape into the timer loop.
fn run_guarded(
    adapter: &PriceAdapter,
    store: &dyn QuoteStore,
    options: &SyncOptions,
    stop_rx: &Receiver<()>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run_cycle(adapter, store, options, stop_rx)
    }));
    match outcome {
        Ok(Ok(report)) => info!(
            "Market data updated: {} fetched, {} created, {} updated, {} failed{}",
            report.fetched,
            report.created,
            report.updated,
            report.failed,
            if report.abandoned { " (abandoned on shutdown)" } else { "" }
        ),
        Ok(Err(e)) => error!("Market sync cycle failed: {}", e),
        Err(_) => error!("Market sync cycle panicked; waiting for next tick"),
    }
}

/// Run one synchronization cycle.
///
/// A provider that cannot be asked at all aborts the cycle with its error.
/// Rejected items and upsert errors are logged and counted. Every quote is
/// stamped with the current time before it is written.
pub fn run_cycle(
    adapter: &PriceAdapter,
    store: &dyn QuoteStore,
    options: &SyncOptions,
    stop_rx: &Receiver<()>,
) -> Result<SyncReport> {
    let items = adapter.fetch_each(options.provider, &options.commodities)?;
    let mut report = SyncReport {
        fetched: items.len(),
        ..SyncReport::default()
    };

    for item in items {
        if stop_requested(stop_rx) {
            warn!("Shutdown requested, abandoning remaining quotes of this cycle");
            report.abandoned = true;
            break;
        }
        let mut quote = match item {
            Ok(quote) => quote,
            Err(e) => {
                warn!("Quote from {} rejected: {}", options.provider, e);
                report.failed += 1;
                continue;
            }
        };
        quote.observed_at = Utc::now();
        match store.upsert(&quote) {
            Ok(UpsertOutcome::Created) => report.created += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Err(e) => {
                error!("Upsert of {}@{} failed: {}", quote.commodity, quote.market, e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::{CountingSource, serve_json};
    use crate::adapter::{self, CommoditiesApiSource, DemoSource, FetchItems, PriceSource};
    use crate::model::store::{MemoryStore, QuoteFilter};
    use market_common::commodity::Commodity;
    use market_common::{MarketError, PriceQuote};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that fails the n-th upsert (1-based).
    struct FlakyStore {
        inner: MemoryStore,
        calls: AtomicUsize,
        fail_on: usize,
    }

    impl QuoteStore for FlakyStore {
        fn upsert(&self, quote: &PriceQuote) -> Result<UpsertOutcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on {
                return Err(MarketError::StorageWriteFailure {
                    commodity: quote.commodity.clone(),
                    market: quote.market.clone(),
                    reason: "disk full".to_string(),
                });
            }
            self.inner.upsert(quote)
        }

        fn find(&self, filter: &QuoteFilter) -> Result<Vec<PriceQuote>> {
            self.inner.find(filter)
        }

        fn len(&self) -> Result<usize> {
            self.inner.len()
        }
    }

    struct PanickingStore;

    impl QuoteStore for PanickingStore {
        fn upsert(&self, _quote: &PriceQuote) -> Result<UpsertOutcome> {
            panic!("storage driver bug");
        }

        fn find(&self, _filter: &QuoteFilter) -> Result<Vec<PriceQuote>> {
            Ok(Vec::new())
        }

        fn len(&self) -> Result<usize> {
            Ok(0)
        }
    }

    /// Demo quotes tagged as `provider`, with the n-th item (1-based) rejected.
    struct RejectingSource {
        provider: Provider,
        reject: usize,
    }

    impl PriceSource for RejectingSource {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn fetch_each(&self, commodities: &[String]) -> FetchItems {
            let quotes = DemoSource::default().fetch_quotes(commodities)?;
            Ok(quotes
                .into_iter()
                .enumerate()
                .map(|(i, quote)| {
                    if i + 1 == self.reject {
                        Err(MarketError::malformed(self.provider, format!("no rate for {}", quote.commodity)))
                    } else {
                        Ok(quote)
                    }
                })
                .collect())
        }
    }

    fn demo_adapter() -> PriceAdapter {
        PriceAdapter::new(DemoSource::default())
    }

    #[test]
    fn cycle_upserts_default_set() {
        let store = MemoryStore::new();
        let report = run_cycle(
            &demo_adapter(),
            &store,
            &SyncOptions::default(),
            &crossbeam_channel::never(),
        )
        .unwrap();

        assert_eq!(report.fetched, Commodity::DEMO_DEFAULTS.len());
        assert_eq!(report.created, Commodity::DEMO_DEFAULTS.len());
        assert_eq!(store.len().unwrap(), Commodity::DEMO_DEFAULTS.len());
    }

    #[test]
    fn repeated_cycles_update_instead_of_duplicating() {
        let store = MemoryStore::new();
        let never = crossbeam_channel::never();
        let options = SyncOptions::default();
        run_cycle(&demo_adapter(), &store, &options, &never).unwrap();
        let before = store.find(&QuoteFilter::default()).unwrap();

        let report = run_cycle(&demo_adapter(), &store, &options, &never).unwrap();
        assert_eq!(report.updated, Commodity::DEMO_DEFAULTS.len());
        assert_eq!(store.len().unwrap(), Commodity::DEMO_DEFAULTS.len());

        let after = store.find(&QuoteFilter::default()).unwrap();
        let latest_before = before.iter().map(|q| q.observed_at).max().unwrap();
        assert!(after.iter().all(|q| q.observed_at >= latest_before));
    }

    #[test]
    fn failed_item_does_not_block_the_batch() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
            fail_on: 3,
        };
        let report = run_cycle(
            &demo_adapter(),
            &store,
            &SyncOptions::default(),
            &crossbeam_channel::never(),
        )
        .unwrap();

        assert_eq!(report.fetched, 10);
        assert_eq!(report.failed, 1);
        assert_eq!(report.stored(), 9);

        let stored: Vec<String> = store
            .find(&QuoteFilter::default())
            .unwrap()
            .into_iter()
            .map(|q| q.commodity)
            .collect();
        let third = Commodity::DEMO_DEFAULTS[2].to_string();
        assert!(!stored.contains(&third));
        for (i, commodity) in Commodity::DEMO_DEFAULTS.iter().enumerate() {
            if i != 2 {
                assert!(stored.contains(&commodity.to_string()), "{commodity} missing");
            }
        }
    }

    #[test]
    fn rejected_item_does_not_block_the_batch() {
        let adapter = demo_adapter().with_source(Arc::new(RejectingSource {
            provider: Provider::ApiNinjas,
            reject: 3,
        }));
        let store = MemoryStore::new();
        let options = SyncOptions {
            provider: Provider::ApiNinjas,
            ..SyncOptions::default()
        };
        let report = run_cycle(&adapter, &store, &options, &crossbeam_channel::never()).unwrap();

        assert_eq!(report.fetched, 10);
        assert_eq!(report.failed, 1);
        assert_eq!(report.stored(), 9);
        assert_eq!(store.len().unwrap(), 9);
        let third = Commodity::DEMO_DEFAULTS[2].to_string();
        assert!(store.find(&QuoteFilter::commodities(&[third])).unwrap().is_empty());
    }

    #[test]
    fn symbol_missing_from_remote_payload_costs_only_that_quote() {
        let url = serve_json(
            r#"{"timestamp": 1760000000, "data": {
                "CORN": 4.1, "WHEAT": 5.42, "RICE": 15.2, "BEANS": 30.5, "COFFEE": 3.8,
                "SUGAR": 0.19, "MILK": 17.3, "TOMATOES": 1.2, "ONIONS": 0.9}}"#,
        );
        let client = adapter::http_client(Duration::from_secs(5)).unwrap();
        let source = CommoditiesApiSource::new(client, "k").with_base_url(&url);
        let adapter = demo_adapter().with_source(Arc::new(source));
        let store = MemoryStore::new();
        let options = SyncOptions {
            provider: Provider::CommoditiesApi,
            ..SyncOptions::default()
        };
        let report = run_cycle(&adapter, &store, &options, &crossbeam_channel::never()).unwrap();

        assert_eq!(report.fetched, 10);
        assert_eq!(report.failed, 1);
        assert_eq!(report.stored(), 9);
        let stored = store.find(&QuoteFilter::default()).unwrap();
        assert_eq!(stored.len(), 9);
        assert!(stored.iter().all(|q| q.commodity != "Tea" && q.source == "commodities-api"));
    }

    #[test]
    fn provider_failure_aborts_cycle_without_writes() {
        let adapter = demo_adapter()
            .with_source(Arc::new(CountingSource::failing(Provider::CommoditiesApi)));
        let store = MemoryStore::new();
        let options = SyncOptions {
            provider: Provider::CommoditiesApi,
            ..SyncOptions::default()
        };
        assert!(run_cycle(&adapter, &store, &options, &crossbeam_channel::never()).is_err());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn shutdown_abandons_remaining_items() {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        drop(stop_tx);
        let store = MemoryStore::new();
        let report = run_cycle(&demo_adapter(), &store, &SyncOptions::default(), &stop_rx).unwrap();
        assert!(report.abandoned);
        assert_eq!(report.stored(), 0);
    }

    #[test]
    fn start_runs_first_cycle_immediately_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let options = SyncOptions {
            interval: Duration::from_secs(3600),
            ..SyncOptions::default()
        };
        let mut scheduler = SyncScheduler::start(Arc::new(demo_adapter()), store.clone(), options);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.len().unwrap() < Commodity::DEMO_DEFAULTS.len() {
            assert!(std::time::Instant::now() < deadline, "first cycle did not run");
            thread::sleep(Duration::from_millis(10));
        }
        scheduler.stop();
        scheduler.stop();
    }

    #[test]
    fn ticks_keep_firing_after_a_failed_cycle() {
        let source = Arc::new(CountingSource::failing(Provider::ApiNinjas));
        let adapter = demo_adapter().with_source(source.clone());
        let options = SyncOptions {
            provider: Provider::ApiNinjas,
            commodities: vec![],
            interval: Duration::from_millis(20),
        };
        let mut scheduler = SyncScheduler::start(Arc::new(adapter), Arc::new(MemoryStore::new()), options);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while source.calls() < 3 {
            assert!(std::time::Instant::now() < deadline, "timer loop stopped");
            thread::sleep(Duration::from_millis(10));
        }
        scheduler.stop();
    }

    #[test]
    fn panicking_cycle_does_not_kill_the_timer() {
        let options = SyncOptions {
            interval: Duration::from_millis(20),
            ..SyncOptions::default()
        };
        let source = Arc::new(CountingSource::new(Provider::Demo));
        let adapter = demo_adapter().with_source(source.clone());
        let mut scheduler = SyncScheduler::start(Arc::new(adapter), Arc::new(PanickingStore), options);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while source.calls() < 2 {
            assert!(std::time::Instant::now() < deadline, "timer loop died");
            thread::sleep(Duration::from_millis(10));
        }
        scheduler.stop();
    }
}
