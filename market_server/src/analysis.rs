//! Trend and alert derivation from stored quotes.
//!
//! Both work against the catalog baseline prices, which are in local currency
//! and the catalog unit. Quotes in another currency or unit, and quotes for
//! commodities without a baseline, are ignored. When several markets report the
//! same commodity, the most recent comparable quote wins.

use std::collections::HashMap;

use market_common::api::{
    AlertKind, CommodityTrend, Direction, MarketAlert, Sentiment, Severity, TrendReport,
};
use market_common::commodity::{self, Category};
use market_common::PriceQuote;

/// Deviation from baseline, in percent, above which a commodity trends.
pub const TREND_THRESHOLD_PCT: f64 = 3.0;
/// Deviation from baseline, in percent, that raises an alert.
pub const ALERT_THRESHOLD_PCT: f64 = 5.0;
/// Deviation from baseline, in percent, that makes an alert high severity.
pub const HIGH_SEVERITY_PCT: f64 = 8.0;

/// Baseline of `quote`'s commodity, if the quote is priced the way it is.
fn comparable_baseline(quote: &PriceQuote) -> Option<f64> {
    let entry = commodity::resolve(&quote.commodity);
    let same_terms = quote.currency.eq_ignore_ascii_case(commodity::BASELINE_CURRENCY)
        && quote.unit.eq_ignore_ascii_case(&entry.unit);
    same_terms.then_some(entry.baseline_price).flatten()
}

fn latest_per_commodity<'a>(quotes: impl IntoIterator<Item = &'a PriceQuote>) -> Vec<&'a PriceQuote> {
    let mut latest: HashMap<&str, &PriceQuote> = HashMap::new();
    for quote in quotes {
        latest
            .entry(quote.commodity.as_str())
            .and_modify(|current| {
                if quote.observed_at > current.observed_at {
                    *current = quote;
                }
            })
            .or_insert(quote);
    }
    let mut picked: Vec<&PriceQuote> = latest.into_values().collect();
    picked.sort_by(|a, b| a.commodity.cmp(&b.commodity));
    picked
}

/// Classify the latest quote of every commodity against its baseline.
pub fn trends(quotes: &[PriceQuote], category: Option<Category>) -> TrendReport {
    let mut report = TrendReport {
        category,
        trending_up: Vec::new(),
        trending_down: Vec::new(),
        stable: Vec::new(),
        volatility_index: 0.0,
        market_sentiment: Sentiment::Neutral,
    };

    let mut total_abs_change = 0.0;
    let mut counted = 0usize;
    let comparable = quotes.iter().filter(|q| comparable_baseline(q).is_some());
    for quote in latest_per_commodity(comparable) {
        let entry = commodity::resolve(&quote.commodity);
        if category.is_some_and(|c| c != entry.category) {
            continue;
        }
        let Some(baseline) = comparable_baseline(quote) else {
            continue;
        };
        let Some(change_pct) = quote.deviation_pct(baseline) else {
            continue;
        };

        let direction = if change_pct > TREND_THRESHOLD_PCT {
            Direction::Up
        } else if change_pct < -TREND_THRESHOLD_PCT {
            Direction::Down
        } else {
            Direction::Stable
        };
        let trend = CommodityTrend {
            commodity: quote.commodity.clone(),
            price: quote.price,
            baseline,
            change_pct: round2(change_pct),
            direction,
        };
        match direction {
            Direction::Up => report.trending_up.push(trend),
            Direction::Down => report.trending_down.push(trend),
            Direction::Stable => report.stable.push(trend),
        }
        total_abs_change += change_pct.abs();
        counted += 1;
    }

    if counted > 0 {
        report.volatility_index = round2(total_abs_change / counted as f64);
    }
    report.market_sentiment = match report.trending_up.len().cmp(&report.trending_down.len()) {
        std::cmp::Ordering::Greater => Sentiment::Bullish,
        std::cmp::Ordering::Less => Sentiment::Bearish,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    };
    report
}

/// Alerts for every stored quote that moved at least [`ALERT_THRESHOLD_PCT`].
///
/// Sorted by severity, then by size of the move, largest first.
pub fn alerts(quotes: &[PriceQuote]) -> Vec<MarketAlert> {
    let mut found: Vec<(f64, MarketAlert)> = quotes
        .iter()
        .filter_map(|quote| {
            let baseline = comparable_baseline(quote)?;
            let change_pct = quote.deviation_pct(baseline)?;
            if change_pct.abs() < ALERT_THRESHOLD_PCT {
                return None;
            }
            let (kind, verb) = if change_pct > 0.0 {
                (AlertKind::PriceSurge, "up")
            } else {
                (AlertKind::PriceDrop, "down")
            };
            let severity = if change_pct.abs() >= HIGH_SEVERITY_PCT {
                Severity::High
            } else {
                Severity::Medium
            };
            let alert = MarketAlert {
                kind,
                commodity: quote.commodity.clone(),
                market: quote.market.clone(),
                message: format!(
                    "{} prices {} {:.1}% against baseline at {}",
                    quote.commodity,
                    verb,
                    change_pct.abs(),
                    quote.market
                ),
                severity,
                timestamp: quote.observed_at,
            };
            Some((change_pct.abs(), alert))
        })
        .collect();

    found.sort_by(|(a_pct, a), (b_pct, b)| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b_pct.total_cmp(a_pct))
    });
    found.into_iter().map(|(_, alert)| alert).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
