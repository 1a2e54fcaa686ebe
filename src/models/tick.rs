//! # models::tick
//!
//! The raw records flowing into the pipeline: [`PriceTick`] from the exchange
//! feed, [`OddsQuote`] from the prediction-market feed, and the
//! [`AlignedObservation`] the Feed Aggregator produces by pairing them.
//!
//! Every record here is immutable once constructed — downstream stages read,
//! never mutate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── PriceTick ────────────────────────────────────────────────────────────────

/// A single spot-price observation from the exchange feed.
///
/// The producer derives `momentum_pct` from its own rolling window before the
/// tick enters the price channel, so no consumer needs feed history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Lowercase exchange symbol, e.g. `"btcusdt"`.
    pub symbol: String,

    /// Last trade price in USD.
    pub price: f64,

    /// Rolling 24h quote volume as reported by the feed.
    pub volume_24h: f64,

    /// Percentage price change across the producer's rolling window.
    /// 0.0 until the window holds at least two samples.
    pub momentum_pct: f64,

    /// UTC timestamp at which the producer emitted this tick.
    pub ts: DateTime<Utc>,
}

// ─── OddsQuote ────────────────────────────────────────────────────────────────

/// A midpoint quote for one prediction-market contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsQuote {
    /// Exchange symbol the contract references, e.g. `"btcusdt"`.
    pub symbol: String,

    /// Market identifier on the odds venue.
    pub market_id: String,

    /// Human-readable contract question, e.g.
    /// `"Will BTC be above $87,000.00 in 15 min?"`.
    pub question: String,

    /// Bid/ask midpoint probability, always within (0, 1).
    pub midpoint: f64,

    pub ts: DateTime<Utc>,
}

// ─── AlignedObservation ───────────────────────────────────────────────────────

/// One price tick paired with the most recent odds midpoint for its symbol.
///
/// The aggregator emits at most one of these per [`PriceTick`], and none at
/// all before the first [`OddsQuote`] for that symbol has arrived.  The odds
/// side may be stale relative to the price side — that lag is exactly the
/// divergence the detector hunts, so it is preserved, not filtered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignedObservation {
    pub symbol: String,
    pub price: f64,
    pub momentum_pct: f64,
    pub volume_24h: f64,
    pub odds_midpoint: f64,
    /// Age of the paired odds quote at pairing time.
    pub odds_age_ms: i64,
    pub ts: DateTime<Utc>,
}
