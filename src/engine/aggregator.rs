//! # engine::aggregator
//!
//! Joins the two feed streams: every price tick is paired with the most
//! recent odds quote seen for the same symbol. Quotes overwrite each other
//! (one slot per symbol), and ticks that arrive before the first quote are
//! dropped — an observation without both legs is useless downstream.
//!
//! The odds leg may be stale relative to the price leg. That staleness is the
//! whole point: a lagging odds market is exactly where the edge lives, so the
//! pair carries `odds_age_ms` instead of filtering on it.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::{AlignedObservation, OddsQuote, PriceTick};

// ─── Pairing state ────────────────────────────────────────────────────────────

/// Last-value cache of odds quotes, keyed by exchange symbol.
#[derive(Default)]
pub struct Aggregator {
    latest_odds: HashMap<String, OddsQuote>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the newest quote for its symbol, displacing any older one.
    pub fn note_quote(&mut self, quote: OddsQuote) {
        self.latest_odds.insert(quote.symbol.clone(), quote);
    }

    /// Join a tick with the freshest quote for its symbol, if one has arrived.
    pub fn pair(&self, tick: &PriceTick) -> Option<AlignedObservation> {
        let quote = self.latest_odds.get(&tick.symbol)?;
        Some(AlignedObservation {
            symbol:        tick.symbol.clone(),
            price:         tick.price,
            momentum_pct:  tick.momentum_pct,
            volume_24h:    tick.volume_24h,
            odds_midpoint: quote.midpoint,
            odds_age_ms:   tick.ts.signed_duration_since(quote.ts).num_milliseconds(),
            ts:            tick.ts,
        })
    }
}

// ─── Run loop ─────────────────────────────────────────────────────────────────

/// Consume both feeds until they close, emitting at most one observation per
/// tick. Sends to the observation channel apply backpressure; the feed side
/// of each input channel drops on full instead.
pub async fn run(
    mut price_rx: mpsc::Receiver<PriceTick>,
    mut odds_rx: mpsc::Receiver<OddsQuote>,
    obs_tx: mpsc::Sender<AlignedObservation>,
) {
    let mut agg = Aggregator::new();
    info!("[AGGREGATOR] started");

    loop {
        tokio::select! {
            Some(quote) = odds_rx.recv() => {
                debug!(symbol = %quote.symbol, midpoint = quote.midpoint, "Quote cached");
                agg.note_quote(quote);
            }
            Some(tick) = price_rx.recv() => {
                match agg.pair(&tick) {
                    Some(obs) => {
                        debug!(
                            symbol = %obs.symbol,
                            price  = obs.price,
                            odds   = obs.odds_midpoint,
                            age_ms = obs.odds_age_ms,
                            "Tick paired"
                        );
                        if obs_tx.send(obs).await.is_err() {
                            break;
                        }
                    }
                    None => debug!(symbol = %tick.symbol, "No quote yet — tick dropped"),
                }
            }
            else => break,
        }
    }

    info!("[AGGREGATOR] feeds closed — stopping");
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn make_tick(symbol: &str, price: f64) -> PriceTick {
        PriceTick {
            symbol: symbol.to_string(),
            price,
            volume_24h: 1_000_000.0,
            momentum_pct: 1.0,
            ts: Utc::now(),
        }
    }

    fn make_quote(symbol: &str, midpoint: f64) -> OddsQuote {
        OddsQuote {
            symbol: symbol.to_string(),
            market_id: format!("sim-{symbol}-0"),
            question: "Will BTC be above $65,000.00 in 15 min?".to_string(),
            midpoint,
            ts: Utc::now(),
        }
    }

    #[test]
    fn pair_before_any_quote_is_none() {
        let agg = Aggregator::new();
        assert!(agg.pair(&make_tick("btcusdt", 65_000.0)).is_none());
    }

    #[test]
    fn pair_is_symbol_scoped() {
        let mut agg = Aggregator::new();
        agg.note_quote(make_quote("ethusdt", 0.50));
        assert!(agg.pair(&make_tick("btcusdt", 65_000.0)).is_none());
    }

    #[test]
    fn pair_uses_latest_quote() {
        let mut agg = Aggregator::new();
        agg.note_quote(make_quote("btcusdt", 0.50));
        agg.note_quote(make_quote("btcusdt", 0.55));

        let obs = agg.pair(&make_tick("btcusdt", 65_000.0)).unwrap();
        assert!((obs.odds_midpoint - 0.55).abs() < 1e-9);
        assert_eq!(obs.symbol, "btcusdt");
        assert!((obs.price - 65_000.0).abs() < 1e-9);
    }

    #[test]
    fn pair_measures_quote_age() {
        let mut agg = Aggregator::new();
        let quote = make_quote("btcusdt", 0.50);
        let mut tick = make_tick("btcusdt", 65_000.0);
        tick.ts = quote.ts + ChronoDuration::milliseconds(1_500);
        agg.note_quote(quote);

        let obs = agg.pair(&tick).unwrap();
        assert_eq!(obs.odds_age_ms, 1_500);
        assert_eq!(obs.ts, tick.ts);
    }

    #[tokio::test]
    async fn run_pairs_ticks_once_a_quote_arrives() {
        let (price_tx, price_rx) = mpsc::channel(16);
        let (odds_tx, odds_rx) = mpsc::channel(16);
        let (obs_tx, mut obs_rx) = mpsc::channel(16);
        tokio::spawn(run(price_rx, odds_rx, obs_tx));

        odds_tx.send(make_quote("btcusdt", 0.52)).await.unwrap();

        // The select loop may drain a few ticks before it sees the quote, so
        // keep feeding identical ticks until one pairs.
        let obs = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                price_tx.send(make_tick("btcusdt", 65_000.0)).await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
                if let Ok(obs) = obs_rx.try_recv() {
                    return obs;
                }
            }
        })
        .await
        .expect("aggregator never emitted an observation");

        assert_eq!(obs.symbol, "btcusdt");
        assert!((obs.odds_midpoint - 0.52).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_stops_when_both_feeds_close() {
        let (price_tx, price_rx) = mpsc::channel::<PriceTick>(4);
        let (odds_tx, odds_rx) = mpsc::channel::<OddsQuote>(4);
        let (obs_tx, _obs_rx) = mpsc::channel(4);
        let handle = tokio::spawn(run(price_rx, odds_rx, obs_tx));

        drop(price_tx);
        drop(odds_tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("aggregator did not stop")
            .unwrap();
    }
}
