//! # feeds::odds
//!
//! Simulated prediction-market feed. Generates strike markets around spot
//! ("Will BTC be above $X in 15 min?") and prices them from a *lagged* copy
//! of the price stream plus uniform noise — the lag is what manufactures the
//! stale odds the detector hunts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::config::Config;
use crate::feeds::{default_price, SpotBoard};
use crate::models::OddsQuote;

// ─── Market generation ────────────────────────────────────────────────────────

/// One synthetic 15-minute strike market.
#[derive(Debug, Clone)]
pub struct SimMarket {
    pub market_id: String,
    pub symbol: String,
    pub question: String,
    pub strike: f64,
}

/// Build strike markets around the current spot level of each symbol.
///
/// Three-market default: one strike below spot, one at spot, one above. Any
/// extra markets stack further above. Falls back to the flat default levels
/// when the walk has not produced a price yet.
pub async fn generate_markets(config: &Config, board: &SpotBoard) -> Vec<SimMarket> {
    let spread = config.sim_strike_spread_pct / 100.0;
    let mut markets = Vec::new();

    for symbol in &config.symbols {
        let spot = match board.latest(symbol).await {
            Some(p) => p,
            None => default_price(symbol),
        };
        let ticker = symbol.trim_end_matches("usdt").to_uppercase();

        for (i, offset) in strike_offsets(config.sim_markets_per_symbol, spread)
            .into_iter()
            .enumerate()
        {
            let strike = round2(spot * (1.0 + offset));
            let question = format!("Will {ticker} be above ${} in 15 min?", format_usd(strike));

            info!(symbol = %symbol, strike, question = %question, "Sim market created");

            markets.push(SimMarket {
                market_id: format!("sim-{symbol}-{i}"),
                symbol: symbol.clone(),
                question,
                strike,
            });
        }
    }

    markets
}

fn strike_offsets(n: u32, spread: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        2 => vec![-spread, spread],
        n => {
            let mut offsets = vec![-spread, 0.0, spread];
            for j in 3..n {
                offsets.push(spread * (j - 1) as f64);
            }
            offsets
        }
    }
}

// ─── Odds math ────────────────────────────────────────────────────────────────

/// Price a strike market from a (lagged) spot price.
///
/// Spot distance above the strike maps 1% to 10 points of probability,
/// centered at 0.5, then noise is added and the result clamped into
/// [0.05, 0.95] and rounded to four decimals.
pub fn lagged_odds(lagged_price: f64, strike: f64, noise: f64) -> f64 {
    let distance = (lagged_price - strike) / strike;
    let raw = 0.5 + distance * 10.0;
    round4((raw + noise).clamp(0.05, 0.95))
}

#[inline]
fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `87000.0` -> `"87,000.00"`, the venue-style strike format.
fn format_usd(value: f64) -> String {
    let raw = format!("{value:.2}");
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}.{frac_part}")
}

// ─── Run loop ─────────────────────────────────────────────────────────────────

/// Poll the spot board on the sim interval, keep a lag buffer per symbol, and
/// quote every market off the oldest buffered price. Full channel drops the
/// quote; closed channel stops the feed.
pub async fn run(
    config: Arc<Config>,
    board: SpotBoard,
    markets: Vec<SimMarket>,
    odds_tx: mpsc::Sender<OddsQuote>,
) {
    let mut rng = StdRng::from_entropy();
    let noise = config.sim_noise_pct / 100.0;
    let interval_secs = config.sim_interval.as_secs_f64();
    let lag_ticks = ((config.sim_price_lag_secs as f64 / interval_secs) as usize).max(1);

    // buf[0] is the spot level `lag_ticks` polls ago.
    let mut buffers: HashMap<String, VecDeque<f64>> = HashMap::new();
    for market in &markets {
        buffers
            .entry(market.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(lag_ticks + 1));
    }

    let mut ticker = tokio::time::interval(config.sim_interval);
    info!(
        markets = markets.len(),
        lag_ticks,
        "[ODDS FEED] simulated feed started"
    );

    loop {
        ticker.tick().await;

        for (symbol, buf) in buffers.iter_mut() {
            let price = match board.latest(symbol).await {
                Some(p) => p,
                None => default_price(symbol),
            };
            if buf.len() > lag_ticks {
                buf.pop_front();
            }
            buf.push_back(price);
        }

        for market in &markets {
            let Some(lagged) = buffers.get(&market.symbol).and_then(|b| b.front().copied())
            else {
                continue;
            };

            let quote = OddsQuote {
                symbol:    market.symbol.clone(),
                market_id: market.market_id.clone(),
                question:  market.question.clone(),
                midpoint:  lagged_odds(lagged, market.strike, rng.gen_range(-noise..=noise)),
                ts:        Utc::now(),
            };

            match odds_tx.try_send(quote) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(symbol = %market.symbol, "Odds channel full — quote dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    info!("[ODDS FEED] channel closed — stopping");
                    return;
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use std::time::Duration;

    #[test]
    fn odds_center_at_half_when_spot_sits_on_the_strike() {
        assert_eq!(lagged_odds(87_000.0, 87_000.0, 0.0), 0.5);
    }

    #[test]
    fn odds_scale_ten_points_per_percent_of_distance() {
        assert_eq!(lagged_odds(101.0, 100.0, 0.0), 0.6);
        assert_eq!(lagged_odds(99.0, 100.0, 0.0), 0.4);
    }

    #[test]
    fn odds_clamp_to_the_quotable_band() {
        assert_eq!(lagged_odds(110.0, 100.0, 0.0), 0.95);
        assert_eq!(lagged_odds(90.0, 100.0, 0.0), 0.05);
    }

    #[test]
    fn noise_shifts_then_rounds_the_quote() {
        assert_eq!(lagged_odds(100.0, 100.0, 0.03), 0.53);
        assert_eq!(lagged_odds(100.0, 100.0, 0.123456), 0.6235);
    }

    #[test]
    fn offsets_bracket_the_spot_level() {
        assert_eq!(strike_offsets(1, 0.5), vec![0.0]);
        assert_eq!(strike_offsets(2, 0.5), vec![-0.5, 0.5]);
        assert_eq!(strike_offsets(3, 0.5), vec![-0.5, 0.0, 0.5]);
        assert_eq!(strike_offsets(5, 0.5), vec![-0.5, 0.0, 0.5, 1.0, 1.5]);
        assert!(strike_offsets(0, 0.5).is_empty());
    }

    #[test]
    fn strikes_format_with_thousands_grouping() {
        assert_eq!(format_usd(87_000.0), "87,000.00");
        assert_eq!(format_usd(140.0), "140.00");
        assert_eq!(format_usd(2_400.5), "2,400.50");
        assert_eq!(format_usd(1_234_567.891), "1,234,567.89");
    }

    #[tokio::test]
    async fn markets_bracket_default_spot_before_the_walk_starts() {
        let mut config = test_config();
        config.symbols = vec!["btcusdt".to_string()];

        let markets = generate_markets(&config, &SpotBoard::new()).await;

        assert_eq!(markets.len(), 3);
        assert_eq!(markets[0].market_id, "sim-btcusdt-0");
        assert_eq!(markets[0].strike, 86_565.0);
        assert_eq!(markets[1].strike, 87_000.0);
        assert_eq!(markets[2].strike, 87_435.0);
        assert_eq!(
            markets[1].question,
            "Will BTC be above $87,000.00 in 15 min?"
        );
    }

    #[tokio::test]
    async fn run_quotes_every_market_each_poll() {
        let mut config = test_config();
        config.symbols = vec!["btcusdt".to_string()];
        config.sim_interval = Duration::from_millis(5);
        config.sim_noise_pct = 0.0;
        let config = Arc::new(config);

        let board = SpotBoard::new();
        board.record("btcusdt", 87_000.0).await;
        let markets = generate_markets(&config, &board).await;

        let (odds_tx, mut odds_rx) = mpsc::channel(64);
        tokio::spawn(run(config, board, markets, odds_tx));

        let mut seen = Vec::new();
        for _ in 0..3 {
            let quote = tokio::time::timeout(Duration::from_secs(5), odds_rx.recv())
                .await
                .expect("odds feed produced nothing")
                .expect("channel closed early");
            seen.push(quote);
        }

        assert_eq!(seen[0].market_id, "sim-btcusdt-0");
        assert_eq!(seen[1].market_id, "sim-btcusdt-1");
        assert_eq!(seen[2].market_id, "sim-btcusdt-2");
        // Spot sits exactly on the middle strike.
        assert_eq!(seen[1].midpoint, 0.5);
        assert!(seen[0].midpoint > seen[1].midpoint);
        assert!(seen[2].midpoint < seen[1].midpoint);
    }
}
