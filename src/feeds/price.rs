//! # feeds::price
//!
//! Simulated exchange feed: one random-walk price per symbol, stepped on the
//! shared sim interval. Every tick carries momentum computed over the
//! producer's own rolling window, so no consumer ever needs feed history.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::config::Config;
use crate::feeds::{default_price, SpotBoard};
use crate::models::PriceTick;

// ─── Tunables ─────────────────────────────────────────────────────────────────

/// Samples held for momentum calculation.
const MOMENTUM_WINDOW: usize = 20;

/// Upward drift per tick, percent.
const SIM_DRIFT_PCT: f64 = 0.03;

/// Half-width of the uniform walk step, percent. A ±0.52% uniform step has
/// the same spread as the 0.3%-stddev gaussian the walk is tuned to imitate,
/// giving 1-2% momentum swings over a full window.
const SIM_STEP_PCT: f64 = 0.52;

/// Flat 24h volume reported by the simulated exchange.
const SIM_VOLUME_24H: f64 = 1_000_000.0;

// ─── Momentum window ──────────────────────────────────────────────────────────

/// Rolling window of the last [`MOMENTUM_WINDOW`] prices.
pub struct MomentumWindow {
    prices: VecDeque<f64>,
}

impl MomentumWindow {
    pub fn new() -> Self {
        Self {
            prices: VecDeque::with_capacity(MOMENTUM_WINDOW),
        }
    }

    /// Record a price, evicting the oldest once the window is full.
    pub fn push(&mut self, price: f64) {
        if self.prices.len() == MOMENTUM_WINDOW {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    /// Percent change from the oldest to the newest price in the window.
    /// 0.0 until the window holds at least two samples.
    pub fn momentum_pct(&self) -> f64 {
        if self.prices.len() < 2 {
            return 0.0;
        }
        let (Some(&oldest), Some(&newest)) = (self.prices.front(), self.prices.back()) else {
            return 0.0;
        };
        if oldest == 0.0 {
            return 0.0;
        }
        (newest - oldest) / oldest * 100.0
    }
}

impl Default for MomentumWindow {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Walk state ───────────────────────────────────────────────────────────────

struct SymbolWalk {
    symbol: String,
    price: f64,
    window: MomentumWindow,
}

// ─── Run loop ─────────────────────────────────────────────────────────────────

/// Step every symbol's walk once per interval, publish the new level to the
/// spot board, and emit a tick. Full channel drops the tick; closed channel
/// stops the feed.
pub async fn run(config: Arc<Config>, board: SpotBoard, price_tx: mpsc::Sender<PriceTick>) {
    let mut rng = StdRng::from_entropy();
    let mut walks: Vec<SymbolWalk> = config
        .symbols
        .iter()
        .map(|s| SymbolWalk {
            symbol: s.clone(),
            price:  default_price(s),
            window: MomentumWindow::new(),
        })
        .collect();

    let mut ticker = tokio::time::interval(config.sim_interval);
    info!(symbols = ?config.symbols, "[PRICE FEED] simulated walk started");

    loop {
        ticker.tick().await;

        for walk in &mut walks {
            let change_pct = SIM_DRIFT_PCT + rng.gen_range(-SIM_STEP_PCT..=SIM_STEP_PCT);
            walk.price *= 1.0 + change_pct / 100.0;

            board.record(&walk.symbol, walk.price).await;
            walk.window.push(walk.price);

            let tick = PriceTick {
                symbol:       walk.symbol.clone(),
                price:        walk.price,
                volume_24h:   SIM_VOLUME_24H,
                momentum_pct: walk.window.momentum_pct(),
                ts:           Utc::now(),
            };

            match price_tx.try_send(tick) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(symbol = %walk.symbol, "Price channel full — tick dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    info!("[PRICE FEED] channel closed — stopping");
                    return;
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
