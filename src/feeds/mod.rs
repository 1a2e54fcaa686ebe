//! Producer tasks for the two market-data streams, plus the shared spot-price
//! board the simulated odds feed lags behind.
//!
//! Both producers push into bounded channels with `try_send`: when the
//! pipeline backs up, feed data is dropped at the edge rather than stalling
//! ingestion.

pub mod odds;
pub mod price;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

// ─── SpotBoard ────────────────────────────────────────────────────────────────

/// Latest spot price per symbol, shared between the price producer (writer)
/// and the odds producer (reader).
#[derive(Clone, Default)]
pub struct SpotBoard {
    prices: Arc<RwLock<HashMap<String, f64>>>,
}

impl SpotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, symbol: &str, price: f64) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    pub async fn latest(&self, symbol: &str) -> Option<f64> {
        self.prices.read().await.get(symbol).copied()
    }
}

/// Spot levels assumed before the walk takes its first step.
pub(crate) fn default_price(symbol: &str) -> f64 {
    match symbol {
        "btcusdt" => 87_000.0,
        "ethusdt" => 2_400.0,
        "solusdt" => 140.0,
        _ => 1_000.0,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn board_tracks_latest_price() {
        let board = SpotBoard::new();
        assert_eq!(board.latest("btcusdt").await, None);

        board.record("btcusdt", 87_000.0).await;
        board.record("btcusdt", 87_123.5).await;

        assert_eq!(board.latest("btcusdt").await, Some(87_123.5));
        assert_eq!(board.latest("ethusdt").await, None);
    }

    #[test]
    fn unknown_symbols_fall_back_to_a_flat_level() {
        assert_eq!(default_price("btcusdt"), 87_000.0);
        assert_eq!(default_price("dogeusdt"), 1_000.0);
    }
}
