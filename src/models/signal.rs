//! # models::signal
//!
//! Defines [`DivergenceSignal`] — the detector's claim that price momentum
//! and quoted odds disagree hard enough to be worth the council's time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Direction ────────────────────────────────────────────────────────────────

/// Which way the price momentum points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Wire/DB representation (`"UP"` / `"DOWN"`).
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up   => "UP",
            Direction::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── DivergenceSignal ─────────────────────────────────────────────────────────

/// A scored divergence between momentum-implied odds and quoted odds.
///
/// Carries a snapshot of the exact observation that crossed the thresholds;
/// downstream stages never re-read feed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceSignal {
    pub symbol: String,
    pub price: f64,
    pub momentum_pct: f64,
    pub odds_midpoint: f64,
    /// Momentum-implied fair odds, clamped into [0.01, 0.99].
    pub implied_fair_odds: f64,
    /// `(implied_fair_odds - odds_midpoint) * 100` — percentage points.
    pub edge_pct: f64,
    /// Weighted composite of the edge/momentum/volume components, in [0, 1].
    pub signal_score: f64,
    pub direction: Direction,
    pub ts: DateTime<Utc>,
}
