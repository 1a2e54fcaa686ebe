//! # models::position
//!
//! Structs for the position ledger and the persisted trade history.
//!
//! `Position` is the in-memory ledger entry the Risk Gate owns; `TradeRecord`
//! is the append-only row written to the persistence sink.  They are kept
//! separate because the ledger is rebuilt from scratch on every restart while
//! trade rows are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::council::CouncilDecision;

// ─── OrderSide ────────────────────────────────────────────────────────────────

/// Side of a filled order.  UP signals buy, DOWN signals sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy  => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Position ─────────────────────────────────────────────────────────────────

/// An open position held in the Risk Gate's ledger.
///
/// Open-only in this version: closing, take-profit and stop-loss are not
/// modeled, so a position leaves the ledger only on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub size_usd: f64,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(order_id: String, symbol: String, side: OrderSide, size_usd: f64, entry_price: f64) -> Self {
        Self {
            order_id,
            symbol,
            side,
            size_usd,
            entry_price,
            opened_at: Utc::now(),
        }
    }
}

// ─── TradeRecord ──────────────────────────────────────────────────────────────

/// One row of the append-only trade history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub order_id:          String,
    pub symbol:            String,
    pub side:              OrderSide,
    pub size_usd:          f64,
    pub entry_price:       f64,
    pub exit_price:        Option<f64>,
    pub pnl:               Option<f64>,
    pub is_paper:          bool,
    pub signal_score:      f64,
    pub sentiment:         String,
    pub confidence:        f64,
    pub verdict:           String,
    pub council_reasoning: String,
    pub opened_at:         DateTime<Utc>,
    pub closed_at:         Option<DateTime<Utc>>,
}

impl TradeRecord {
    /// Build the history row for a freshly filled paper order.
    pub fn paper_open(
        decision:    &CouncilDecision,
        order_id:    &str,
        side:        OrderSide,
        size_usd:    f64,
        entry_price: f64,
    ) -> Self {
        Self {
            order_id:          order_id.to_string(),
            symbol:            decision.signal.symbol.clone(),
            side,
            size_usd,
            entry_price,
            exit_price:        None,
            pnl:               None,
            is_paper:          true,
            signal_score:      decision.signal.signal_score,
            sentiment:         decision.sentiment.sentiment.as_str().to_string(),
            confidence:        decision.confidence.confidence,
            verdict:           decision.verdict.action.as_str().to_string(),
            council_reasoning: decision.verdict.reasoning.chars().take(500).collect(),
            opened_at:         Utc::now(),
            closed_at:         None,
        }
    }
}
