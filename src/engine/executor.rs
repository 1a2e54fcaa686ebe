//! # engine::executor
//!
//! Paper-trade executor — fills an approved trade instantly at the quoted
//! odds midpoint and persists the outcome. Kept apart from the council so the
//! decision path can be exercised in tests without a database.
//!
//! A real venue adapter would slot in here behind the same `execute` shape;
//! everything upstream already treats the fill as asynchronous and fallible.

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::AgentError;
use crate::models::{CouncilDecision, Direction, OrderSide, Position, TradeAction, TradeRecord};
use crate::storage;

// ─── Executor ─────────────────────────────────────────────────────────────────

pub struct PaperExecutor {
    pool: SqlitePool,
}

impl PaperExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fill the approved trade on paper.
    ///
    /// `size_usd` is the risk-gate-approved size, which may be smaller than
    /// what the council asked for. The fill price is the odds midpoint the
    /// signal was built from — paper fills never slip.
    pub async fn execute(
        &self,
        decision: &CouncilDecision,
        size_usd: f64,
    ) -> Result<Position, AgentError> {
        let signal = &decision.signal;

        let side = match signal.direction {
            Direction::Up   => OrderSide::Buy,
            Direction::Down => OrderSide::Sell,
        };
        let order_id = paper_order_id();
        let entry_price = signal.odds_midpoint;

        let record = TradeRecord::paper_open(decision, &order_id, side, size_usd, entry_price);
        storage::log_trade(&self.pool, &record).await?;
        storage::log_signal(&self.pool, signal, TradeAction::Trade).await?;

        info!(
            order_id = %order_id,
            symbol   = %record.symbol,
            side     = %side,
            size_usd,
            entry_price,
            "✅ [EXECUTOR] paper fill"
        );

        Ok(Position::open(
            order_id,
            record.symbol,
            side,
            size_usd,
            entry_price,
        ))
    }
}

/// `paper-` plus the first 12 hex chars of a v4 UUID.
fn paper_order_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("paper-{}", &id[..12])
}

// ─── Tests ────────────────────────────────────────────────────────────────────
