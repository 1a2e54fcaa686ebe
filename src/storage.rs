//! # storage — SQLite persistence layer
//!
//! ใช้ `sqlx` (runtime queries) — เก็บสองตารางแบบ append-only:
//! `signals` ทุกสัญญาณพร้อมผลตัดสิน และ `trades` ประวัติ order ที่ fill แล้ว
//!
//! Read-backs: `open_trades` สำหรับ seed ledger ตอน startup,
//! `pnl_summary` สำหรับ status loop.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::error::AgentError;
use crate::models::council::TradeAction;
use crate::models::position::{OrderSide, TradeRecord};
use crate::models::signal::DivergenceSignal;

// ─── Schema ───────────────────────────────────────────────────────────────────

const CREATE_TRADES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id TEXT NOT NULL UNIQUE,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    size_usd REAL NOT NULL,
    entry_price REAL NOT NULL,
    exit_price REAL,
    pnl REAL,
    is_paper INTEGER NOT NULL DEFAULT 1,
    signal_score REAL DEFAULT 0,
    sentiment TEXT DEFAULT '',
    confidence REAL DEFAULT 0,
    verdict TEXT DEFAULT '',
    council_reasoning TEXT DEFAULT '',
    opened_at TEXT NOT NULL,
    closed_at TEXT
)";

const CREATE_SIGNALS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    price REAL NOT NULL,
    momentum_pct REAL NOT NULL,
    odds_midpoint REAL NOT NULL,
    implied_fair_odds REAL NOT NULL,
    edge_pct REAL NOT NULL,
    signal_score REAL NOT NULL,
    direction TEXT NOT NULL,
    council_action TEXT DEFAULT 'SKIP',
    timestamp TEXT NOT NULL
)";

// ─── Init ─────────────────────────────────────────────────────────────────────

/// เปิดไฟล์ DB (สร้างถ้ายังไม่มี) แล้วเตรียมตาราง
pub async fn init(db_path: &str) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = Path::new(db_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to open SQLite database")?;

    create_tables(&pool).await?;

    info!(path = %db_path, "✅ SQLite ready");
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(CREATE_TRADES_TABLE)
        .execute(pool)
        .await
        .context("creating trades table")?;
    sqlx::query(CREATE_SIGNALS_TABLE)
        .execute(pool)
        .await
        .context("creating signals table")?;
    Ok(())
}

// ─── Writes ───────────────────────────────────────────────────────────────────

/// Append one signal row with the action the pipeline settled on.
pub async fn log_signal(
    pool: &SqlitePool,
    signal: &DivergenceSignal,
    council_action: TradeAction,
) -> Result<(), AgentError> {
    sqlx::query(
        "INSERT INTO signals
           (symbol, price, momentum_pct, odds_midpoint, implied_fair_odds,
            edge_pct, signal_score, direction, council_action, timestamp)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&signal.symbol)
    .bind(signal.price)
    .bind(signal.momentum_pct)
    .bind(signal.odds_midpoint)
    .bind(signal.implied_fair_odds)
    .bind(signal.edge_pct)
    .bind(signal.signal_score)
    .bind(signal.direction.as_str())
    .bind(council_action.as_str())
    .bind(signal.ts)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append one trade row and return its rowid.
pub async fn log_trade(pool: &SqlitePool, record: &TradeRecord) -> Result<i64, AgentError> {
    let result = sqlx::query(
        "INSERT INTO trades
           (order_id, symbol, side, size_usd, entry_price, exit_price, pnl,
            is_paper, signal_score, sentiment, confidence, verdict,
            council_reasoning, opened_at, closed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.order_id)
    .bind(&record.symbol)
    .bind(record.side.as_str())
    .bind(record.size_usd)
    .bind(record.entry_price)
    .bind(record.exit_price)
    .bind(record.pnl)
    .bind(record.is_paper)
    .bind(record.signal_score)
    .bind(&record.sentiment)
    .bind(record.confidence)
    .bind(&record.verdict)
    .bind(&record.council_reasoning)
    .bind(record.opened_at)
    .bind(record.closed_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

// ─── Read-backs ───────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    order_id:          String,
    symbol:            String,
    side:              String,
    size_usd:          f64,
    entry_price:       f64,
    exit_price:        Option<f64>,
    pnl:               Option<f64>,
    is_paper:          bool,
    signal_score:      f64,
    sentiment:         String,
    confidence:        f64,
    verdict:           String,
    council_reasoning: String,
    opened_at:         DateTime<Utc>,
    closed_at:         Option<DateTime<Utc>>,
}

impl From<TradeRow> for TradeRecord {
    fn from(row: TradeRow) -> Self {
        // Rows are only ever written by this crate via as_str().
        let side = if row.side == "SELL" { OrderSide::Sell } else { OrderSide::Buy };
        TradeRecord {
            order_id:          row.order_id,
            symbol:            row.symbol,
            side,
            size_usd:          row.size_usd,
            entry_price:       row.entry_price,
            exit_price:        row.exit_price,
            pnl:               row.pnl,
            is_paper:          row.is_paper,
            signal_score:      row.signal_score,
            sentiment:         row.sentiment,
            confidence:        row.confidence,
            verdict:           row.verdict,
            council_reasoning: row.council_reasoning,
            opened_at:         row.opened_at,
            closed_at:         row.closed_at,
        }
    }
}

/// Trades with no close timestamp, newest first.
pub async fn open_trades(pool: &SqlitePool) -> Result<Vec<TradeRecord>, AgentError> {
    let rows = sqlx::query_as::<_, TradeRow>(
        "SELECT order_id, symbol, side, size_usd, entry_price, exit_price, pnl,
                is_paper, signal_score, sentiment, confidence, verdict,
                council_reasoning, opened_at, closed_at
         FROM trades
         WHERE closed_at IS NULL
         ORDER BY opened_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TradeRecord::from).collect())
}

/// Aggregate P&L view for the status loop.
#[derive(Debug, Clone, Serialize)]
pub struct PnlSummary {
    pub total_trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub open: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub total_volume: f64,
    pub win_rate: f64,
}

pub async fn pnl_summary(pool: &SqlitePool) -> Result<PnlSummary, AgentError> {
    let row = sqlx::query(
        "SELECT
           COUNT(*) as total_trades,
           COALESCE(SUM(CASE WHEN pnl > 0 THEN 1 ELSE 0 END), 0) as wins,
           COALESCE(SUM(CASE WHEN pnl < 0 THEN 1 ELSE 0 END), 0) as losses,
           COALESCE(SUM(CASE WHEN pnl IS NULL THEN 1 ELSE 0 END), 0) as open,
           COALESCE(SUM(pnl), 0.0) as total_pnl,
           COALESCE(AVG(pnl), 0.0) as avg_pnl,
           COALESCE(SUM(size_usd), 0.0) as total_volume
         FROM trades",
    )
    .fetch_one(pool)
    .await?;

    let wins: i64 = row.get("wins");
    let losses: i64 = row.get("losses");
    let decided = wins + losses;
    let win_rate = if decided > 0 {
        wins as f64 / decided as f64 * 100.0
    } else {
        0.0
    };

    Ok(PnlSummary {
        total_trades: row.get("total_trades"),
        wins,
        losses,
        open: row.get("open"),
        total_pnl: row.get("total_pnl"),
        avg_pnl: row.get("avg_pnl"),
        total_volume: row.get("total_volume"),
        win_rate,
    })
}

// ─── Test support ─────────────────────────────────────────────────────────────

/// In-memory pool for tests across the crate.
///
/// One connection only: each `:memory:` connection is its own database, so a
/// wider pool would hand tests an empty schema half the time.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_tables(&pool).await.unwrap();
    pool
}

// ─── Tests ────────────────────────────────────────────────────────────────────
