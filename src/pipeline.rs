//! # pipeline
//!
//! The slow end of the stream: one divergence signal in, one finalized and
//! persisted outcome out. A fault while handling one signal is logged and
//! swallowed — it never halts ingestion of the next.
//!
//! Per-signal order of operations:
//! 1. cooldown peek (free) — symbols still cooling down never reach the LLMs
//! 2. council evaluation (expensive, seconds of latency)
//! 3. risk gate approval, which atomically reserves capacity
//! 4. paper execution + persistence
//!
//! Signals the council or the gate turn down are recorded with a SKIP action;
//! cooldown-peeked signals are not recorded at all.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::council::Council;
use crate::engine::executor::PaperExecutor;
use crate::llm::LlmBackend;
use crate::models::{DivergenceSignal, TradeAction};
use crate::risk::{RiskDecision, RiskGate};
use crate::storage;

// ─── Council loop ─────────────────────────────────────────────────────────────

/// Drain the signal channel until it closes, finalizing every signal.
pub async fn run<B: LlmBackend>(
    council: Council<B>,
    gate: RiskGate,
    executor: PaperExecutor,
    pool: SqlitePool,
    mut signal_rx: mpsc::Receiver<DivergenceSignal>,
) {
    info!("[PIPELINE] council loop started");

    while let Some(signal) = signal_rx.recv().await {
        handle_signal(&council, &gate, &executor, &pool, signal).await;
    }

    info!("[PIPELINE] signal stream closed — stopping");
}

async fn handle_signal<B: LlmBackend>(
    council: &Council<B>,
    gate: &RiskGate,
    executor: &PaperExecutor,
    pool: &SqlitePool,
    signal: DivergenceSignal,
) {
    // ── 1. Cooldown peek ──────────────────────────────────────────────────────
    if gate.in_cooldown(&signal.symbol).await {
        debug!(symbol = %signal.symbol, "💤 [PIPELINE] cooldown active — signal skipped");
        return;
    }

    // ── 2. Council ────────────────────────────────────────────────────────────
    let available = gate.available_capital().await;
    let decision = council.evaluate(signal, available).await;

    if !decision.wants_trade() {
        info!(
            symbol = %decision.signal.symbol,
            stage  = ?decision.stage,
            reason = %decision.verdict.reasoning,
            "[PIPELINE] council passed on the signal"
        );
        persist_skip(pool, &decision.signal).await;
        return;
    }

    // ── 3. Risk gate ──────────────────────────────────────────────────────────
    let size_usd = match gate.approve(&decision).await {
        RiskDecision::Approved { size_usd } => size_usd,
        RiskDecision::Rejected(reason) => {
            warn!(
                symbol = %decision.signal.symbol,
                code   = reason.code(),
                reason = %reason,
                "⛔ [RISK] trade rejected"
            );
            persist_skip(pool, &decision.signal).await;
            return;
        }
    };

    // ── 4. Execution ──────────────────────────────────────────────────────────
    match executor.execute(&decision, size_usd).await {
        Ok(position) => info!(
            order_id = %position.order_id,
            symbol   = %position.symbol,
            size_usd = position.size_usd,
            "[PIPELINE] trade opened"
        ),
        // The capacity reserved at approval stays reserved: the ledger and
        // the database now disagree, which needs an operator to reconcile.
        Err(e) => error!(
            symbol = %decision.signal.symbol,
            error  = %e,
            "❌ [PIPELINE] execution failed after approval — reservation left in place"
        ),
    }
}

async fn persist_skip(pool: &SqlitePool, signal: &DivergenceSignal) {
    if let Err(e) = storage::log_signal(pool, signal, TradeAction::Skip).await {
        error!(error = %e, "[PIPELINE] failed to record skipped signal");
    }
}

// ─── Status loop ──────────────────────────────────────────────────────────────

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Heartbeat: periodically log the aggregate P&L and the live risk snapshot.
pub async fn status_loop(pool: SqlitePool, gate: RiskGate) {
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    // interval fires immediately; the first beat would log an empty book.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let snap = gate.snapshot().await;
        match storage::pnl_summary(&pool).await {
            Ok(pnl) => info!(
                open_positions = snap.open_positions,
                exposure_usd   = snap.exposure_usd,
                available_usd  = snap.available_usd,
                total_trades   = pnl.total_trades,
                wins           = pnl.wins,
                losses         = pnl.losses,
                win_rate       = pnl.win_rate,
                total_pnl      = pnl.total_pnl,
                "📊 [STATUS]"
            ),
            Err(e) => warn!(error = %e, "[STATUS] P&L summary unavailable"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
