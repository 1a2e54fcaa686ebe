//! # risk — Risk Gate
//!
//! ด่านสุดท้ายก่อน Executor — กันสัญญาณสองตัวแย่ง risk budget ก้อนเดียวกัน
//!
//! ## ลำดับการเช็ค (ทั้งหมดใน critical section เดียว)
//! 1. **Cooldown**       — ห้ามเทรด symbol เดิมซ้ำภายใน `COOLDOWN_SECONDS`
//! 2. **Position Count** — จำนวน Position เปิดต้องไม่เกิน `MAX_OPEN_POSITIONS`
//! 3. **Size Clamp**     — ตัด size ลงเหลือ `MAX_POSITION_SIZE`
//! 4. **Exposure**       — exposure รวม + size ต้องไม่เกิน `MAX_CAPITAL`
//!
//! ผ่านครบแล้วจองทันที (cooldown + exposure + count) ก่อนปล่อยมือให้ Executor.
//! Rejection ไม่ใช่ error — เป็นผลลัพธ์ปกติพร้อม reason code.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::models::council::CouncilDecision;
use crate::models::position::TradeRecord;

// ─── Limits ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_capital: f64,
    pub max_position_size: f64,
    pub max_open_positions: u32,
    pub cooldown: Duration,
}

impl RiskLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_capital:        config.max_capital,
            max_position_size:  config.max_position_size,
            max_open_positions: config.max_open_positions,
            cooldown:           Duration::from_secs(config.cooldown_secs),
        }
    }
}

// ─── Ledger (internal state) ──────────────────────────────────────────────────

/// Exposure and cooldown state.  Owned by the gate; every mutation happens
/// inside [`RiskGate::approve`]'s single write lock.
#[derive(Debug, Default)]
struct Ledger {
    open_count: u32,
    exposure_usd: f64,
    cooldown_until: HashMap<String, Instant>,
}

/// Read-only view for the status loop.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub open_positions: u32,
    pub exposure_usd: f64,
    pub available_usd: f64,
}

// ─── Decision ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum RiskDecision {
    /// `size_usd` is the approved (possibly clamped) size.
    Approved { size_usd: f64 },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Cooldown { remaining_secs: u64 },
    PositionLimit { open: u32, max: u32 },
    CapitalLimit { exposure_usd: f64, requested_usd: f64, max_capital: f64 },
}

impl RejectReason {
    /// Stable code for persistence and log filtering.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Cooldown { .. }      => "COOLDOWN",
            RejectReason::PositionLimit { .. } => "POSITION_LIMIT",
            RejectReason::CapitalLimit { .. }  => "CAPITAL_LIMIT",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Cooldown { remaining_secs } => {
                write!(f, "cooldown: {remaining_secs}s remaining")
            }
            RejectReason::PositionLimit { open, max } => {
                write!(f, "position limit reached: {open}/{max}")
            }
            RejectReason::CapitalLimit { exposure_usd, requested_usd, max_capital } => {
                write!(
                    f,
                    "capital limit: exposure ${exposure_usd:.2} + ${requested_usd:.2} > ${max_capital:.2}"
                )
            }
        }
    }
}

// ─── Risk Gate ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RiskGate {
    ledger: Arc<RwLock<Ledger>>,
    limits: Arc<RiskLimits>,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::default())),
            limits: Arc::new(limits),
        }
    }

    // ─── Approve (เรียกก่อนยิง Order ทุกครั้ง) ──────────────────────────────

    /// Check all four limits against one consistent ledger snapshot and, on
    /// approval, reserve the capacity before the executor runs.  A rejected
    /// verdict leaves the ledger byte-for-byte untouched.
    pub async fn approve(&self, decision: &CouncilDecision) -> RiskDecision {
        let symbol = &decision.signal.symbol;
        let requested = decision.verdict.size_usd;

        let mut ledger = self.ledger.write().await;
        let now = Instant::now();

        // [1] Per-symbol cooldown
        if let Some(until) = ledger.cooldown_until.get(symbol) {
            if now < *until {
                let remaining_secs = until.duration_since(now).as_secs();
                return RiskDecision::Rejected(RejectReason::Cooldown { remaining_secs });
            }
        }

        // [2] Open position count
        if ledger.open_count >= self.limits.max_open_positions {
            return RiskDecision::Rejected(RejectReason::PositionLimit {
                open: ledger.open_count,
                max:  self.limits.max_open_positions,
            });
        }

        // [3] Size clamp
        let size_usd = requested.min(self.limits.max_position_size);

        // [4] Portfolio exposure
        if ledger.exposure_usd + size_usd > self.limits.max_capital {
            return RiskDecision::Rejected(RejectReason::CapitalLimit {
                exposure_usd:  ledger.exposure_usd,
                requested_usd: size_usd,
                max_capital:   self.limits.max_capital,
            });
        }

        // จองทันที — cooldown ต้องเดินหน้าอย่างเดียว ห้ามถอยหลัง
        ledger.open_count += 1;
        ledger.exposure_usd += size_usd;
        let until = now + self.limits.cooldown;
        ledger
            .cooldown_until
            .entry(symbol.clone())
            .and_modify(|t| *t = (*t).max(until))
            .or_insert(until);

        info!(
            symbol       = %symbol,
            size_usd,
            open         = ledger.open_count,
            exposure_usd = ledger.exposure_usd,
            "✅ [RISK] approved"
        );

        RiskDecision::Approved { size_usd }
    }

    // ─── Startup seeding ──────────────────────────────────────────────────────

    /// Restore ledger counters from trades a previous run left open, so a
    /// restart cannot double-spend capital that is still deployed.  Cooldowns
    /// are not restored; they are short-lived by construction.
    pub async fn seed(&self, open_trades: &[TradeRecord]) {
        if open_trades.is_empty() {
            return;
        }
        let mut ledger = self.ledger.write().await;
        ledger.open_count = open_trades.len() as u32;
        ledger.exposure_usd = open_trades.iter().map(|t| t.size_usd).sum();
        info!(
            open         = ledger.open_count,
            exposure_usd = ledger.exposure_usd,
            "[RISK] ledger seeded from previous session"
        );
    }

    // ─── Read-only views ──────────────────────────────────────────────────────

    /// Cheap pre-council peek so a cooldown-bound signal skips the LLM spend.
    pub async fn in_cooldown(&self, symbol: &str) -> bool {
        let ledger = self.ledger.read().await;
        ledger
            .cooldown_until
            .get(symbol)
            .map(|until| Instant::now() < *until)
            .unwrap_or(false)
    }

    pub async fn available_capital(&self) -> f64 {
        let ledger = self.ledger.read().await;
        (self.limits.max_capital - ledger.exposure_usd).max(0.0)
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let ledger = self.ledger.read().await;
        LedgerSnapshot {
            open_positions: ledger.open_count,
            exposure_usd:   ledger.exposure_usd,
            available_usd:  (self.limits.max_capital - ledger.exposure_usd).max(0.0),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
