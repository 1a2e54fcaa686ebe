//! # models::council
//!
//! Output records of the three council stages and the combined
//! [`CouncilDecision`] handed to the Risk Gate.
//!
//! A `CouncilDecision` value is only ever constructed at finalization — a
//! partially evaluated signal cannot escape the council, so an unfinalized
//! verdict can never reach the Risk Gate.

use serde::{Deserialize, Serialize};

use crate::models::signal::DivergenceSignal;

// ─── Sentiment stage ──────────────────────────────────────────────────────────

/// Label produced by the sentiment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "BULLISH",
            Sentiment::Bearish => "BEARISH",
            Sentiment::Neutral => "NEUTRAL",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment stage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub reasoning: String,
    /// Model identifier that produced this result.
    pub model: String,
    pub latency_ms: f64,
    /// True when no parseable label came back and the NEUTRAL default was
    /// substituted.
    pub degraded: bool,
}

// ─── Confidence stage ─────────────────────────────────────────────────────────

/// Confidence stage output.  `confidence` is clamped into [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceGrade {
    pub confidence: f64,
    pub reasoning: String,
    pub model: String,
    pub latency_ms: f64,
    /// True when no parseable value came back and 0.0 was substituted.
    pub degraded: bool,
}

impl ConfidenceGrade {
    /// Synthetic grade for a stage that never ran because an upstream stage
    /// failed.
    pub fn skipped(reason: &str) -> Self {
        Self {
            confidence: 0.0,
            reasoning:  format!("Skipped: {reason}"),
            model:      "skipped".to_string(),
            latency_ms: 0.0,
            degraded:   false,
        }
    }
}

// ─── Judge stage ──────────────────────────────────────────────────────────────

/// The judge's final call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Trade,
    Skip,
}

impl TradeAction {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Trade => "TRADE",
            TradeAction::Skip  => "SKIP",
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judge stage output: trade or skip, and the proposed dollar size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeVerdict {
    pub action: TradeAction,
    pub size_usd: f64,
    pub reasoning: String,
    pub model: String,
    pub latency_ms: f64,
    pub degraded: bool,
}

impl TradeVerdict {
    /// Synthetic SKIP verdict issued when the grader's confidence fell below
    /// the configured floor and the judge was never invoked.
    pub fn short_circuit(confidence: f64, min_confidence: f64) -> Self {
        Self {
            action:     TradeAction::Skip,
            size_usd:   0.0,
            reasoning:  format!("Short-circuit: confidence {confidence:.2} < {min_confidence:.2}"),
            model:      "short-circuit".to_string(),
            latency_ms: 0.0,
            degraded:   false,
        }
    }

    /// Synthetic SKIP verdict for a judge that never ran because an upstream
    /// stage failed.
    pub fn skipped(reason: &str) -> Self {
        Self {
            action:     TradeAction::Skip,
            size_usd:   0.0,
            reasoning:  format!("Skipped: {reason}"),
            model:      "skipped".to_string(),
            latency_ms: 0.0,
            degraded:   false,
        }
    }
}

// ─── Council state machine ────────────────────────────────────────────────────

/// Where the council's per-signal state machine stood when the decision
/// finalized.
///
/// `JudgeDone` and `ShortCircuited` are the normal terminals.  Anything
/// earlier means the following stage failed to produce a parseable value and
/// every stage downstream of it was skipped with its safe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilStage {
    Init,
    SentimentDone,
    ConfidenceDone,
    JudgeDone,
    ShortCircuited,
}

// ─── CouncilDecision ──────────────────────────────────────────────────────────

/// The finalized three-stage decision for one signal.
///
/// All three stage slots are always populated — failed or skipped stages hold
/// their synthetic defaults, so persistence and logging never deal with
/// missing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilDecision {
    pub signal: DivergenceSignal,
    pub sentiment: SentimentResult,
    pub confidence: ConfidenceGrade,
    pub verdict: TradeVerdict,
    pub stage: CouncilStage,
    pub total_latency_ms: f64,
}

impl CouncilDecision {
    /// True when the judge (or a fallback) settled on TRADE.
    #[inline]
    pub fn wants_trade(&self) -> bool {
        self.verdict.action == TradeAction::Trade
    }
}
