//! # council — three-stage trade decision over a text-generation backend
//!
//! `Sentiment → Confidence → Judge`, strictly in order, one signal at a time.
//! The grader gates the judge: confidence below the configured floor
//! short-circuits to SKIP without paying for the most expensive call.
//!
//! Per-signal state machine:
//! `INIT → SENTIMENT_DONE → CONFIDENCE_DONE → {JUDGE_DONE | SHORT_CIRCUITED}`.
//! A stage that produces no parseable value (or whose call fails outright)
//! finalizes the decision on the spot: its safe default is substituted, every
//! downstream stage is recorded as skipped, and the decision carries the
//! stage the machine stood at.  Nothing here returns an error — a bad model
//! reply must never stall the signal queue.

pub mod parse;
pub mod prompts;

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::llm::{ChatRequest, LlmBackend};
use crate::models::council::{
    ConfidenceGrade, CouncilDecision, CouncilStage, Sentiment, SentimentResult, TradeAction,
    TradeVerdict,
};
use crate::models::signal::DivergenceSignal;

#[inline]
fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Runs the three council stages against an [`LlmBackend`].
pub struct Council<B> {
    backend: B,
    model_sentiment: String,
    model_grader: String,
    model_judge: String,
    min_confidence: f64,
    max_position_size: f64,
}

impl<B: LlmBackend> Council<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self {
            backend,
            model_sentiment:   config.model_sentiment.clone(),
            model_grader:      config.model_grader.clone(),
            model_judge:       config.model_judge.clone(),
            min_confidence:    config.min_confidence,
            max_position_size: config.max_position_size,
        }
    }

    /// Evaluate one signal to a finalized decision.
    ///
    /// `available_capital` is a snapshot taken by the caller; the judge sees
    /// it in its prompt but the Risk Gate re-checks against live state.
    pub async fn evaluate(
        &self,
        signal: DivergenceSignal,
        available_capital: f64,
    ) -> CouncilDecision {
        let started = Instant::now();

        // ── 1. Sentiment ──────────────────────────────────────────────────────
        info!(symbol = %signal.symbol, "🧠 [COUNCIL] running sentiment analyst");
        let sentiment = self.run_sentiment(&signal).await;
        info!(
            sentiment  = %sentiment.sentiment,
            latency_ms = sentiment.latency_ms as u64,
            "[COUNCIL] sentiment result"
        );

        if sentiment.degraded {
            warn!(symbol = %signal.symbol, "⚠️ [COUNCIL] sentiment stage failed, skipping downstream stages");
            return CouncilDecision {
                confidence: ConfidenceGrade::skipped("sentiment stage failed"),
                verdict: TradeVerdict::skipped("sentiment stage failed"),
                stage: CouncilStage::Init,
                total_latency_ms: elapsed_ms(started),
                signal,
                sentiment,
            };
        }

        // ── 2. Confidence ─────────────────────────────────────────────────────
        info!("[COUNCIL] running confidence grader");
        let confidence = self.run_confidence(&signal, &sentiment).await;
        info!(
            confidence = confidence.confidence,
            latency_ms = confidence.latency_ms as u64,
            "[COUNCIL] confidence result"
        );

        if confidence.degraded {
            warn!(symbol = %signal.symbol, "⚠️ [COUNCIL] confidence stage failed, skipping judge");
            return CouncilDecision {
                verdict: TradeVerdict::skipped("confidence stage failed"),
                stage: CouncilStage::SentimentDone,
                total_latency_ms: elapsed_ms(started),
                signal,
                sentiment,
                confidence,
            };
        }

        if confidence.confidence < self.min_confidence {
            info!(
                confidence = confidence.confidence,
                threshold  = self.min_confidence,
                "⛔ [COUNCIL] short-circuit SKIP (low confidence)"
            );
            return CouncilDecision {
                verdict: TradeVerdict::short_circuit(confidence.confidence, self.min_confidence),
                stage: CouncilStage::ShortCircuited,
                total_latency_ms: elapsed_ms(started),
                signal,
                sentiment,
                confidence,
            };
        }

        // ── 3. Judge ──────────────────────────────────────────────────────────
        info!("[COUNCIL] running trade judge");
        let verdict = self
            .run_judge(&signal, &sentiment, &confidence, available_capital)
            .await;
        info!(
            action     = %verdict.action,
            size_usd   = verdict.size_usd,
            latency_ms = verdict.latency_ms as u64,
            "[COUNCIL] verdict"
        );

        let stage = if verdict.degraded {
            CouncilStage::ConfidenceDone
        } else {
            CouncilStage::JudgeDone
        };

        CouncilDecision {
            total_latency_ms: elapsed_ms(started),
            signal,
            sentiment,
            confidence,
            verdict,
            stage,
        }
    }

    async fn run_sentiment(&self, signal: &DivergenceSignal) -> SentimentResult {
        let prompt = prompts::sentiment_prompt(signal);
        let started = Instant::now();

        let reply = match self
            .backend
            .chat(ChatRequest {
                model: self.model_sentiment.clone(),
                prompt,
                temperature: 0.3,
                max_tokens: 2048,
                think: true,
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "[COUNCIL] sentiment stage error");
                return SentimentResult {
                    sentiment:  Sentiment::Neutral,
                    reasoning:  format!("Error: {e}"),
                    model:      self.model_sentiment.clone(),
                    latency_ms: elapsed_ms(started),
                    degraded:   true,
                };
            }
        };

        let response = reply.response.trim();
        let merged = reply.merged();

        let label = parse::extract_sentiment(response, &merged);
        if label.is_fallback() {
            warn!(model = %self.model_sentiment, "[COUNCIL] no sentiment label in reply");
        } else {
            debug!(raw = %label.raw, "[COUNCIL] sentiment matched");
        }

        SentimentResult {
            sentiment:  label.value,
            reasoning:  parse::extract_reasoning_line(response, &merged),
            model:      self.model_sentiment.clone(),
            latency_ms: elapsed_ms(started),
            degraded:   label.is_fallback(),
        }
    }

    async fn run_confidence(
        &self,
        signal: &DivergenceSignal,
        sentiment: &SentimentResult,
    ) -> ConfidenceGrade {
        let prompt = prompts::confidence_prompt(signal, sentiment);
        let started = Instant::now();

        let reply = match self
            .backend
            .chat(ChatRequest {
                model: self.model_grader.clone(),
                prompt,
                temperature: 0.3,
                max_tokens: 4096,
                think: true,
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "[COUNCIL] confidence stage error");
                return ConfidenceGrade {
                    confidence: 0.0,
                    reasoning:  format!("Error: {e}"),
                    model:      self.model_grader.clone(),
                    latency_ms: elapsed_ms(started),
                    degraded:   true,
                };
            }
        };

        let response = reply.response.trim();
        let merged = reply.merged();

        let grade = parse::extract_confidence(response, &merged);
        if grade.is_fallback() {
            warn!(model = %self.model_grader, raw = %grade.raw, "[COUNCIL] no confidence value in reply");
        } else {
            debug!(raw = %grade.raw, "[COUNCIL] confidence matched");
        }

        ConfidenceGrade {
            confidence: grade.value,
            reasoning:  parse::extract_reasoning_line(response, &merged),
            model:      self.model_grader.clone(),
            latency_ms: elapsed_ms(started),
            degraded:   grade.is_fallback(),
        }
    }

    async fn run_judge(
        &self,
        signal: &DivergenceSignal,
        sentiment: &SentimentResult,
        confidence: &ConfidenceGrade,
        available_capital: f64,
    ) -> TradeVerdict {
        let prompt = prompts::judge_prompt(
            signal,
            sentiment,
            confidence,
            self.max_position_size,
            available_capital,
        );
        let started = Instant::now();

        let reply = match self
            .backend
            .chat(ChatRequest {
                model: self.model_judge.clone(),
                prompt,
                temperature: 0.2,
                max_tokens: 2048,
                think: true,
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "[COUNCIL] judge stage error");
                return TradeVerdict {
                    action:     TradeAction::Skip,
                    size_usd:   0.0,
                    reasoning:  format!("Error: {e}"),
                    model:      self.model_judge.clone(),
                    latency_ms: elapsed_ms(started),
                    degraded:   true,
                };
            }
        };

        let response = reply.response.trim();
        let merged = reply.merged();

        let verdict = parse::extract_verdict(response, &merged, self.max_position_size);
        if verdict.is_fallback() {
            warn!(model = %self.model_judge, "[COUNCIL] no decision in reply");
        } else {
            debug!(raw = %verdict.raw, "[COUNCIL] decision matched");
        }

        let (action, size_usd) = verdict.value;
        TradeVerdict {
            action,
            size_usd,
            reasoning:  parse::extract_reasoning_block(response, &merged),
            model:      self.model_judge.clone(),
            latency_ms: elapsed_ms(started),
            degraded:   verdict.is_fallback(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::error::AgentError;
    use crate::llm::ChatReply;
    use crate::models::signal::Direction;

    /// Replays a fixed script of replies and records every request it saw.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<ChatReply, AgentError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<ChatReply, AgentError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn chat(&self, req: ChatRequest) -> Result<ChatReply, AgentError> {
            self.seen.lock().unwrap().push(req);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Llm("script exhausted".to_string())))
        }
    }

    fn text(reply: &str) -> Result<ChatReply, AgentError> {
        Ok(ChatReply {
            response: reply.to_string(),
            thinking: String::new(),
            latency_ms: 1.0,
        })
    }

    fn make_signal() -> DivergenceSignal {
        DivergenceSignal {
            symbol: "btcusdt".to_string(),
            price: 65_000.0,
            momentum_pct: 2.22,
            odds_midpoint: 0.50,
            implied_fair_odds: 0.5666,
            edge_pct: 6.66,
            signal_score: 0.45,
            direction: Direction::Up,
            ts: Utc::now(),
        }
    }

    fn make_council(backend: ScriptedBackend) -> Council<ScriptedBackend> {
        Council {
            backend,
            model_sentiment: "sentiment-model".to_string(),
            model_grader: "grader-model".to_string(),
            model_judge: "judge-model".to_string(),
            min_confidence: 0.3,
            max_position_size: 50.0,
        }
    }

    #[tokio::test]
    async fn test_full_council_reaches_trade() {
        let council = make_council(ScriptedBackend::new(vec![
            text("SENTIMENT: BULLISH\nREASONING: momentum backed by volume"),
            text("CONFIDENCE: 0.8\nREASONING: edge clears fees comfortably"),
            text("DECISION: TRADE\nSIZE: $25\nREASONING: clean divergence"),
        ]));

        let decision = council.evaluate(make_signal(), 800.0).await;

        assert_eq!(decision.stage, CouncilStage::JudgeDone);
        assert!(decision.wants_trade());
        assert_eq!(decision.verdict.size_usd, 25.0);
        assert_eq!(decision.sentiment.sentiment, Sentiment::Bullish);
        assert_eq!(decision.confidence.confidence, 0.8);
        assert!(!decision.verdict.degraded);

        // Judge prompt carries the capital snapshot and the uppercased symbol.
        let seen = council.backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].model, "judge-model");
        assert_eq!(seen[2].temperature, 0.2);
        assert!(seen[2].prompt.contains("Available: $800"));
        assert!(seen[2].prompt.contains("Max size: $50"));
        assert!(seen[0].prompt.contains("BTCUSDT"));
    }

    #[tokio::test]
    async fn test_low_confidence_short_circuits_before_judge() {
        let council = make_council(ScriptedBackend::new(vec![
            text("SENTIMENT: NEUTRAL\nREASONING: mixed tape"),
            text("CONFIDENCE: 0.2\nREASONING: probably noise"),
        ]));

        let decision = council.evaluate(make_signal(), 1000.0).await;

        assert_eq!(decision.stage, CouncilStage::ShortCircuited);
        assert_eq!(decision.verdict.action, TradeAction::Skip);
        assert_eq!(decision.verdict.size_usd, 0.0);
        assert_eq!(decision.verdict.model, "short-circuit");
        // The judge was never invoked.
        assert_eq!(council.backend.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_confidence_above_floor_runs_judge_even_for_skip() {
        let council = make_council(ScriptedBackend::new(vec![
            text("SENTIMENT: BULLISH\nREASONING: upward drift"),
            text("CONFIDENCE: 0.47\nREASONING: borderline but genuine"),
            text("DECISION: SKIP\nSIZE: 0\nREASONING: fees eat the edge"),
        ]));

        let decision = council.evaluate(make_signal(), 1000.0).await;

        // 0.47 >= 0.3, so the judge ran and decided on its own.
        assert_eq!(decision.stage, CouncilStage::JudgeDone);
        assert_eq!(decision.verdict.action, TradeAction::Skip);
        assert_eq!(decision.verdict.model, "judge-model");
        assert_eq!(decision.confidence.confidence, 0.47);
        assert_eq!(council.backend.seen.lock().unwrap().len(), 3);
        // All three rationales survive onto the finalized decision.
        assert_eq!(decision.sentiment.reasoning, "upward drift");
        assert_eq!(decision.confidence.reasoning, "borderline but genuine");
        assert_eq!(decision.verdict.reasoning, "fees eat the edge");
    }

    #[tokio::test]
    async fn test_sentiment_failure_finalizes_with_defaults() {
        let council = make_council(ScriptedBackend::new(vec![Err(AgentError::Llm(
            "connection refused".to_string(),
        ))]));

        let decision = council.evaluate(make_signal(), 1000.0).await;

        assert_eq!(decision.stage, CouncilStage::Init);
        assert_eq!(decision.sentiment.sentiment, Sentiment::Neutral);
        assert!(decision.sentiment.degraded);
        assert!(decision.sentiment.reasoning.starts_with("Error:"));
        // Downstream stages never ran and hold their synthetic placeholders.
        assert_eq!(decision.confidence.model, "skipped");
        assert_eq!(decision.verdict.model, "skipped");
        assert_eq!(decision.verdict.action, TradeAction::Skip);
        assert_eq!(council.backend.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confidence_parse_failure_skips_judge() {
        let council = make_council(ScriptedBackend::new(vec![
            text("SENTIMENT: BEARISH\nREASONING: heavy selling"),
            text("I cannot commit to a number here."),
        ]));

        let decision = council.evaluate(make_signal(), 1000.0).await;

        assert_eq!(decision.stage, CouncilStage::SentimentDone);
        assert!(decision.confidence.degraded);
        assert_eq!(decision.confidence.confidence, 0.0);
        assert_eq!(decision.verdict.model, "skipped");
        assert_eq!(council.backend.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_judge_transport_error_degrades_to_skip() {
        let council = make_council(ScriptedBackend::new(vec![
            text("SENTIMENT: BULLISH\nREASONING: strong bid"),
            text("CONFIDENCE: 0.9\nREASONING: textbook setup"),
            Err(AgentError::Llm("timeout".to_string())),
        ]));

        let decision = council.evaluate(make_signal(), 1000.0).await;

        assert_eq!(decision.stage, CouncilStage::ConfidenceDone);
        assert_eq!(decision.verdict.action, TradeAction::Skip);
        assert!(decision.verdict.degraded);
        assert!(decision.verdict.reasoning.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_answer_inside_thinking_is_still_found() {
        let thinking_only = Ok(ChatReply {
            response: String::new(),
            thinking: "the tape looks weak... SENTIMENT: BEARISH, REASONING: sellers in control".to_string(),
            latency_ms: 1.0,
        });
        let council = make_council(ScriptedBackend::new(vec![
            thinking_only,
            text("CONFIDENCE: 0.1\nREASONING: thin edge"),
        ]));

        let decision = council.evaluate(make_signal(), 1000.0).await;

        assert_eq!(decision.sentiment.sentiment, Sentiment::Bearish);
        assert!(!decision.sentiment.degraded);
        assert_eq!(decision.stage, CouncilStage::ShortCircuited);
    }
}
