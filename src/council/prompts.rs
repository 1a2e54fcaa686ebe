//! # prompts — templates for the three council stages
//!
//! Each template pins the model to a fixed line format (`SENTIMENT:`,
//! `CONFIDENCE:`, `DECISION:` ...) so the parser can scan replies without
//! stripping markdown first.  Reasoning models tend to restate the answer
//! inside their deliberation, which is why the parser always takes the
//! LAST occurrence of a field.

use crate::models::council::{ConfidenceGrade, SentimentResult};
use crate::models::signal::DivergenceSignal;

/// Stage 1 — sentiment analyst.
pub fn sentiment_prompt(signal: &DivergenceSignal) -> String {
    format!(
        r#"Crypto market sentiment analyst. Classify the sentiment for this signal.

{symbol} | Price: ${price:.2} | Momentum: {momentum:+.2}% | Direction: {direction}
Odds: {odds:.2} | Fair: {fair:.2} | Edge: {edge:+.2}%

Output exactly two lines, nothing else:
SENTIMENT: [BULLISH or BEARISH or NEUTRAL]
REASONING: [one sentence why]
"#,
        symbol    = signal.symbol.to_uppercase(),
        price     = signal.price,
        momentum  = signal.momentum_pct,
        direction = signal.direction,
        odds      = signal.odds_midpoint,
        fair      = signal.implied_fair_odds,
        edge      = signal.edge_pct,
    )
}

/// Stage 2 — confidence grader.  Sees the sentiment verdict from stage 1.
pub fn confidence_prompt(signal: &DivergenceSignal, sentiment: &SentimentResult) -> String {
    format!(
        r#"Crypto trade confidence grader. Rate if this opportunity is genuine or noise.

{symbol} | Price: ${price:.2} | Momentum: {momentum:+.2}%
Odds: {odds:.2} | Fair: {fair:.2} | Edge: {edge:+.2}% | Score: {score:.2}
Sentiment: {sentiment} — {sentiment_reasoning}

Consider: edge vs 0.44% fees, momentum sustainability, sentiment alignment.

Output exactly two lines, nothing else:
CONFIDENCE: [number between 0.0 and 1.0]
REASONING: [one sentence why]
"#,
        symbol              = signal.symbol.to_uppercase(),
        price               = signal.price,
        momentum            = signal.momentum_pct,
        odds                = signal.odds_midpoint,
        fair                = signal.implied_fair_odds,
        edge                = signal.edge_pct,
        score               = signal.signal_score,
        sentiment           = sentiment.sentiment,
        sentiment_reasoning = sentiment.reasoning,
    )
}

/// Stage 3 — final judge.  Sees both upstream verdicts plus the live
/// capital picture, and must answer with a concrete dollar size.
pub fn judge_prompt(
    signal: &DivergenceSignal,
    sentiment: &SentimentResult,
    grade: &ConfidenceGrade,
    max_position_size: f64,
    available_capital: f64,
) -> String {
    format!(
        r#"Final trade judge. Decide TRADE or SKIP.

{symbol} | Price: ${price:.2} | Momentum: {momentum:+.2}%
Odds: {odds:.2} | Fair: {fair:.2} | Edge: {edge:+.2}% | Score: {score:.2}
Sentiment: {sentiment} — {sentiment_reasoning}
Confidence: {confidence:.2} — {confidence_reasoning}
Max size: ${max_size:.0} | Available: ${available:.0} | Fees: ~0.44%

Output exactly three lines, nothing else:
DECISION: [TRADE or SKIP]
SIZE: [dollar amount between 5 and {max_size:.0}, or 0 if SKIP]
REASONING: [one sentence why]
"#,
        symbol               = signal.symbol.to_uppercase(),
        price                = signal.price,
        momentum             = signal.momentum_pct,
        odds                 = signal.odds_midpoint,
        fair                 = signal.implied_fair_odds,
        edge                 = signal.edge_pct,
        score                = signal.signal_score,
        sentiment            = sentiment.sentiment,
        sentiment_reasoning  = sentiment.reasoning,
        confidence           = grade.confidence,
        confidence_reasoning = grade.reasoning,
        max_size             = max_position_size,
        available            = available_capital,
    )
}
