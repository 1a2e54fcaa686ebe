//! # parse — field extraction from free-form model replies
//!
//! Every stage asks for a fixed line format, but reasoning models rarely
//! oblige: the answer may sit inside the deliberation, be restated several
//! times, or echo the prompt's bracketed examples.  The scan policy is the
//! same for all stages:
//!
//! 1. scan the direct answer field; if it has any match, take the LAST one
//! 2. otherwise scan the merged text (`<think>` block + answer), last match
//! 3. no match anywhere → tagged [`ParseStatus::Fallback`] with the stage's
//!    safe default, never an error

use std::sync::OnceLock;

use regex::Regex;

use crate::models::council::{Sentiment, TradeAction};

/// Minimum dollar size the judge may assign to a TRADE.
const MIN_TRADE_SIZE_USD: f64 = 5.0;

// ─── Patterns ─────────────────────────────────────────────────────────────────

fn sentiment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)SENTIMENT:\s*(BULLISH|BEARISH|NEUTRAL)").expect("valid pattern"))
}

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)CONFIDENCE:\s*([\d.]+)").expect("valid pattern"))
}

fn decision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DECISION:\s*(TRADE|SKIP)").expect("valid pattern"))
}

fn size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)SIZE:\s*\$?([\d.]+)").expect("valid pattern"))
}

/// Line mode: the rationale is one line, capture stops at the newline.
fn reasoning_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)REASONING:\s*(.+)").expect("valid pattern"))
}

/// Block mode: the judge tends to write multi-line rationale, capture to end.
fn reasoning_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)REASONING:\s*(.+)").expect("valid pattern"))
}

fn think_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid pattern"))
}

// ─── Tagged result ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// A well-formed value was found in the reply.
    Matched,
    /// Nothing extractable; `value` is the stage's safe default.
    Fallback,
}

/// A stage value plus how it was obtained and the raw fragment it came from.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub status: ParseStatus,
    pub value:  T,
    pub raw:    String,
}

impl<T> Extracted<T> {
    #[inline]
    pub fn is_fallback(&self) -> bool {
        self.status == ParseStatus::Fallback
    }
}

// ─── Scan helpers ─────────────────────────────────────────────────────────────

fn scan_last<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Direct answer field first; only when it yields nothing, the merged text.
fn last_value<'t>(re: &Regex, response: &'t str, merged: &'t str) -> Option<&'t str> {
    scan_last(re, response).or_else(|| scan_last(re, merged))
}

/// Character-boundary-safe prefix.  Reasoning models write in any script.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ─── Stage extractors ─────────────────────────────────────────────────────────

pub fn extract_sentiment(response: &str, merged: &str) -> Extracted<Sentiment> {
    match last_value(sentiment_re(), response, merged) {
        Some(raw) => {
            let value = match raw.to_ascii_uppercase().as_str() {
                "BULLISH" => Sentiment::Bullish,
                "BEARISH" => Sentiment::Bearish,
                _ => Sentiment::Neutral,
            };
            Extracted { status: ParseStatus::Matched, value, raw: raw.to_string() }
        }
        None => Extracted {
            status: ParseStatus::Fallback,
            value:  Sentiment::Neutral,
            raw:    String::new(),
        },
    }
}

/// Confidence in [0,1].  Out-of-range numbers are clamped; a fragment that
/// looks numeric but fails to parse (e.g. `1.2.3`) is a fallback, not a panic.
pub fn extract_confidence(response: &str, merged: &str) -> Extracted<f64> {
    match last_value(confidence_re(), response, merged) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) => Extracted {
                status: ParseStatus::Matched,
                value:  v.clamp(0.0, 1.0),
                raw:    raw.to_string(),
            },
            Err(_) => Extracted {
                status: ParseStatus::Fallback,
                value:  0.0,
                raw:    raw.to_string(),
            },
        },
        None => Extracted { status: ParseStatus::Fallback, value: 0.0, raw: String::new() },
    }
}

/// TRADE/SKIP plus dollar size.  A TRADE without a usable positive size is
/// downgraded to SKIP — the decision line itself still counts as matched.
pub fn extract_verdict(
    response: &str,
    merged: &str,
    max_position_size: f64,
) -> Extracted<(TradeAction, f64)> {
    let Some(raw_decision) = last_value(decision_re(), response, merged) else {
        return Extracted {
            status: ParseStatus::Fallback,
            value:  (TradeAction::Skip, 0.0),
            raw:    String::new(),
        };
    };

    let mut action = if raw_decision.eq_ignore_ascii_case("TRADE") {
        TradeAction::Trade
    } else {
        TradeAction::Skip
    };
    let mut size_usd = 0.0;

    if action == TradeAction::Trade {
        if let Some(raw_size) = last_value(size_re(), response, merged) {
            match raw_size.parse::<f64>() {
                Ok(v) => size_usd = v.min(max_position_size).max(MIN_TRADE_SIZE_USD),
                Err(_) => {
                    size_usd = 0.0;
                    action = TradeAction::Skip;
                }
            }
        }
        if action == TradeAction::Trade && size_usd <= 0.0 {
            action = TradeAction::Skip;
        }
    }

    Extracted {
        status: ParseStatus::Matched,
        value:  (action, size_usd),
        raw:    raw_decision.to_string(),
    }
}

/// Rationale for the single-line stages (sentiment, confidence).
pub fn extract_reasoning_line(response: &str, merged: &str) -> String {
    extract_reasoning(reasoning_line_re(), response, merged)
}

/// Rationale for the judge, which may span several lines.
pub fn extract_reasoning_block(response: &str, merged: &str) -> String {
    extract_reasoning(reasoning_block_re(), response, merged)
}

fn extract_reasoning(re: &Regex, response: &str, merged: &str) -> String {
    match last_value(re, response, merged) {
        Some(m) => truncate(m.trim(), 500),
        // No REASONING line at all: keep a short excerpt of the visible text.
        None => {
            let clean = think_re().replace_all(merged, "");
            truncate(clean.trim(), 200)
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_from_answer_field() {
        let out = extract_sentiment("SENTIMENT: BULLISH\nREASONING: momentum is strong", "");
        assert_eq!(out.status, ParseStatus::Matched);
        assert_eq!(out.value, Sentiment::Bullish);
        assert_eq!(out.raw, "BULLISH");
    }

    #[test]
    fn test_sentiment_scans_merged_when_answer_empty() {
        let merged = "<think>price is falling hard</think>\nsentiment: bearish, clearly";
        let out = extract_sentiment("", merged);
        assert_eq!(out.status, ParseStatus::Matched);
        assert_eq!(out.value, Sentiment::Bearish);
    }

    #[test]
    fn test_sentiment_fallback_is_neutral() {
        let out = extract_sentiment("no idea what to say here", "no idea what to say here");
        assert_eq!(out.status, ParseStatus::Fallback);
        assert_eq!(out.value, Sentiment::Neutral);
    }

    #[test]
    fn test_confidence_takes_last_occurrence() {
        // Deliberation echoes an example value before concluding.
        let merged = "<think>the format asks for CONFIDENCE: 0.9 style output, \
                      but this edge is thin. CONFIDENCE: 0.35 feels right</think>";
        let out = extract_confidence("", merged);
        assert_eq!(out.status, ParseStatus::Matched);
        assert!((out.value - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped_to_unit_range() {
        let out = extract_confidence("CONFIDENCE: 1.8", "");
        assert_eq!(out.status, ParseStatus::Matched);
        assert_eq!(out.value, 1.0);
    }

    #[test]
    fn test_confidence_unparsable_number_is_fallback() {
        let out = extract_confidence("CONFIDENCE: 0.4.2", "");
        assert_eq!(out.status, ParseStatus::Fallback);
        assert_eq!(out.value, 0.0);
    }

    #[test]
    fn test_verdict_trade_with_dollar_size() {
        let out = extract_verdict("DECISION: TRADE\nSIZE: $12.50\nREASONING: clean edge", "", 50.0);
        assert_eq!(out.status, ParseStatus::Matched);
        assert_eq!(out.value, (TradeAction::Trade, 12.5));
    }

    #[test]
    fn test_verdict_size_clamped_into_limits() {
        let big = extract_verdict("DECISION: TRADE\nSIZE: 500", "", 50.0);
        assert_eq!(big.value, (TradeAction::Trade, 50.0));

        let tiny = extract_verdict("DECISION: TRADE\nSIZE: 2", "", 50.0);
        assert_eq!(tiny.value, (TradeAction::Trade, 5.0));
    }

    #[test]
    fn test_verdict_skip_ignores_size_line() {
        let out = extract_verdict("DECISION: SKIP\nSIZE: 25\nREASONING: fees eat the edge", "", 50.0);
        assert_eq!(out.status, ParseStatus::Matched);
        assert_eq!(out.value, (TradeAction::Skip, 0.0));
    }

    #[test]
    fn test_verdict_trade_without_size_downgrades_to_skip() {
        let out = extract_verdict("DECISION: TRADE\nREASONING: forgot the size line", "", 50.0);
        assert_eq!(out.status, ParseStatus::Matched);
        assert_eq!(out.value, (TradeAction::Skip, 0.0));
    }

    #[test]
    fn test_verdict_no_decision_anywhere_is_fallback() {
        let out = extract_verdict("", "<think>hmm</think>\nI would rather not commit", 50.0);
        assert_eq!(out.status, ParseStatus::Fallback);
        assert_eq!(out.value, (TradeAction::Skip, 0.0));
    }

    #[test]
    fn test_reasoning_line_stops_at_newline() {
        let text = "SENTIMENT: NEUTRAL\nREASONING: flat momentum\nextra trailing noise";
        assert_eq!(extract_reasoning_line(text, ""), "flat momentum");
    }

    #[test]
    fn test_reasoning_block_spans_lines() {
        let text = "DECISION: SKIP\nREASONING: spread too wide\nand volume is thin";
        assert_eq!(extract_reasoning_block(text, ""), "spread too wide\nand volume is thin");
    }

    #[test]
    fn test_reasoning_fallback_strips_think_block() {
        let merged = "<think>internal deliberation</think>\n  market looks balanced  ";
        assert_eq!(extract_reasoning_line("", merged), "market looks balanced");
    }

    #[test]
    fn test_reasoning_truncated_to_500_chars() {
        let long = format!("REASONING: {}", "x".repeat(900));
        assert_eq!(extract_reasoning_line(&long, "").len(), 500);
    }
}
