//! # engine::detector
//!
//! Core strategy: price momentum implies where the odds *should* sit; the
//! quoted midpoint shows where they *do* sit. When the gap is wide enough and
//! the composite score agrees, a [`DivergenceSignal`] goes to the council.
//!
//! Evaluation is a pure function of one observation plus the two thresholds.
//! All feed history lives upstream (the momentum window travels inside the
//! tick), so replaying an observation always yields the same answer.

use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::models::{AlignedObservation, Direction, DivergenceSignal};

// ─── Tunables ─────────────────────────────────────────────────────────────────

/// 1% of price momentum shifts the implied fair odds by 3 percentage points.
const MOMENTUM_ODDS_FACTOR: f64 = 0.03;

/// Edge component saturates at 10 percentage points.
const EDGE_SATURATION_PCT: f64 = 10.0;

/// Momentum component saturates at 5%.
const MOMENTUM_SATURATION_PCT: f64 = 5.0;

/// Volume ratio below this contributes nothing to the score.
const VOLUME_SPIKE_RATIO: f64 = 1.5;

/// Ratio span over which the volume component climbs from 0 to 1
/// (1.5x average scores 0, 5x average saturates).
const VOLUME_SATURATION_SPAN: f64 = 3.5;

const WEIGHT_EDGE: f64 = 0.5;
const WEIGHT_MOMENTUM: f64 = 0.3;
const WEIGHT_VOLUME: f64 = 0.2;

// ─── Scoring ──────────────────────────────────────────────────────────────────

/// Where the odds *should* be given price momentum, clamped into [0.01, 0.99].
///
/// If the spot price is surging, the probability of "above X" contracts ought
/// to be higher than a stale market currently quotes.
pub fn implied_fair_odds(odds_midpoint: f64, momentum_pct: f64) -> f64 {
    (odds_midpoint + momentum_pct * MOMENTUM_ODDS_FACTOR).clamp(0.01, 0.99)
}

fn score_edge(edge_pct: f64) -> f64 {
    (edge_pct.abs() / EDGE_SATURATION_PCT).min(1.0)
}

fn score_momentum(momentum_pct: f64) -> f64 {
    (momentum_pct.abs() / MOMENTUM_SATURATION_PCT).min(1.0)
}

fn score_volume(volume_24h: f64, avg_volume: f64) -> f64 {
    if avg_volume <= 0.0 {
        return 0.0;
    }
    let ratio = volume_24h / avg_volume;
    if ratio < VOLUME_SPIKE_RATIO {
        return 0.0;
    }
    ((ratio - VOLUME_SPIKE_RATIO) / VOLUME_SATURATION_SPAN).min(1.0)
}

/// Weighted 0–1 conviction score, rounded to four decimals.
pub fn composite_score(edge_pct: f64, momentum_pct: f64, volume_24h: f64, avg_volume: f64) -> f64 {
    let e = score_edge(edge_pct) * WEIGHT_EDGE;
    let m = score_momentum(momentum_pct) * WEIGHT_MOMENTUM;
    let v = score_volume(volume_24h, avg_volume) * WEIGHT_VOLUME;
    round4(e + m + v)
}

#[inline]
fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

// ─── Detector ─────────────────────────────────────────────────────────────────

pub struct Detector {
    min_edge_pct:     f64,
    min_signal_score: f64,
    /// Liquidity baseline for the volume component. No live baseline feed is
    /// wired in, and a zero baseline scores the component 0.
    avg_volume: f64,
}

impl Detector {
    pub fn new(config: &Config) -> Self {
        Self {
            min_edge_pct:     config.min_edge_pct,
            min_signal_score: config.min_signal_score,
            avg_volume:       0.0,
        }
    }

    /// Score one observation. `None` means below threshold — discarded with
    /// no side effect.
    pub fn evaluate(&self, obs: &AlignedObservation) -> Option<DivergenceSignal> {
        let implied = implied_fair_odds(obs.odds_midpoint, obs.momentum_pct);

        // Percentage points, measured after the clamp so a saturated implied
        // value cannot overstate the edge.
        let edge_pct = (implied - obs.odds_midpoint) * 100.0;
        if edge_pct.abs() <= self.min_edge_pct {
            return None;
        }

        let score = composite_score(edge_pct, obs.momentum_pct, obs.volume_24h, self.avg_volume);
        if score <= self.min_signal_score {
            return None;
        }

        let direction = if obs.momentum_pct > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        };

        Some(DivergenceSignal {
            symbol:            obs.symbol.clone(),
            price:             obs.price,
            momentum_pct:      obs.momentum_pct,
            odds_midpoint:     obs.odds_midpoint,
            implied_fair_odds: implied,
            edge_pct,
            signal_score:      score,
            direction,
            ts:                obs.ts,
        })
    }
}

// ─── Run loop ─────────────────────────────────────────────────────────────────

/// Consume observations until the channel closes, forwarding every signal
/// that clears both thresholds.
pub async fn run(
    detector: Detector,
    mut obs_rx: mpsc::Receiver<AlignedObservation>,
    signal_tx: mpsc::Sender<DivergenceSignal>,
) {
    info!(
        min_edge_pct = detector.min_edge_pct,
        min_score    = detector.min_signal_score,
        "[DETECTOR] started"
    );

    while let Some(obs) = obs_rx.recv().await {
        if let Some(signal) = detector.evaluate(&obs) {
            info!(
                symbol    = %signal.symbol,
                edge_pct  = signal.edge_pct,
                score     = signal.signal_score,
                direction = %signal.direction,
                "🎯 [DETECTOR] divergence signal"
            );
            if signal_tx.send(signal).await.is_err() {
                break;
            }
        }
    }

    info!("[DETECTOR] observation stream closed — stopping");
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_detector() -> Detector {
        Detector {
            min_edge_pct:     0.5,
            min_signal_score: 0.15,
            avg_volume:       0.0,
        }
    }

    fn make_obs(momentum_pct: f64, odds_midpoint: f64) -> AlignedObservation {
        AlignedObservation {
            symbol: "btcusdt".to_string(),
            price: 65_000.0,
            momentum_pct,
            volume_24h: 1_000_000.0,
            odds_midpoint,
            odds_age_ms: 800,
            ts: Utc::now(),
        }
    }

    #[test]
    fn implied_odds_shift_with_momentum() {
        assert!((implied_fair_odds(0.50, 2.22) - 0.5666).abs() < 1e-9);
        assert!((implied_fair_odds(0.50, -2.22) - 0.4334).abs() < 1e-9);
    }

    #[test]
    fn implied_odds_stay_inside_probability_bounds() {
        assert!((implied_fair_odds(0.98, 2.0) - 0.99).abs() < 1e-12);
        assert!((implied_fair_odds(0.02, -2.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn edge_component_saturates_at_ten_points() {
        assert!((score_edge(5.0) - 0.5).abs() < 1e-9);
        assert!((score_edge(-5.0) - 0.5).abs() < 1e-9);
        assert!((score_edge(15.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn momentum_component_saturates_at_five_pct() {
        assert!((score_momentum(2.5) - 0.5).abs() < 1e-9);
        assert!((score_momentum(-7.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn volume_component_needs_a_baseline_and_a_spike() {
        // No baseline at all.
        assert_eq!(score_volume(1_000_000.0, 0.0), 0.0);
        // Below the 1.5x spike ratio.
        assert_eq!(score_volume(1_400_000.0, 1_000_000.0), 0.0);
        // Midway through the span: 3.25x -> (3.25 - 1.5) / 3.5 = 0.5.
        assert!((score_volume(3_250_000.0, 1_000_000.0) - 0.5).abs() < 1e-9);
        // Far past saturation.
        assert!((score_volume(9_000_000.0, 1_000_000.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn composite_rounds_to_four_decimals() {
        // e = (1/3 / 10) * 0.5 = 0.01666... -> 0.0167
        assert_eq!(composite_score(1.0 / 3.0, 0.0, 0.0, 0.0), 0.0167);
    }

    #[test]
    fn evaluate_emits_on_strong_divergence() {
        let signal = make_detector()
            .evaluate(&make_obs(2.22, 0.50))
            .expect("should clear both thresholds");

        assert_eq!(signal.direction, Direction::Up);
        assert!((signal.implied_fair_odds - 0.5666).abs() < 1e-9);
        assert!((signal.edge_pct - 6.66).abs() < 1e-9);
        // 0.5 * 0.666 + 0.3 * 0.444 = 0.4662
        assert_eq!(signal.signal_score, 0.4662);
        assert_eq!(signal.symbol, "btcusdt");
    }

    #[test]
    fn evaluate_flags_negative_momentum_as_down() {
        let signal = make_detector()
            .evaluate(&make_obs(-2.22, 0.50))
            .expect("bearish divergence should also emit");

        assert_eq!(signal.direction, Direction::Down);
        assert!(signal.edge_pct < 0.0);
        assert_eq!(signal.signal_score, 0.4662);
    }

    #[test]
    fn evaluate_discards_thin_edge() {
        // 0.1% momentum -> 0.3 points of edge, under the 0.5 threshold.
        assert!(make_detector().evaluate(&make_obs(0.1, 0.50)).is_none());
    }

    #[test]
    fn evaluate_discards_weak_score() {
        // 0.2% momentum -> 0.6 points of edge (passes) but a 0.042 composite.
        assert!(make_detector().evaluate(&make_obs(0.2, 0.50)).is_none());
    }

    #[test]
    fn emission_flips_once_with_growing_momentum_and_stays() {
        let detector = make_detector();
        let ladder = [0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 4.0];

        let mut emitted_before = false;
        for momentum in ladder {
            let emitted = detector.evaluate(&make_obs(momentum, 0.50)).is_some();
            assert!(
                emitted || !emitted_before,
                "emission must not flip back off as momentum grows (at {momentum})"
            );
            emitted_before = emitted;
        }
        assert!(emitted_before, "the strongest rung must emit");
    }

    #[test]
    fn clamp_caps_the_edge_near_certainty() {
        // Raw implied would be 1.27; the clamp holds it at 0.99 so only two
        // points of edge remain.
        let signal = make_detector()
            .evaluate(&make_obs(10.0, 0.97))
            .expect("two points of edge still clears the threshold");

        assert!((signal.implied_fair_odds - 0.99).abs() < 1e-12);
        assert!((signal.edge_pct - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_forwards_signals_and_drops_noise() {
        let (obs_tx, obs_rx) = mpsc::channel(8);
        let (signal_tx, mut signal_rx) = mpsc::channel(8);
        tokio::spawn(run(make_detector(), obs_rx, signal_tx));

        obs_tx.send(make_obs(0.01, 0.50)).await.unwrap();
        obs_tx.send(make_obs(2.22, 0.50)).await.unwrap();
        drop(obs_tx);

        let signal = signal_rx.recv().await.expect("one signal should emerge");
        assert!((signal.momentum_pct - 2.22).abs() < 1e-9);
        assert!(signal_rx.recv().await.is_none());
    }
}
