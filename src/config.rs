//! # config — อ่าน Config จาก Environment Variables
//!
//! One immutable [`Config`] built once at startup and handed to every
//! component by parameter.  Nothing reads the environment after this.

use std::time::Duration;

use anyhow::bail;

// ─── Trading mode ─────────────────────────────────────────────────────────────

/// Execution mode.  `Live` is recognized but routes to the paper executor —
/// real order submission is not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Paper,
    Live,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Paper => write!(f, "paper"),
            TradingMode::Live  => write!(f, "live"),
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// ค่า Config ทั้งหมดของ Agent
#[derive(Debug, Clone)]
pub struct Config {
    pub trading_mode: TradingMode,

    // ── LLM council ──
    /// Base URL of the Ollama-compatible chat API.
    pub ollama_host:    String,
    /// Bearer token for hosted endpoints (`None` for a local instance).
    pub ollama_api_key: Option<String>,
    pub model_sentiment: String,
    pub model_grader:    String,
    pub model_judge:     String,
    /// Confidence floor below which the judge stage is never invoked.
    pub min_confidence: f64,

    // ── Feeds ──
    /// Lowercase exchange symbols, e.g. ["btcusdt", "ethusdt"].
    pub symbols: Vec<String>,

    // ── Divergence thresholds ──
    pub min_edge_pct:     f64,
    pub min_signal_score: f64,

    // ── Risk limits ──
    pub max_capital:        f64,
    pub max_position_size:  f64,
    pub max_open_positions: u32,
    pub cooldown_secs:      u64,

    // ── Persistence ──
    pub db_path: String,

    // ── Simulated feeds ──
    /// Tick interval shared by both simulated feeds.
    pub sim_interval:           Duration,
    /// How far the simulated odds lag behind spot, in seconds.
    pub sim_price_lag_secs:     u64,
    /// Uniform noise applied to simulated odds, in percent.
    pub sim_noise_pct:          f64,
    /// Strike distance from spot for generated markets, in percent.
    pub sim_strike_spread_pct:  f64,
    pub sim_markets_per_symbol: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mode_str = std::env::var("TRADING_MODE")
            .unwrap_or_else(|_| "paper".to_string())
            .to_lowercase();

        let trading_mode = match mode_str.as_str() {
            "paper" => TradingMode::Paper,
            "live"  => TradingMode::Live,
            other => bail!("Unknown TRADING_MODE: '{other}'. Use 'paper' or 'live'"),
        };

        let api_key = std::env::var("OLLAMA_API_KEY").ok().filter(|k| !k.is_empty());

        Ok(Self {
            trading_mode,
            ollama_host:     env_str("OLLAMA_HOST", "https://ollama.com"),
            ollama_api_key:  api_key,
            model_sentiment: env_str("LLM_MODEL_SENTIMENT", "nemotron-3-nano:30b"),
            model_grader:    env_str("LLM_MODEL_GRADER", "qwen3-next:80b"),
            model_judge:     env_str("LLM_MODEL_JUDGE", "gpt-oss:120b"),
            min_confidence:  env_f64("MIN_CONFIDENCE", 0.3),

            symbols: parse_symbols(&env_str("BINANCE_SYMBOLS", "btcusdt,ethusdt,solusdt")),

            min_edge_pct:     env_f64("MIN_EDGE_PCT", 0.5),
            min_signal_score: env_f64("MIN_SIGNAL_SCORE", 0.15),

            max_capital:        env_f64("MAX_CAPITAL", 1000.0),
            max_position_size:  env_f64("MAX_POSITION_SIZE", 50.0),
            max_open_positions: env_u32("MAX_OPEN_POSITIONS", 3),
            cooldown_secs:      env_u64("COOLDOWN_SECONDS", 30),

            db_path: env_str("DB_PATH", "data/trades.db"),

            sim_interval:           Duration::from_secs_f64(env_f64("SIM_ODDS_INTERVAL_SECS", 2.0)),
            sim_price_lag_secs:     env_u64("SIM_PRICE_LAG_SECS", 20),
            sim_noise_pct:          env_f64("SIM_NOISE_PCT", 1.0),
            sim_strike_spread_pct:  env_f64("SIM_STRIKE_SPREAD_PCT", 0.5),
            sim_markets_per_symbol: env_u32("SIM_MARKETS_PER_SYMBOL", 3),
        })
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.trading_mode == TradingMode::Live
    }
}

// ─── Env helpers ──────────────────────────────────────────────────────────────

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// แตก symbol list: lowercase, trim, ข้ามช่องว่าง
fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ─── Test support ─────────────────────────────────────────────────────────────

/// Config mirroring the env defaults, for tests that need one without
/// touching process env vars.
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        trading_mode: TradingMode::Paper,
        ollama_host:     "https://ollama.com".to_string(),
        ollama_api_key:  None,
        model_sentiment: "nemotron-3-nano:30b".to_string(),
        model_grader:    "qwen3-next:80b".to_string(),
        model_judge:     "gpt-oss:120b".to_string(),
        min_confidence:  0.3,

        symbols: vec![
            "btcusdt".to_string(),
            "ethusdt".to_string(),
            "solusdt".to_string(),
        ],

        min_edge_pct:     0.5,
        min_signal_score: 0.15,

        max_capital:        1_000.0,
        max_position_size:  50.0,
        max_open_positions: 3,
        cooldown_secs:      30,

        db_path: "data/trades.db".to_string(),

        sim_interval:           Duration::from_secs(2),
        sim_price_lag_secs:     20,
        sim_noise_pct:          1.0,
        sim_strike_spread_pct:  0.5,
        sim_markets_per_symbol: 3,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols_trims_and_lowercases() {
        let symbols = parse_symbols(" BTCUSDT, ethusdt ,solusdt,");
        assert_eq!(symbols, vec!["btcusdt", "ethusdt", "solusdt"]);
    }

    #[test]
    fn test_parse_symbols_empty_input() {
        assert!(parse_symbols("").is_empty());
        assert!(parse_symbols(" , ,").is_empty());
    }
}
