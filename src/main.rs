//! # Parallax — Price/Odds Divergence Trading Agent
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌────────────┐ ticks   ┌────────────┐ observations ┌──────────┐
//!  │ Price Feed │ ──────▶ │ Aggregator │ ───────────▶ │ Detector │
//!  └────────────┘         └────────────┘              └────┬─────┘
//!  ┌────────────┐ quotes        ▲                          │ signals
//!  │ Odds Feed  │ ──────────────┘                          ▼
//!  └────────────┘                                 ┌─────────────────┐
//!                                                 │ Council (3 LLM  │
//!                                                 │ stages + gates) │
//!                                                 └────────┬────────┘
//!                                                          ▼
//!                                     ┌───────────┐    ┌──────────┐
//!                                     │ Risk Gate │ ─▶ │ Executor │ ─▶ SQLite
//!                                     └───────────┘    └──────────┘
//! ```
//!
//! Every arrow is a bounded channel. The feeds drop on full so ingestion
//! never blocks on a slow LLM; everything downstream applies backpressure.
//!
//! ## Environment Variables (selected)
//!
//! | Variable          | Default               | Description                       |
//! |-------------------|-----------------------|-----------------------------------|
//! | `TRADING_MODE`    | `paper`               | `paper` or `live` (fills stay simulated either way) |
//! | `BINANCE_SYMBOLS` | `btcusdt,ethusdt,solusdt` | Symbols to trade              |
//! | `OLLAMA_HOST`     | `https://ollama.com`  | Chat-API base URL                 |
//! | `DB_PATH`         | `data/trades.db`      | SQLite file                       |
//! | `RUST_LOG`        | `parallax=debug`      | Tracing filter                    |
//!
//! The full surface (thresholds, risk limits, sim knobs) lives in `config.rs`.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod council;
mod engine;
mod error;
mod feeds;
mod llm;
mod models;
mod pipeline;
mod risk;
mod storage;

use config::Config;
use council::Council;
use engine::detector::Detector;
use engine::executor::PaperExecutor;
use feeds::SpotBoard;
use llm::OllamaClient;
use risk::{RiskGate, RiskLimits};

// ─── Channel capacities ───────────────────────────────────────────────────────

const PRICE_CHANNEL_CAP: usize = 1000;
const ODDS_CHANNEL_CAP: usize = 1000;
const OBSERVATION_CHANNEL_CAP: usize = 500;
const SIGNAL_CHANNEL_CAP: usize = 100;

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional — CI/prod can use real env vars) ──────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("parallax=debug".parse()?)
            .add_directive("sqlx=warn".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║      PARALLAX — Divergence Trading Agent      ║
  ║    Feeds  ·  Detector  ·  Council  ·  Risk    ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Configuration ──────────────────────────────────────────────────────
    let config = Arc::new(Config::from_env().context("invalid configuration")?);
    if config.is_live() {
        warn!("🎭 TRADING_MODE=live requested, but only the paper executor ships — fills stay simulated");
    }

    // ── 4. Persistence + risk ledger ──────────────────────────────────────────
    let pool = storage::init(&config.db_path).await?;
    let gate = RiskGate::new(RiskLimits::from_config(&config));
    let carried = storage::open_trades(&pool).await?;
    gate.seed(&carried).await;

    // ── 5. LLM backend preflight ──────────────────────────────────────────────
    let backend = OllamaClient::new(&config.ollama_host, config.ollama_api_key.clone());
    if backend.is_available().await {
        info!(host = %config.ollama_host, "✅ LLM backend reachable");
    } else {
        warn!(
            host = %config.ollama_host,
            "🔌 LLM backend unreachable — council stages will degrade to safe defaults"
        );
    }
    let council = Council::new(backend, &config);

    // ── 6. Wire the pipeline ──────────────────────────────────────────────────
    let (price_tx, price_rx) = mpsc::channel(PRICE_CHANNEL_CAP);
    let (odds_tx, odds_rx) = mpsc::channel(ODDS_CHANNEL_CAP);
    let (obs_tx, obs_rx) = mpsc::channel(OBSERVATION_CHANNEL_CAP);
    let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAP);

    let board = SpotBoard::new();
    let markets = feeds::odds::generate_markets(&config, &board).await;
    let detector = Detector::new(&config);
    let executor = PaperExecutor::new(pool.clone());

    tokio::spawn(feeds::price::run(config.clone(), board.clone(), price_tx));
    tokio::spawn(feeds::odds::run(config.clone(), board.clone(), markets, odds_tx));
    tokio::spawn(engine::aggregator::run(price_rx, odds_rx, obs_tx));
    tokio::spawn(engine::detector::run(detector, obs_rx, signal_tx));
    tokio::spawn(pipeline::run(
        council,
        gate.clone(),
        executor,
        pool.clone(),
        signal_rx,
    ));
    tokio::spawn(pipeline::status_loop(pool.clone(), gate.clone()));

    info!(
        mode      = %config.trading_mode,
        symbols   = ?config.symbols,
        sentiment = %config.model_sentiment,
        grader    = %config.model_grader,
        judge     = %config.model_judge,
        "🚀 Parallax pipeline running — ctrl-c to stop"
    );

    // ── 7. Run until shutdown ─────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("👋 Shutdown signal received — stopping all tasks");

    Ok(())
}
