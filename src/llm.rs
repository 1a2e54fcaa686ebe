//! # llm — Ollama-compatible chat client
//!
//! One HTTP client shared by all three council stages.  The council talks to
//! the [`LlmBackend`] trait, never to this client directly, so tests can
//! script replies without a network.
//!
//! ## API contract
//! POST `{host}/api/chat` with
//! `{ model, messages, options: { temperature, num_predict }, think, stream: false }`.
//! The reply carries `message.content` (the direct answer) and, for reasoning
//! models, `message.thinking` (the deliberation).  Either field may be empty.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::AgentError;

/// Upper bound on a single chat call.  Reasoning models on large prompts can
/// legitimately take minutes.
const CHAT_TIMEOUT: Duration = Duration::from_secs(300);

// ─── Request / Reply ──────────────────────────────────────────────────────────

/// One chat completion request for a single council stage.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Request extended reasoning where the backend supports it.
    pub think: bool,
}

/// What came back: a direct answer, reasoning text, or both.
/// Empty string means the field was absent.
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    pub response: String,
    pub thinking: String,
    pub latency_ms: f64,
}

impl ChatReply {
    /// Combined text used for fallback value scanning when the direct answer
    /// field has no well-formed value.  Wrapping the deliberation in `<think>`
    /// tags keeps it strippable for parsers that only want the visible answer.
    pub fn merged(&self) -> String {
        let r = self.response.trim();
        let t = self.thinking.trim();
        match (t.is_empty(), r.is_empty()) {
            (false, false) => format!("<think>{t}</think>\n{r}"),
            (false, true)  => t.to_string(),
            (true,  false) => r.to_string(),
            (true,  true)  => String::new(),
        }
    }
}

// ─── Backend seam ─────────────────────────────────────────────────────────────

/// The text-generation capability the council depends on.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatReply, AgentError>;
}

// ─── Ollama wire format ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiChatRequest<'a> {
    model:    &'a str,
    messages: Vec<ApiMessage<'a>>,
    options:  ApiOptions,
    think:    bool,
    stream:   bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role:    &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ApiOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ApiChatResponse {
    message: ApiResponseMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: String,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// HTTP client for an Ollama-compatible endpoint (local daemon or hosted).
pub struct OllamaClient {
    http:    reqwest::Client,
    host:    String,
    api_key: Option<String>,
}

impl OllamaClient {
    pub fn new(host: &str, api_key: Option<String>) -> Self {
        Self {
            http:    reqwest::Client::new(),
            host:    host.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Startup probe: can the backend be reached at all?  A `false` here does
    /// not stop the pipeline — stages will fall back to their safe defaults.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host);

        let mut call = self.http.get(&url).timeout(Duration::from_secs(5));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        match call.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatReply, AgentError> {
        let url = format!("{}/api/chat", self.host);

        let body = ApiChatRequest {
            model:    &req.model,
            messages: vec![ApiMessage { role: "user", content: &req.prompt }],
            options:  ApiOptions {
                temperature: req.temperature,
                num_predict: req.max_tokens,
            },
            think:  req.think,
            stream: false,
        };

        let started = Instant::now();

        let mut call = self.http.post(&url).json(&body).timeout(CHAT_TIMEOUT);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        // ── HTTP POST ─────────────────────────────────────────────────────────
        let response = call.send().await.map_err(|e| {
            error!(model = %req.model, error = %e, "LLM unreachable");
            AgentError::Llm(format!("{} unreachable: {e}", self.host))
        })?;

        // ── HTTP Status ───────────────────────────────────────────────────────
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(model = %req.model, http_status = %status, body = %body, "LLM returned HTTP error");
            return Err(AgentError::Llm(format!("HTTP {status}: {body}")));
        }

        // ── Parse Response ────────────────────────────────────────────────────
        let api: ApiChatResponse = response.json().await.map_err(|e| {
            error!(model = %req.model, error = %e, "LLM response parse failed");
            AgentError::Llm(format!("response decode error: {e}"))
        })?;

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            model      = %req.model,
            latency_ms,
            eval_count = ?api.eval_count,
            "LLM reply received"
        );

        Ok(ChatReply {
            response: api.message.content,
            thinking: api.message.thinking,
            latency_ms,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
