use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `reagent`.
///
/// Library callers can match on these to decide recovery strategy; internal
/// code continues to use `anyhow::Result` for ad-hoc context chains. Note
/// that most loop-level failures (tool errors, timeouts, cancellation) never
/// surface here at all: they are absorbed into the conversation as
/// observation text so the model can self-correct.
#[derive(Debug, Error)]
pub enum ReagentError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── LLM / Generator ─────────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── LLM / Generator errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("generator request failed: {message}")]
    Request { message: String },

    #[error("generator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed generator response: {0}")]
    InvalidResponse(String),
}
