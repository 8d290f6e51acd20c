use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the painting agent.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum AgentError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generative backend ──────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Canvas transport ────────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Prompt / Template ───────────────────────────────────────────────
    #[error("prompt: {0}")]
    Prompt(#[from] PromptError),

    // ── Color codec ─────────────────────────────────────────────────────
    #[error("color: {0}")]
    Color(#[from] ColorError),

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

// ─── Generative backend errors ───────────────────────────────────────────────

/// Failures surfaced by an adapter's `invoke`. The control loop downcasts
/// to this type to pick a backoff tier.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("adapter {adapter} request failed: {message}")]
    Request { adapter: String, message: String },

    #[error("adapter {adapter} rate-limited (retry after {retry_after_secs}s)")]
    RateLimited {
        adapter: String,
        retry_after_secs: u64,
    },

    #[error("adapter {adapter} timed out")]
    Timeout { adapter: String },

    #[error("adapter {adapter} authentication failed")]
    Auth { adapter: String },

    #[error("adapter {adapter} returned an empty reply")]
    EmptyReply { adapter: String },
}

// ─── Transport errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection lost")]
    Disconnected,

    #[error("send failed: {0}")]
    Send(String),

    #[error("malformed frame: {0}")]
    Frame(String),
}

// ─── Prompt errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template {name} failed to render: {message}")]
    Render { name: String, message: String },

    #[error("fragment library could not be loaded: {0}")]
    Library(String),
}

// ─── Color errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("'{0}' cannot be reduced to six hex digits")]
    InvalidHex(String),

    #[error("compact code '{0}' must be three digits 0-9")]
    InvalidCompact(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, AgentError>;
