// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http_client;
pub mod scrub;
pub mod traits;

// ── Adapter implementations ──────────────────────────────────────────────────
pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod ollama;
pub mod openai;

// ── Re-exports ───────────────────────────────────────────────────────────────
pub use anthropic::AnthropicAdapter;
pub use factory::{AdapterKind, AdapterSettings, create_adapter, resolve_api_key};
pub use gemini::GeminiAdapter;
pub use http_client::{build_adapter_client, build_adapter_client_with_timeout};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use scrub::{sanitize_api_error, scrub_secret_patterns};
pub use traits::{Adapter, Attachment, Credentials, Prompt, Reply, Usage};
