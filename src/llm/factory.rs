use super::anthropic::AnthropicAdapter;
use super::gemini::GeminiAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAiAdapter;
use super::traits::Adapter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};

/// Supported generative backends.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Anthropic,
    #[strum(to_string = "openai", serialize = "gpt")]
    OpenAi,
    #[strum(to_string = "gemini", serialize = "google")]
    Gemini,
    #[strum(to_string = "ollama", serialize = "llava")]
    Ollama,
}

/// Construction knobs shared by every adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterSettings {
    pub model: Option<String>,
    pub temperature: f64,
    pub base_url: Option<String>,
}

pub fn create_adapter(kind: AdapterKind, settings: &AdapterSettings) -> Arc<dyn Adapter> {
    let model = settings.model.as_deref().map(str::trim).filter(|m| !m.is_empty());
    let base_url = settings.base_url.as_deref();
    let temperature = settings.temperature;
    match kind {
        AdapterKind::Anthropic => {
            Arc::new(AnthropicAdapter::with_base_url(model, temperature, base_url))
        }
        AdapterKind::OpenAi => Arc::new(OpenAiAdapter::with_base_url(model, temperature, base_url)),
        AdapterKind::Gemini => Arc::new(GeminiAdapter::with_base_url(model, temperature, base_url)),
        AdapterKind::Ollama => Arc::new(OllamaAdapter::with_base_url(model, temperature, base_url)),
    }
}

/// API key from the explicit value, then the backend's own environment
/// variable, then `POIETIC_API_KEY`.
pub fn resolve_api_key(kind: AdapterKind, explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    let candidates: &[&str] = match kind {
        AdapterKind::Anthropic => &["ANTHROPIC_API_KEY"],
        AdapterKind::OpenAi => &["OPENAI_API_KEY"],
        AdapterKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        AdapterKind::Ollama => &[],
    };
    candidates
        .iter()
        .chain(std::iter::once(&"POIETIC_API_KEY"))
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
