use crate::parser::{Dialect, Extractor, ParseResult};
use crate::prompt::RenderedPrompt;
use rand::RngCore;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Prompt as a backend expects it: one message, or instruction and task in
/// separate roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Single(String),
    Split { instruction: String, task: String },
}

impl Prompt {
    /// Everything the model will read, for logs and token estimates.
    pub fn text_len(&self) -> usize {
        match self {
            Self::Single(text) => text.len(),
            Self::Split { instruction, task } => instruction.len() + task.len(),
        }
    }
}

/// Secrets for one invocation.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// An image sent alongside the prompt, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub media_type: String,
    pub data: String,
}

impl Attachment {
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            media_type: "image/png".to_string(),
            data: data.into(),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl Usage {
    pub fn total(&self) -> Option<u64> {
        match (self.input_tokens, self.output_tokens) {
            (None, None) => None,
            (i, o) => Some(i.unwrap_or(0) + o.unwrap_or(0)),
        }
    }
}

/// Raw model output plus whatever usage counters the backend reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub usage: Usage,
}

/// One generative backend.
///
/// The control loop only ever calls these three operations; wire details,
/// attachment limits and token budgets stay inside the implementation.
/// `invoke` failures carry an [`crate::error::LlmError`] where the cause
/// is known so callers can classify them.
pub trait Adapter: Send + Sync {
    /// Adapter identifier (e.g. "anthropic", "ollama").
    fn name(&self) -> &str;

    /// Reply encoding this backend is asked to produce.
    fn dialect(&self) -> Dialect;

    /// How many images one request may carry.
    fn max_attachments(&self) -> usize;

    /// Output token budget per request.
    fn max_tokens(&self) -> u32;

    /// Shape the rendered prompt for this backend. Role-split by default.
    fn build_prompt(&self, rendered: &RenderedPrompt) -> Prompt {
        Prompt::Split {
            instruction: rendered.instruction.clone(),
            task: rendered.task.clone(),
        }
    }

    fn invoke<'a>(
        &'a self,
        credentials: &'a Credentials,
        prompt: &'a Prompt,
        attachments: &'a [Attachment],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Reply>> + Send + 'a>>;

    /// Turn reply text into pixel commands.
    fn parse_reply(&self, raw: &str, rng: &mut dyn RngCore) -> ParseResult {
        Extractor::new(self.dialect()).extract(raw, rng)
    }
}

/// Join a split prompt for single-message backends.
pub fn flatten(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Single(text) => text.clone(),
        Prompt::Split { instruction, task } => format!("{instruction}\n\n{task}"),
    }
}
