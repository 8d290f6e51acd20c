//! Google Gemini `generateContent` adapter.
//!
//! Gemini gets the whole prompt as one user message with images inlined
//! after the text, and answers in the JSON dialect.

use super::http_client::{build_adapter_client, ensure_success, send_error};
use super::traits::{Adapter, Attachment, Credentials, Prompt, Reply, Usage, flatten};
use crate::error::LlmError;
use crate::parser::Dialect;
use crate::prompt::RenderedPrompt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const MAX_TOKENS: u32 = 20_000;
const MAX_ATTACHMENTS: usize = 8;

pub struct GeminiAdapter {
    model: String,
    temperature: f64,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

impl GeminiAdapter {
    pub fn new(model: Option<&str>, temperature: f64) -> Self {
        Self::with_base_url(model, temperature, None)
    }

    pub fn with_base_url(model: Option<&str>, temperature: f64, base_url: Option<&str>) -> Self {
        Self {
            model: model
                .unwrap_or(DEFAULT_MODEL)
                .trim_start_matches("models/")
                .to_string(),
            temperature,
            base_url: base_url
                .map_or("https://generativelanguage.googleapis.com", |u| {
                    u.trim_end_matches('/')
                })
                .to_string(),
            client: build_adapter_client(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, prompt: &Prompt, attachments: &[Attachment]) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: flatten(prompt),
        }];
        parts.extend(attachments.iter().take(MAX_ATTACHMENTS).map(|a| Part::Inline {
            inline_data: InlineData {
                mime_type: a.media_type.clone(),
                data: a.data.clone(),
            },
        }));
        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: MAX_TOKENS,
            },
        }
    }

    fn extract_text(response: GenerateContentResponse) -> Option<String> {
        let text = response
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<String>();
        (!text.trim().is_empty()).then_some(text)
    }

    async fn call_api(
        &self,
        credentials: &Credentials,
        prompt: &Prompt,
        attachments: &[Attachment],
    ) -> anyhow::Result<Reply> {
        let api_key = credentials.api_key.as_deref().ok_or_else(|| LlmError::Auth {
            adapter: self.name().to_string(),
        })?;
        let request = self.build_request(prompt, attachments);
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(self.name(), &e))?;
        let response = ensure_success(self.name(), response).await?;
        let body: GenerateContentResponse =
            response.json().await.map_err(|e| LlmError::Request {
                adapter: self.name().to_string(),
                message: format!("unreadable response: {e}"),
            })?;

        let usage = body.usage_metadata.as_ref().map_or_else(Usage::default, |u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });
        let text = Self::extract_text(body).ok_or_else(|| LlmError::EmptyReply {
            adapter: self.name().to_string(),
        })?;
        Ok(Reply { text, usage })
    }
}

impl Adapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Json
    }

    fn max_attachments(&self) -> usize {
        MAX_ATTACHMENTS
    }

    fn max_tokens(&self) -> u32 {
        MAX_TOKENS
    }

    fn build_prompt(&self, rendered: &RenderedPrompt) -> Prompt {
        Prompt::Single(format!("{}\n\n{}", rendered.instruction, rendered.task))
    }

    fn invoke<'a>(
        &'a self,
        credentials: &'a Credentials,
        prompt: &'a Prompt,
        attachments: &'a [Attachment],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Reply>> + Send + 'a>> {
        Box::pin(self.call_api(credentials, prompt, attachments))
    }
}
