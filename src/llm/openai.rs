use super::http_client::{build_adapter_client, ensure_success, send_error};
use super::traits::{Adapter, Attachment, Credentials, Prompt, Reply, Usage};
use crate::error::LlmError;
use crate::parser::Dialect;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 4096;
const MAX_ATTACHMENTS: usize = 4;

pub struct OpenAiAdapter {
    model: String,
    temperature: f64,
    cached_chat_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<Part>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl OpenAiAdapter {
    pub fn new(model: Option<&str>, temperature: f64) -> Self {
        Self::with_base_url(model, temperature, None)
    }

    pub fn with_base_url(model: Option<&str>, temperature: f64, base_url: Option<&str>) -> Self {
        let base = base_url
            .map_or("https://api.openai.com", |u| u.trim_end_matches('/'))
            .to_string();
        let cached_chat_url = if base.contains("chat/completions") {
            base
        } else {
            format!("{base}/v1/chat/completions")
        };
        Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            temperature,
            cached_chat_url,
            client: build_adapter_client(),
        }
    }

    fn build_request(&self, prompt: &Prompt, attachments: &[Attachment]) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        let task = match prompt {
            Prompt::Split { instruction, task } => {
                messages.push(Message {
                    role: "system",
                    content: MessageContent::Text(instruction.clone()),
                });
                task.clone()
            }
            Prompt::Single(text) => text.clone(),
        };
        let content = if attachments.is_empty() {
            MessageContent::Text(task)
        } else {
            let mut parts = vec![Part::Text { text: task }];
            parts.extend(attachments.iter().take(MAX_ATTACHMENTS).map(|a| Part::ImageUrl {
                image_url: ImageUrl { url: a.data_url() },
            }));
            MessageContent::Parts(parts)
        };
        messages.push(Message {
            role: "user",
            content,
        });
        ChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            messages,
        }
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
            .post(&self.cached_chat_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(self.name(), &e))?;
        let response = ensure_success(self.name(), response).await?;
        let body: ChatResponse = response.json().await.map_err(|e| LlmError::Request {
            adapter: self.name().to_string(),
            message: format!("unreadable response: {e}"),
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyReply {
                adapter: self.name().to_string(),
            })?;
        let usage = body.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        Ok(Reply { text, usage })
    }
}

impl Adapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
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

    fn invoke<'a>(
        &'a self,
        credentials: &'a Credentials,
        prompt: &'a Prompt,
        attachments: &'a [Attachment],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Reply>> + Send + 'a>> {
        Box::pin(self.call_api(credentials, prompt, attachments))
    }
}
