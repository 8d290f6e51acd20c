use super::http_client::{build_adapter_client, ensure_success, send_error};
use super::traits::{Adapter, Attachment, Credentials, Prompt, Reply, Usage, flatten};
use crate::error::LlmError;
use crate::parser::Dialect;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const MAX_TOKENS: u32 = 8000;
const MAX_ATTACHMENTS: usize = 4;
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    model: String,
    temperature: f64,
    cached_messages_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<InputBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: Vec<ResponseBlock>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

impl AnthropicAdapter {
    pub fn new(model: Option<&str>, temperature: f64) -> Self {
        Self::with_base_url(model, temperature, None)
    }

    pub fn with_base_url(model: Option<&str>, temperature: f64, base_url: Option<&str>) -> Self {
        let base = base_url
            .map_or("https://api.anthropic.com", |u| u.trim_end_matches('/'))
            .to_string();
        Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            temperature,
            cached_messages_url: format!("{base}/v1/messages"),
            client: build_adapter_client(),
        }
    }

    fn build_request(&self, prompt: &Prompt, attachments: &[Attachment]) -> ChatRequest {
        let (system, task) = match prompt {
            Prompt::Split { instruction, task } => (Some(instruction.clone()), task.clone()),
            Prompt::Single(_) => (None, flatten(prompt)),
        };
        let mut content: Vec<InputBlock> = attachments
            .iter()
            .take(MAX_ATTACHMENTS)
            .map(|a| InputBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: a.media_type.clone(),
                    data: a.data.clone(),
                },
            })
            .collect();
        content.push(InputBlock::Text { text: task });
        ChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![Message {
                role: "user",
                content,
            }],
            temperature: self.temperature,
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
            .post(&self.cached_messages_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
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
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(LlmError::EmptyReply {
                adapter: self.name().to_string(),
            }
            .into());
        }
        let usage = body.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: Some(u.input_tokens),
            output_tokens: Some(u.output_tokens),
        });
        Ok(Reply { text, usage })
    }
}

impl Adapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
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

#[cfg(test)]
mod tests {
    use super::*;

    fn split() -> Prompt {
        Prompt::Split {
            instruction: "paint".into(),
            task: "go".into(),
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let a = AnthropicAdapter::with_base_url(None, 0.8, Some("http://localhost:9000/"));
        assert_eq!(a.cached_messages_url, "http://localhost:9000/v1/messages");
        assert_eq!(a.model, DEFAULT_MODEL);
    }

    #[test]
    fn request_puts_instruction_in_system_and_images_first() {
        let a = AnthropicAdapter::new(Some("claude-test"), 0.5);
        let req = a.build_request(&split(), &[Attachment::png("AAAA")]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["system"], "paint");
        assert_eq!(json["max_tokens"], 8000);
        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[1]["text"], "go");
    }

    #[test]
    fn single_prompt_has_no_system_field() {
        let a = AnthropicAdapter::new(None, 0.5);
        let req = a.build_request(&Prompt::Single("all in one".into()), &[]);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["content"][0]["text"], "all in one");
    }

    #[test]
    fn response_ignores_unknown_blocks() {
        let json = r#"{"content":[{"type":"thinking","thinking":"x"},{"type":"text","text":"pixels: 1,1#ffffff"}],"usage":{"input_tokens":3,"output_tokens":4}}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content.len(), 2);
        assert!(matches!(resp.content[0], ResponseBlock::Unsupported));
    }
}
