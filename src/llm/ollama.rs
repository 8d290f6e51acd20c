use super::http_client::{build_adapter_client_with_timeout, ensure_success, send_error};
use super::traits::{Adapter, Attachment, Credentials, Prompt, Reply, Usage, flatten};
use crate::error::LlmError;
use crate::parser::Dialect;
use crate::prompt::RenderedPrompt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub const DEFAULT_MODEL: &str = "llava:7b";
const MAX_TOKENS: u32 = 4000;
/// Local vision models are slow; give them longer than hosted APIs.
const TIMEOUT_SECS: u64 = 300;

/// LLaVA through a local Ollama server.
///
/// Takes one image per request: when handed several, only the LAST one is
/// sent. Replies in the text dialect.
pub struct OllamaAdapter {
    model: String,
    temperature: f64,
    cached_chat_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaAdapter {
    pub fn new(model: Option<&str>, temperature: f64) -> Self {
        Self::with_base_url(model, temperature, None)
    }

    pub fn with_base_url(model: Option<&str>, temperature: f64, base_url: Option<&str>) -> Self {
        let base = base_url
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/');
        Self {
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            temperature,
            cached_chat_url: format!("{base}/api/chat"),
            client: build_adapter_client_with_timeout(TIMEOUT_SECS),
        }
    }

    fn build_request(&self, prompt: &Prompt, attachments: &[Attachment]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: flatten(prompt),
                images: attachments.last().map(|a| a.data.clone()).into_iter().collect(),
            }],
            stream: false,
            options: Options {
                temperature: self.temperature,
                num_predict: MAX_TOKENS,
            },
        }
    }

    async fn call_api(&self, prompt: &Prompt, attachments: &[Attachment]) -> anyhow::Result<Reply> {
        if attachments.len() > 1 {
            tracing::debug!(
                given = attachments.len(),
                "ollama keeps only the last attachment"
            );
        }
        let request = self.build_request(prompt, attachments);
        let response = self
            .client
            .post(&self.cached_chat_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(self.name(), &e))?;
        let response = ensure_success(self.name(), response).await?;
        let body: ChatResponse = response.json().await.map_err(|e| LlmError::Request {
            adapter: self.name().to_string(),
            message: format!("unreadable response: {e}"),
        })?;
        if body.message.content.trim().is_empty() {
            return Err(LlmError::EmptyReply {
                adapter: self.name().to_string(),
            }
            .into());
        }
        Ok(Reply {
            text: body.message.content,
            usage: Usage {
                input_tokens: body.prompt_eval_count,
                output_tokens: body.eval_count,
            },
        })
    }
}

impl Adapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Text
    }

    fn max_attachments(&self) -> usize {
        1
    }

    fn max_tokens(&self) -> u32 {
        MAX_TOKENS
    }

    fn build_prompt(&self, rendered: &RenderedPrompt) -> Prompt {
        Prompt::Single(format!(
            "<<INSTRUCTIONS>>\n{}\n<</INSTRUCTIONS>>\n\n<<CONTEXT>>\n{}\n<</CONTEXT>>",
            rendered.instruction, rendered.task
        ))
    }

    fn invoke<'a>(
        &'a self,
        _credentials: &'a Credentials,
        prompt: &'a Prompt,
        attachments: &'a [Attachment],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Reply>> + Send + 'a>> {
        Box::pin(self.call_api(prompt, attachments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptKind;

    #[test]
    fn default_url() {
        let a = OllamaAdapter::new(None, 0.8);
        assert_eq!(a.cached_chat_url, "http://localhost:11434/api/chat");
        assert_eq!(a.model, DEFAULT_MODEL);
    }

    #[test]
    fn custom_url_trailing_slash() {
        let a = OllamaAdapter::with_base_url(None, 0.8, Some("http://192.168.1.100:11434/"));
        assert_eq!(a.cached_chat_url, "http://192.168.1.100:11434/api/chat");
    }

    #[test]
    fn prompt_is_wrapped_in_markers() {
        let a = OllamaAdapter::new(None, 0.8);
        let rendered = RenderedPrompt {
            instruction: "paint".into(),
            task: "now".into(),
            kind: PromptKind::Seed,
            wants_attachments: false,
        };
        assert_eq!(
            a.build_prompt(&rendered),
            Prompt::Single(
                "<<INSTRUCTIONS>>\npaint\n<</INSTRUCTIONS>>\n\n<<CONTEXT>>\nnow\n<</CONTEXT>>".into()
            )
        );
    }

    #[test]
    fn only_the_last_attachment_is_sent() {
        let a = OllamaAdapter::new(None, 0.8);
        let req = a.build_request(
            &Prompt::Single("x".into()),
            &[Attachment::png("first"), Attachment::png("last")],
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["images"], serde_json::json!(["last"]));
        assert_eq!(json["options"]["num_predict"], 4000);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn no_attachment_omits_images() {
        let a = OllamaAdapter::new(None, 0.8);
        let json = serde_json::to_value(a.build_request(&Prompt::Single("x".into()), &[])).unwrap();
        assert!(json["messages"][0].get("images").is_none());
    }
}
