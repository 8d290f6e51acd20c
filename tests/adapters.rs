use poietic_agent::agent::{FailureKind, classify};
use poietic_agent::error::LlmError;
use poietic_agent::llm::{
    Adapter, AnthropicAdapter, Credentials, GeminiAdapter, OllamaAdapter, OpenAiAdapter, Prompt,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prompt() -> Prompt {
    Prompt::Split {
        instruction: "You paint a 20x20 grid.".into(),
        task: "Please provide your grid recommendation".into(),
    }
}

fn key() -> Credentials {
    Credentials::new(Some("test-key"))
}

#[tokio::test]
async fn openai_reply_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"pixels\":[{\"x\":1,\"y\":1,\"color\":\"#ff0000\"}]}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let reply = adapter.invoke(&key(), &prompt(), &[]).await.unwrap();

    assert_eq!(reply.usage.total(), Some(150));
    let parsed = adapter.parse_reply(&reply.text, &mut rand::rng());
    assert_eq!(parsed.commands().len(), 1);
}

#[tokio::test]
async fn anthropic_sends_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "pixels: 2,2#00ff00"}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let reply = adapter.invoke(&key(), &prompt(), &[]).await.unwrap();
    assert_eq!(reply.text, "pixels: 2,2#00ff00");
    assert_eq!(reply.usage.total(), Some(15));
}

#[tokio::test]
async fn gemini_passes_key_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "pixels: 3,3#0000ff"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = GeminiAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let reply = adapter.invoke(&key(), &prompt(), &[]).await.unwrap();
    assert_eq!(reply.text, "pixels: 3,3#0000ff");
}

#[tokio::test]
async fn ollama_needs_no_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"content": "pixels: 4,4#ffff00"},
            "prompt_eval_count": 40,
            "eval_count": 8
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OllamaAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let reply = adapter
        .invoke(&Credentials::default(), &prompt(), &[])
        .await
        .unwrap();
    assert_eq!(reply.usage.total(), Some(48));
}

#[tokio::test]
async fn too_many_requests_classifies_as_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "90")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let err = adapter.invoke(&key(), &prompt(), &[]).await.unwrap_err();
    assert_eq!(
        classify(&err),
        FailureKind::RateLimited {
            retry_after: Some(Duration::from_secs(90))
        }
    );
}

#[tokio::test]
async fn gateway_timeout_classifies_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let adapter = AnthropicAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let err = adapter.invoke(&key(), &prompt(), &[]).await.unwrap_err();
    assert_eq!(classify(&err), FailureKind::Timeout);
}

#[tokio::test]
async fn server_errors_classify_as_other_and_hide_secrets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("boom: key sk-abcdefghijklmnopqrstuvwxyz012345"),
        )
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let err = adapter.invoke(&key(), &prompt(), &[]).await.unwrap_err();
    assert_eq!(classify(&err), FailureKind::Other);
    assert!(!format!("{err:#}").contains("sk-abcdefghijklmnopqrstuvwxyz012345"));
}

#[tokio::test]
async fn missing_key_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let err = adapter
        .invoke(&Credentials::default(), &prompt(), &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LlmError>(),
        Some(LlmError::Auth { .. })
    ));
}

#[tokio::test]
async fn blank_reply_is_an_empty_reply_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "   "}}]
        })))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::with_base_url(None, 0.7, Some(&server.uri()));
    let err = adapter.invoke(&key(), &prompt(), &[]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LlmError>(),
        Some(LlmError::EmptyReply { .. })
    ));
}
