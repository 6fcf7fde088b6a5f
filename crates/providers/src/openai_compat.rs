//! OpenAI-compatible provider implementation.
//!
//! Works with: Groq, OpenAI, OpenRouter, Ollama, vLLM, Together AI and any
//! endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Health checks via `/models`

use async_trait::async_trait;
use futures::StreamExt;
use chatptk_core::error::ProviderError;
use chatptk_core::message::Message;
use chatptk_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Capacity of the chunk channel between the SSE reader task and the consumer.
const STREAM_BUFFER: usize = 64;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create a Groq provider (convenience constructor).
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new("groq", "https://api.groq.com/openai/v1", api_key)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    /// Map a non-200 status to the matching error.
    async fn status_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Provider returned error");
                ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                }
            }
        }
    }
}

#[async_trait]
impl chatptk_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status().as_u16() != 200 {
            return Err(Self::status_error(response).await);
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let completion = Completion {
            text: choice.message.content.unwrap_or_default(),
            is_truncated: choice.finish_reason.as_deref() == Some("length"),
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            completion,
            usage,
            model: api_response.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status().as_u16() != 200 {
            return Err(Self::status_error(response).await);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            // Bytes, not text: a UTF-8 character may straddle two network chunks
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                // Process complete lines
                while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw[..line_end]);
                    let line = line.trim_end_matches('\r');

                    match parse_sse_line(line) {
                        SseLine::Skip => {}
                        SseLine::Done => {
                            let _ = tx.send(Ok(final_chunk(None))).await;
                            return;
                        }
                        SseLine::Invalid(data, e) => {
                            warn!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Unparseable SSE chunk"
                            );
                            let _ = tx
                                .send(Err(ProviderError::StreamInterrupted(format!(
                                    "unparseable chunk: {e}"
                                ))))
                                .await;
                            return;
                        }
                        SseLine::Error(message) => {
                            warn!(provider = %provider_name, error = %message, "Provider reported an error mid-stream");
                            let _ = tx
                                .send(Err(ProviderError::StreamInterrupted(message)))
                                .await;
                            return;
                        }
                        SseLine::Data(stream_resp) => {
                            let content = stream_resp
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                                .filter(|c| !c.is_empty());

                            if let Some(content) = content {
                                let chunk = StreamChunk {
                                    content: Some(content),
                                    done: false,
                                    usage: None,
                                };
                                if tx.send(Ok(chunk)).await.is_err() {
                                    debug!(provider = %provider_name, "Stream consumer dropped, stopping");
                                    return;
                                }
                            }

                            // Usage arrives in the last chunk (stream_options)
                            if let Some(usage) = stream_resp.usage {
                                let _ = tx
                                    .send(Ok(final_chunk(Some(Usage {
                                        prompt_tokens: usage.prompt_tokens,
                                        completion_tokens: usage.completion_tokens,
                                        total_tokens: usage.total_tokens,
                                    }))))
                                    .await;
                                return;
                            }
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(final_chunk(None))).await;
        });

        Ok(rx)
    }
}

fn final_chunk(usage: Option<Usage>) -> StreamChunk {
    StreamChunk {
        content: None,
        done: true,
        usage,
    }
}

/// One line of an SSE body, classified.
#[derive(Debug)]
enum SseLine {
    /// Blank line, comment, or a field we don't use
    Skip,
    /// `data: [DONE]`
    Done,
    Data(StreamResponse),
    /// An `{"error": {...}}` event in place of a chunk
    Error(String),
    Invalid(String, serde_json::Error),
}

fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamResponse>(data) {
        Ok(StreamResponse {
            error: Some(error), ..
        }) => SseLine::Error(error.message),
        Ok(resp) => SseLine::Data(resp),
        Err(e) => SseLine::Invalid(data.to_string(), e),
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatptk_core::Provider;

    #[test]
    fn groq_constructor() {
        let provider = OpenAiCompatProvider::groq("gsk-test");
        assert_eq!(provider.name(), "groq");
        assert!(provider.base_url.contains("api.groq.com"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("x", "http://localhost:9/v1/", "k");
        assert_eq!(provider.base_url, "http://localhost:9/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are ChatPTK"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn request_body_includes_optional_fields() {
        let request = ProviderRequest {
            model: "llama-3.1-8b-instant".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.3,
            max_tokens: Some(256),
            stream: true,
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);

        let request = ProviderRequest {
            max_tokens: None,
            ..request
        };
        let body = OpenAiCompatProvider::request_body(&request, false);
        assert!(body.get("max_tokens").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseLine::Data(parsed) => {
                assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn parse_done_and_comments() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseLine::Skip));
        assert!(matches!(parse_sse_line("data: {not json"), SseLine::Invalid(..)));
    }

    #[test]
    fn parse_error_event() {
        let line = r#"data: {"error":{"message":"model overloaded","type":"server_error"}}"#;
        match parse_sse_line(line) {
            SseLine::Error(message) => assert_eq!(message, "model overloaded"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn parse_stream_usage() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match parse_sse_line(line) {
            SseLine::Data(parsed) => {
                let usage = parsed.usage.unwrap();
                assert_eq!(usage.total_tokens, 15);
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn parse_truncated_completion() {
        let data = r#"{"model":"m","choices":[{"message":{"role":"assistant","content":"Partial"},"finish_reason":"length"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("length"));
        assert!(parsed.usage.is_none());
    }

    // --- Live HTTP tests against a local stand-in server ---

    async fn spawn_upstream(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "llama-3.1-8b-instant".into(),
            messages: vec![Message::user("Hello")],
            temperature: 0.5,
            max_tokens: None,
            stream: false,
        }
    }

    #[tokio::test]
    async fn complete_reads_first_choice() {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            axum::routing::post(|| async {
                axum::Json(serde_json::json!({
                    "model": "llama-3.1-8b-instant",
                    "choices": [
                        {"message": {"role": "assistant", "content": "Joyful!"}, "finish_reason": "stop"},
                        {"message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
                    ],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
                }))
            }),
        );
        let provider = OpenAiCompatProvider::new("test", spawn_upstream(router).await, "k");

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.completion.text, "Joyful!");
        assert!(!response.completion.is_truncated);
        assert_eq!(response.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn complete_without_choices_is_error() {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            axum::routing::post(|| async {
                axum::Json(serde_json::json!({"model": "m", "choices": []}))
            }),
        );
        let provider = OpenAiCompatProvider::new("test", spawn_upstream(router).await, "k");

        let err = provider.complete(request()).await.unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }

    #[tokio::test]
    async fn complete_maps_auth_failure() {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            axum::routing::post(|| async { axum::http::StatusCode::UNAUTHORIZED }),
        );
        let provider = OpenAiCompatProvider::new("test", spawn_upstream(router).await, "bad");

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn stream_yields_content_fragments() {
        let body = concat!(
            ": ping\n\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Great \"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"job!\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            axum::routing::post(move || async move {
                ([(axum::http::header::CONTENT_TYPE, "text/event-stream")], body)
            }),
        );
        let provider = OpenAiCompatProvider::new("test", spawn_upstream(router).await, "k");

        let mut rx = provider.stream(request()).await.unwrap();
        let mut text = String::new();
        let mut saw_done = false;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(content) = chunk.content {
                text.push_str(&content);
            }
            saw_done |= chunk.done;
        }
        assert_eq!(text, "Great job!");
        assert!(saw_done);
    }

    async fn collect_stream(body: &'static str) -> (String, Option<ProviderError>) {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            axum::routing::post(move || async move {
                ([(axum::http::header::CONTENT_TYPE, "text/event-stream")], body)
            }),
        );
        let provider = OpenAiCompatProvider::new("test", spawn_upstream(router).await, "k");

        let mut rx = provider.stream(request()).await.unwrap();
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            match chunk {
                Ok(chunk) => text.push_str(chunk.content.as_deref().unwrap_or("")),
                Err(e) => return (text, Some(e)),
            }
        }
        (text, None)
    }

    #[tokio::test]
    async fn stream_error_event_ends_with_error() {
        let (text, err) = collect_stream(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Once \"},\"finish_reason\":null}]}\n\n",
            "data: {\"error\":{\"message\":\"model overloaded\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"never\"},\"finish_reason\":null}]}\n\n",
        ))
        .await;
        assert_eq!(text, "Once ");
        let err = err.expect("error event must surface");
        assert!(matches!(err, ProviderError::StreamInterrupted(ref m) if m.contains("model overloaded")));
    }

    #[tokio::test]
    async fn stream_unparseable_chunk_ends_with_error() {
        let (text, err) = collect_stream("data: {not json\n\ndata: [DONE]\n\n").await;
        assert_eq!(text, "");
        assert!(matches!(err, Some(ProviderError::StreamInterrupted(_))));
    }
}
