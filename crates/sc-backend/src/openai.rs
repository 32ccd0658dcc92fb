//! OpenAI-compatible chat completions client with SSE streaming support.
//!
//! Works against any provider exposing `POST {base}/chat/completions` with
//! `stream: true`: each SSE event carries a JSON chunk whose
//! `choices[0].delta.content` is the next text fragment, and the stream
//! ends with `data: [DONE]`.

use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use sc_protocol::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::source::{BackendError, CompletionSource, TextStream};
use crate::sse::{parse_sse_stream, SseEvent};

const DONE_MARKER: &str = "[DONE]";

/// OpenAI-compatible API client.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    http: Client,
}

/// Build an HTTP client for long-lived streaming responses.
///
/// No overall request timeout: a completion may legitimately stream for
/// minutes. Only connection establishment is bounded.
fn build_http_client() -> Result<Client, BackendError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()?;
    Ok(client)
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            http: build_http_client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The completions endpoint under the configured base URL.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Send a conversation and return a stream of text fragments.
    pub fn send(
        &self,
        messages: &[Message],
    ) -> impl Stream<Item = Result<String, BackendError>> + Send + 'static {
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let url = self.endpoint();
        let body = ApiRequest {
            model: self.model.clone(),
            messages: build_messages(messages),
            stream: true,
        };

        stream! {
            let response = match send_request(&http, &url, &api_key, &body).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut sse_stream = parse_sse_stream(response.bytes_stream());
            while let Some(result) = sse_stream.next().await {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(BackendError::Http(e));
                        return;
                    }
                };

                match parse_chunk(&event) {
                    Ok(ChunkOutcome::Text(text)) => {
                        yield Ok(text);
                    }
                    Ok(ChunkOutcome::Skip) => {}
                    Ok(ChunkOutcome::Done) => return,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
    }
}

impl CompletionSource for OpenAiClient {
    fn stream(&self, messages: &[Message]) -> TextStream {
        self.send(messages).boxed()
    }
}

async fn send_request(
    http: &Client,
    url: &str,
    api_key: &str,
    body: &ApiRequest,
) -> Result<reqwest::Response, BackendError> {
    let response = http
        .post(url)
        .bearer_auth(api_key)
        .header("accept", "text/event-stream")
        .json(body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Api(format!("{status}: {body}")));
    }

    Ok(response)
}

fn build_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|msg| ApiMessage {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: msg.content.clone(),
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum ChunkOutcome {
    Text(String),
    /// Role-only, finish-reason and unparseable chunks.
    Skip,
    Done,
}

fn parse_chunk(event: &SseEvent) -> Result<ChunkOutcome, BackendError> {
    if event.data.trim() == DONE_MARKER {
        return Ok(ChunkOutcome::Done);
    }

    let chunk: ApiChunk = match serde_json::from_str(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable upstream chunk");
            return Ok(ChunkOutcome::Skip);
        }
    };

    if let Some(error) = chunk.error {
        return Err(BackendError::Api(error.message));
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    if text.is_empty() {
        Ok(ChunkOutcome::Skip)
    } else {
        Ok(ChunkOutcome::Text(text))
    }
}

// API request/response types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiChunk {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    delta: ApiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(payload: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: payload.to_string(),
        }
    }

    #[test]
    fn build_messages_maps_roles() {
        let messages = build_messages(&[Message::user("hi"), Message::assistant("hello")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, "assistant");
    }

    #[test]
    fn request_serialization_enables_streaming() {
        let request = ApiRequest {
            model: "gpt-4o-mini".to_string(),
            messages: build_messages(&[Message::user("hi")]),
            stream: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = OpenAiClient::new("k", "https://api.example.com/v1/", "m").unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
        let client = OpenAiClient::new("k", "http://localhost:11434/v1", "m").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(client.model(), "m");
    }

    #[test]
    fn chunk_with_content() {
        let event = data(r#"{"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#);
        assert_eq!(
            parse_chunk(&event).unwrap(),
            ChunkOutcome::Text("Hel".to_string())
        );
    }

    #[test]
    fn role_only_chunk_is_skipped() {
        let event = data(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#);
        assert_eq!(parse_chunk(&event).unwrap(), ChunkOutcome::Skip);
    }

    #[test]
    fn finish_chunk_is_skipped() {
        let event = data(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#);
        assert_eq!(parse_chunk(&event).unwrap(), ChunkOutcome::Skip);
    }

    #[test]
    fn empty_choices_are_skipped() {
        let event = data(r#"{"choices":[],"usage":{"total_tokens":12}}"#);
        assert_eq!(parse_chunk(&event).unwrap(), ChunkOutcome::Skip);
    }

    #[test]
    fn done_marker() {
        assert_eq!(parse_chunk(&data("[DONE]")).unwrap(), ChunkOutcome::Done);
    }

    #[test]
    fn error_payload_is_a_failure() {
        let event = data(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#);
        match parse_chunk(&event) {
            Err(BackendError::Api(msg)) => assert_eq!(msg, "Rate limit reached"),
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_skipped() {
        assert_eq!(parse_chunk(&data("not json")).unwrap(), ChunkOutcome::Skip);
    }
}
