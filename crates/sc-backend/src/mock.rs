//! Mock completion source for testing.
//!
//! Produces the same item sequence as the real OpenAI-compatible client,
//! allowing tests at every layer to use the mock instead of real HTTP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use sc_protocol::Message;
use tokio::time::sleep;

use crate::source::{BackendError, CompletionSource, TextStream};

/// Configurable mock responses for testing.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Emit a text chunk. Empty chunks are passed through as-is.
    Text { content: String },
    /// Fail the stream. Nothing is emitted afterwards.
    Error { message: String },
    /// Delay before next response (for timing tests).
    Delay { ms: u64 },
}

/// Configuration for mock stream.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Sequence of responses to emit.
    pub responses: Vec<MockResponse>,
    /// Optional delay between each response (ms).
    pub chunk_delay_ms: Option<u64>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_chunk_delay(mut self, ms: u64) -> Self {
        self.chunk_delay_ms = Some(ms);
        self
    }
}

/// Create a stream of text chunks from mock config.
pub fn mock_stream(config: MockConfig) -> impl Stream<Item = Result<String, BackendError>> {
    stream! {
        for response in config.responses {
            if let Some(delay_ms) = config.chunk_delay_ms {
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match response {
                MockResponse::Text { content } => {
                    yield Ok(content);
                }
                MockResponse::Error { message } => {
                    yield Err(BackendError::Api(message));
                    return;
                }
                MockResponse::Delay { ms } => {
                    sleep(Duration::from_millis(ms)).await;
                }
            }
        }
    }
}

/// A `CompletionSource` that replays a fixed script and records every
/// conversation it was asked to complete.
#[derive(Clone, Default)]
pub struct MockSource {
    config: MockConfig,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockSource {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            requests: Arc::default(),
        }
    }

    /// Conversations received so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl CompletionSource for MockSource {
    fn stream(&self, messages: &[Message]) -> TextStream {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        mock_stream(self.config.clone()).boxed()
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// Stream text in the given chunks.
    pub fn streaming_text(chunks: &[&str]) -> MockConfig {
        let responses = chunks
            .iter()
            .map(|chunk| MockResponse::Text {
                content: (*chunk).to_string(),
            })
            .collect();

        MockConfig::new().with_responses(responses)
    }

    /// A fenced code block split so the fence is open after the first chunk.
    pub fn split_code_fence(lang: &str, code: &str) -> MockConfig {
        streaming_text(&[&format!("```{lang}\n{code}"), "\n```"])
    }

    /// Reasoning wrapped in think tags, closed in the second chunk.
    pub fn think_then_answer(reasoning: &str, answer: &str) -> MockConfig {
        streaming_text(&[
            &format!("<think>{reasoning}"),
            &format!("</think>{answer}"),
        ])
    }

    /// Fail before any text is produced.
    pub fn fail_immediately(error: &str) -> MockConfig {
        MockConfig::new().with_responses(vec![MockResponse::Error {
            message: error.to_string(),
        }])
    }

    /// Emit some text, then fail.
    pub fn error_mid_stream(text_before: &str, error: &str) -> MockConfig {
        MockConfig::new().with_responses(vec![
            MockResponse::Text {
                content: text_before.to_string(),
            },
            MockResponse::Error {
                message: error.to_string(),
            },
        ])
    }
}
