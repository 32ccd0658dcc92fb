//! The seam between the relay and whatever produces completion text.

use futures::stream::BoxStream;
use sc_protocol::Message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(String),
}

/// Ordered text chunks of one completion. The stream ends by exhaustion
/// or after yielding a single `Err`.
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

/// A provider able to stream a completion for a conversation.
pub trait CompletionSource: Send + Sync {
    /// Open a streamed completion. Opening failures surface as the first
    /// item of the returned stream.
    fn stream(&self, messages: &[Message]) -> TextStream;
}
