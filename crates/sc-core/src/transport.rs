//! Client side of the relay connection.
//!
//! `ChatClient` posts a conversation to the relay and turns the response
//! body into a stream of [`TurnUpdate`]s. Every turn stream ends with
//! exactly one terminal event: failures that happen on this side of the
//! wire (no connection, bad status, idle timeout, truncated body) are
//! reported as a locally synthesized `Error`.

use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use sc_protocol::{decode_line, ChatRequest, LineFramer, WireEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no data from relay for {0:?}")]
    Timeout(Duration),

    #[error("connection closed before the reply finished")]
    Truncated,
}

/// What the transport reports while a turn is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// The relay accepted the request and the body is arriving.
    Receiving,
    Event(WireEvent),
}

impl TurnUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnUpdate::Event(event) if event.is_terminal())
    }
}

/// Decode a raw response body into wire events.
///
/// Lines are framed at the byte level, so reads may split a frame or a
/// UTF-8 sequence anywhere. Non-data lines are ignored and malformed frames
/// are skipped. The stream stops after the first terminal event; a body
/// that ends before one yields [`ClientError::Truncated`].
pub fn decode_frames<S, E>(
    body: S,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<WireEvent, ClientError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    stream! {
        let mut body = Box::pin(body);
        let mut framer = LineFramer::new();

        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(ClientError::Timeout(limit));
                        return;
                    }
                },
                None => body.next().await,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                None => {
                    if framer.pending() > 0 {
                        tracing::debug!(bytes = framer.pending(), "dropping incomplete final line");
                    }
                    yield Err(ClientError::Truncated);
                    return;
                }
            };

            for line in framer.push(&chunk) {
                match decode_line(&line) {
                    Ok(Some(event)) => {
                        let terminal = event.is_terminal();
                        yield Ok(event);
                        if terminal {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, %line, "skipping malformed frame");
                    }
                }
            }
        }
    }
}

/// HTTP client for the relay's chat endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    url: String,
    idle_timeout: Option<Duration>,
}

impl ChatClient {
    pub fn new(url: impl Into<String>, idle_timeout: Option<Duration>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            idle_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self, request: &ChatRequest) -> Result<reqwest::Response, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }

    /// Run one turn. The stream always ends with a terminal event.
    pub fn turn(&self, request: ChatRequest) -> impl Stream<Item = TurnUpdate> + Send + 'static {
        let client = self.clone();

        stream! {
            let response = match client.open(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, url = %client.url, "relay request failed");
                    yield TurnUpdate::Event(WireEvent::Error(e.to_string()));
                    return;
                }
            };
            yield TurnUpdate::Receiving;

            let events = decode_frames(response.bytes_stream(), client.idle_timeout);
            futures::pin_mut!(events);
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        yield TurnUpdate::Event(event);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "relay stream failed");
                        yield TurnUpdate::Event(WireEvent::Error(e.to_string()));
                    }
                }
            }
        }
    }
}
