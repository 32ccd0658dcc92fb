//! The `/api/chat` endpoint and the chunk-to-frame relay loop.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use sc_backend::CompletionSource;
use sc_protocol::{ChatRequest, Message, WireEvent};
use warp::http::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use warp::http::{Method, StatusCode};
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Reply};

/// What the client sees when the upstream call fails. The real cause is
/// only logged.
pub const GENERIC_ERROR: &str = "An error occurred while generating the response.";

/// Largest request body the relay will buffer.
pub const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Turn an upstream completion into wire events.
///
/// One `Delta` per non-empty chunk, in arrival order, then `Done`. The first
/// upstream failure becomes a single `Error` and ends the stream.
pub fn relay_events(
    source: &dyn CompletionSource,
    messages: &[Message],
) -> impl Stream<Item = WireEvent> + Send + 'static {
    let mut upstream = source.stream(messages);

    stream! {
        while let Some(item) = upstream.next().await {
            match item {
                Ok(text) if text.is_empty() => {}
                Ok(text) => {
                    yield WireEvent::Delta(text);
                }
                Err(e) => {
                    tracing::error!(error = %e, "upstream completion failed");
                    yield WireEvent::Error(GENERIC_ERROR.to_string());
                    return;
                }
            }
        }
        yield WireEvent::Done;
    }
}

fn with_source(
    source: Arc<dyn CompletionSource>,
) -> impl Filter<Extract = (Arc<dyn CompletionSource>,), Error = Infallible> + Clone {
    warp::any().map(move || source.clone())
}

/// All relay routes: `/api/chat` and `/healthz`.
pub fn routes(
    source: Arc<dyn CompletionSource>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let health = warp::path!("healthz")
        .and(warp::get())
        .map(|| "ok".into_response());

    let post = warp::post()
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_source(source))
        .map(handle_chat);

    // Any other method is answered before the body is read.
    let other = warp::method().and_then(|method: Method| async move {
        if method == Method::POST {
            Err(warp::reject::not_found())
        } else {
            Ok(method_not_allowed())
        }
    });

    let chat = warp::path!("api" / "chat").and(post.or(other).unify());

    health.or(chat).unify()
}

fn handle_chat(body: Bytes, source: Arc<dyn CompletionSource>) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed chat request");
            return bad_request(&format!("invalid request body: {e}"));
        }
    };
    if request.messages.is_empty() {
        return bad_request("messages must not be empty");
    }

    tracing::info!(messages = request.messages.len(), "relaying chat completion");

    let frames = relay_events(source.as_ref(), &request.messages)
        .map(|event| Ok::<_, Infallible>(Bytes::from(event.to_frame())));
    event_stream_response(Body::wrap_stream(frames))
}

fn event_stream_response(body: Body) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    // Keeps reverse proxies from buffering the stream
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

fn method_not_allowed() -> Response {
    let mut response =
        warp::reply::with_status("method not allowed", StatusCode::METHOD_NOT_ALLOWED)
            .into_response();
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("POST"));
    response
}

fn bad_request(message: &str) -> Response {
    warp::reply::with_status(message.to_string(), StatusCode::BAD_REQUEST).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_backend::mock::{fixtures, MockConfig, MockResponse, MockSource};

    async fn events(config: MockConfig) -> Vec<WireEvent> {
        let source = MockSource::new(config);
        relay_events(&source, &[Message::user("hi")]).collect().await
    }

    #[tokio::test]
    async fn one_delta_per_chunk_then_done() {
        let events = events(fixtures::streaming_text(&["Hel", "lo wor", "ld"])).await;
        assert_eq!(
            events,
            vec![
                WireEvent::Delta("Hel".to_string()),
                WireEvent::Delta("lo wor".to_string()),
                WireEvent::Delta("ld".to_string()),
                WireEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn adjacent_chunks_are_not_coalesced() {
        let events = events(fixtures::streaming_text(&["a", "b", "c"])).await;
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn empty_chunks_are_skipped() {
        let events = events(fixtures::streaming_text(&["", "x", ""])).await;
        assert_eq!(
            events,
            vec![WireEvent::Delta("x".to_string()), WireEvent::Done]
        );
    }

    #[tokio::test]
    async fn failure_is_generic_and_terminal() {
        let events = events(fixtures::error_mid_stream("partial", "upstream 500: secret")).await;
        assert_eq!(
            events,
            vec![
                WireEvent::Delta("partial".to_string()),
                WireEvent::Error(GENERIC_ERROR.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn exactly_one_terminal_event_last() {
        let config = MockConfig::new().with_responses(vec![
            MockResponse::Text {
                content: "x".to_string(),
            },
            MockResponse::Error {
                message: "boom".to_string(),
            },
        ]);
        let events = events(config).await;
        let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminals.len(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn open_failure_before_any_text() {
        let events = events(fixtures::fail_immediately("connection refused")).await;
        assert_eq!(events, vec![WireEvent::Error(GENERIC_ERROR.to_string())]);
    }
}
