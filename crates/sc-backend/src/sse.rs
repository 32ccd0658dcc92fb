//! Server-Sent Events (SSE) stream parser.
//!
//! Parses an upstream byte stream into SSE events according to the W3C
//! specification. Line splitting happens on raw bytes, so a multi-byte
//! character split across two network reads is decoded intact.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use sc_protocol::LineFramer;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (from `event:` field). None if not specified.
    pub event_type: Option<String>,
    /// The event data (from `data:` field(s)).
    pub data: String,
}

/// Accumulates fields of the event currently being read.
#[derive(Default)]
struct EventBuilder {
    event_type: Option<String>,
    data: Vec<String>,
}

impl EventBuilder {
    /// Process a complete line. Returns an event if one is complete.
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        // Blank line dispatches the pending event
        if line.is_empty() {
            return self.take();
        }

        // Lines without a colon are invalid, comments start with one
        let (field, value) = line.split_once(':')?;
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id, retry and comments
            _ => {}
        }
        None
    }

    fn take(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event_type = None;
            return None;
        }
        let event = SseEvent {
            event_type: self.event_type.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(event)
    }
}

/// Stream wrapper that parses SSE events from a byte stream.
pub struct SseStream<S> {
    inner: S,
    framer: LineFramer,
    builder: EventBuilder,
    pending: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            framer: LineFramer::new(),
            builder: EventBuilder::default(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    for line in this.framer.push(&bytes) {
                        if let Some(event) = this.builder.process_line(&line) {
                            this.pending.push_back(event);
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    // Flush a trailing line and event that never saw a blank line
                    this.finished = true;
                    if let Some(line) = this.framer.finish() {
                        if let Some(event) = this.builder.process_line(&line) {
                            this.pending.push_back(event);
                        }
                    }
                    if let Some(event) = this.builder.take() {
                        this.pending.push_back(event);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Create an SSE stream from a byte stream.
pub fn parse_sse_stream<S, E>(stream: S) -> SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    SseStream::new(stream)
}
