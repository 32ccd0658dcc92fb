//! Wire events streamed from the relay and their frame encoding.
//!
//! Every event travels as a single `data:` line followed by a blank line:
//!
//! ```text
//! data: {"delta": "Hel"}
//!
//! data: {"error": "upstream failed"}
//!
//! data: [DONE]
//! ```

use serde::Deserialize;
use thiserror::Error;

/// The end-of-stream sentinel carried by the `Done` frame.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_FIELD: &str = "data:";

/// Events carried from the relay to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// A non-empty fragment of assistant output.
    Delta(String),

    /// The stream completed successfully. Nothing follows.
    Done,

    /// The turn failed. Nothing follows.
    Error(String),
}

impl WireEvent {
    /// Whether no further events can follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }

    /// Encode as a complete frame, including the blank-line terminator.
    pub fn to_frame(&self) -> String {
        let payload = match self {
            Self::Delta(text) => serde_json::json!({ "delta": text }).to_string(),
            Self::Error(message) => serde_json::json!({ "error": message }).to_string(),
            Self::Done => DONE_SENTINEL.to_string(),
        };
        format!("{DATA_FIELD} {payload}\n\n")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed frame payload: {0}")]
    Json(String),
    #[error("frame carries neither `delta` nor `error`")]
    Empty,
}

#[derive(Deserialize)]
struct FramePayload {
    delta: Option<String>,
    error: Option<String>,
}

/// Decode one complete line of the event stream.
///
/// Returns `Ok(None)` for anything that is not a data frame (blank
/// separators, `:` keepalive comments, other SSE fields) and for deltas
/// with no text. `error` wins when a payload carries both fields.
pub fn decode_line(line: &str) -> Result<Option<WireEvent>, FrameError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(rest) = line.strip_prefix(DATA_FIELD) else {
        return Ok(None);
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    if payload.trim() == DONE_SENTINEL {
        return Ok(Some(WireEvent::Done));
    }

    let frame: FramePayload =
        serde_json::from_str(payload).map_err(|e| FrameError::Json(e.to_string()))?;

    match (frame.error, frame.delta) {
        (Some(message), _) => Ok(Some(WireEvent::Error(message))),
        (None, Some(text)) if text.is_empty() => Ok(None),
        (None, Some(text)) => Ok(Some(WireEvent::Delta(text))),
        (None, None) => Err(FrameError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_frame_format() {
        let frame = WireEvent::Delta("Hel".to_string()).to_frame();
        assert_eq!(frame, "data: {\"delta\":\"Hel\"}\n\n");
    }

    #[test]
    fn error_frame_format() {
        let frame = WireEvent::Error("boom".to_string()).to_frame();
        assert_eq!(frame, "data: {\"error\":\"boom\"}\n\n");
    }

    #[test]
    fn done_frame_format() {
        assert_eq!(WireEvent::Done.to_frame(), "data: [DONE]\n\n");
    }

    #[test]
    fn delta_escapes_newlines_and_quotes() {
        let frame = WireEvent::Delta("```py\n\"x\"".to_string()).to_frame();
        // The frame itself must stay on one line
        assert_eq!(frame.matches('\n').count(), 2);
        assert!(frame.ends_with("\n\n"));
        let line = frame.trim_end();
        assert_eq!(
            decode_line(line).unwrap(),
            Some(WireEvent::Delta("```py\n\"x\"".to_string()))
        );
    }

    #[test]
    fn decode_done() {
        assert_eq!(decode_line("data: [DONE]").unwrap(), Some(WireEvent::Done));
        assert_eq!(decode_line("data:[DONE]").unwrap(), Some(WireEvent::Done));
    }

    #[test]
    fn decode_error_payload() {
        assert_eq!(
            decode_line(r#"data: {"error": "rate limited"}"#).unwrap(),
            Some(WireEvent::Error("rate limited".to_string()))
        );
    }

    #[test]
    fn decode_error_wins_over_delta() {
        assert_eq!(
            decode_line(r#"data: {"delta": "x", "error": "bad"}"#).unwrap(),
            Some(WireEvent::Error("bad".to_string()))
        );
    }

    #[test]
    fn decode_strips_carriage_return() {
        assert_eq!(
            decode_line("data: {\"delta\": \"hi\"}\r").unwrap(),
            Some(WireEvent::Delta("hi".to_string()))
        );
    }

    #[test]
    fn non_data_lines_are_ignored() {
        assert_eq!(decode_line("").unwrap(), None);
        assert_eq!(decode_line(": keepalive").unwrap(), None);
        assert_eq!(decode_line("event: message").unwrap(), None);
        assert_eq!(decode_line("hello").unwrap(), None);
    }

    #[test]
    fn empty_delta_is_ignored() {
        assert_eq!(decode_line(r#"data: {"delta": ""}"#).unwrap(), None);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(
            decode_line("data: {not json"),
            Err(FrameError::Json(_))
        ));
        assert_eq!(decode_line(r#"data: {"other": 1}"#), Err(FrameError::Empty));
    }

    #[test]
    fn terminal_events() {
        assert!(WireEvent::Done.is_terminal());
        assert!(WireEvent::Error("x".to_string()).is_terminal());
        assert!(!WireEvent::Delta("x".to_string()).is_terminal());
    }
}
