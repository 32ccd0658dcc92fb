//! Splits assistant text into plain and reasoning segments.
//!
//! Reasoning is any `<think>…</think>` region, matched case-insensitively
//! and non-greedily from left to right. Regions do not nest: a second
//! `<think>` inside an open region is ordinary content up to the next
//! closer. An opener with no closer is plain text.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Text to display. For reasoning, the interior without the tags.
    pub content: String,
    pub is_think: bool,
    /// Bytes of the source covered by this segment, tags included.
    pub span: Range<usize>,
}

impl Segment {
    fn plain(source: &str, span: Range<usize>) -> Self {
        Self {
            content: source[span.clone()].to_string(),
            is_think: false,
            span,
        }
    }
}

fn think_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"(?is)<think>(.*?)</think>") {
        Ok(re) => re,
        Err(e) => unreachable!("think pattern is a valid literal: {e}"),
    })
}

/// Segment `text`. Spans are ordered, contiguous and cover the whole input.
/// Empty plain runs between regions are omitted; empty reasoning regions
/// are kept.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in think_pattern().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > cursor {
            segments.push(Segment::plain(text, cursor..whole.start()));
        }
        segments.push(Segment {
            content: inner.as_str().to_string(),
            is_think: true,
            span: whole.range(),
        });
        cursor = whole.end();
    }

    if cursor < text.len() {
        segments.push(Segment::plain(text, cursor..text.len()));
    }
    segments
}

/// Rebuild the source text from segments produced by [`segment`].
pub fn reconstruct(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        if seg.is_think {
            out.push_str("<think>");
            out.push_str(&seg.content);
            out.push_str("</think>");
        } else {
            out.push_str(&seg.content);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(text: &str) -> Vec<(bool, String)> {
        segment(text)
            .into_iter()
            .map(|s| (s.is_think, s.content))
            .collect()
    }

    fn think(s: &str) -> (bool, String) {
        (true, s.to_string())
    }

    fn plain(s: &str) -> (bool, String) {
        (false, s.to_string())
    }

    #[test]
    fn empty_input_has_no_segments() {
        assert!(segment("").is_empty());
    }

    #[test]
    fn plain_only() {
        assert_eq!(shape("just text"), vec![plain("just text")]);
    }

    #[test]
    fn think_then_answer() {
        assert_eq!(
            shape("<think>reasoning</think>answer"),
            vec![think("reasoning"), plain("answer")]
        );
    }

    #[test]
    fn unterminated_think_is_plain() {
        assert_eq!(shape("<think>reason"), vec![plain("<think>reason")]);
    }

    #[test]
    fn case_insensitive_tags() {
        assert_eq!(
            shape("a<THINK>x</Think>b"),
            vec![plain("a"), think("x"), plain("b")]
        );
    }

    #[test]
    fn non_greedy_matches() {
        assert_eq!(
            shape("<think>a</think>mid<think>b</think>"),
            vec![think("a"), plain("mid"), think("b")]
        );
    }

    #[test]
    fn nested_opener_is_content() {
        assert_eq!(
            shape("<think>a<think>b</think>c</think>"),
            vec![think("a<think>b"), plain("c</think>")]
        );
    }

    #[test]
    fn reasoning_spans_newlines() {
        assert_eq!(
            shape("<think>line1\nline2</think>\nok"),
            vec![think("line1\nline2"), plain("\nok")]
        );
    }

    #[test]
    fn empty_think_kept() {
        assert_eq!(shape("<think></think>x"), vec![think(""), plain("x")]);
    }

    #[test]
    fn spans_are_contiguous_and_cover_input() {
        let text = "pre<think>one</think>mid<think>two</think>post<think>open";
        let segments = segment(text);
        let mut cursor = 0;
        for seg in &segments {
            assert_eq!(seg.span.start, cursor);
            cursor = seg.span.end;
        }
        assert_eq!(cursor, text.len());
    }

    #[test]
    fn reconstructs_input_exactly() {
        // Tags are rebuilt in lowercase; use lowercase input for exactness.
        for text in [
            "",
            "plain",
            "<think>r</think>a",
            "x<think>a<think>b</think>y",
            "<think>unterminated",
            "multi\n<think>\nlines\n</think>\n",
        ] {
            assert_eq!(reconstruct(&segment(text)), text);
        }
    }

    #[test]
    fn spans_reconstruct_mixed_case_input() {
        let text = "a<Think>b</THINK>c";
        let rebuilt: String = segment(text)
            .iter()
            .map(|s| &text[s.span.clone()])
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn idempotent() {
        let text = "<think>a</think>b<think>c";
        assert_eq!(segment(text), segment(text));
    }

    #[test]
    fn streaming_scenario() {
        let mut full = String::from("<think>reason");
        assert_eq!(shape(&full), vec![plain("<think>reason")]);
        full.push_str("ing</think>answer");
        assert_eq!(shape(&full), vec![think("reasoning"), plain("answer")]);
    }
}
