//! Render-safety check for partially streamed Markdown.
//!
//! Text is safe to hand to the Markdown renderer when it contains no open
//! code fence and no open display-math block. The check only counts
//! delimiters: it does not see single-backtick inline code, fences nested
//! in other fences, or `$$` inside a code block.

pub const CODE_FENCE: &str = "```";
pub const MATH_BLOCK: &str = "$$";

/// Both delimiter counts are even.
pub fn is_balanced(text: &str) -> bool {
    text.matches(CODE_FENCE).count() % 2 == 0 && text.matches(MATH_BLOCK).count() % 2 == 0
}
