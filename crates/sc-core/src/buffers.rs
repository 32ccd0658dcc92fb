//! Per-turn accumulation of streamed text.

use crate::safety::is_balanced;

/// The full text received so far and the longest prefix known to be safe
/// to render. `safe` is always a prefix of `full`, and `full` only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBuffers {
    full: String,
    safe_len: usize,
}

impl StreamBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    pub fn safe(&self) -> &str {
        &self.full[..self.safe_len]
    }

    /// Text received after the safe prefix, shown literally.
    pub fn tail(&self) -> &str {
        &self.full[self.safe_len..]
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// Append a delta and re-evaluate safety. Returns whether `safe` moved.
    pub fn append(&mut self, delta: &str) -> bool {
        self.full.push_str(delta);
        self.recompute()
    }

    /// Promote `safe` to `full` if the whole buffer is balanced.
    pub fn recompute(&mut self) -> bool {
        if self.safe_len != self.full.len() && is_balanced(&self.full) {
            self.safe_len = self.full.len();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.full.clear();
        self.safe_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let buffers = StreamBuffers::new();
        assert!(buffers.is_empty());
        assert_eq!(buffers.safe(), "");
        assert_eq!(buffers.tail(), "");
    }

    #[test]
    fn plain_deltas_are_always_safe() {
        let mut buffers = StreamBuffers::new();
        for delta in ["Hel", "lo wor", "ld"] {
            buffers.append(delta);
            assert_eq!(buffers.safe(), buffers.full());
        }
        assert_eq!(buffers.full(), "Hello world");
    }

    #[test]
    fn open_fence_holds_safe_back() {
        let mut buffers = StreamBuffers::new();
        assert!(!buffers.append("```py\ncode"));
        assert_eq!(buffers.safe(), "");
        assert_eq!(buffers.tail(), "```py\ncode");

        assert!(buffers.append("\n```"));
        assert_eq!(buffers.safe(), "```py\ncode\n```");
        assert_eq!(buffers.tail(), "");
    }

    #[test]
    fn safe_keeps_last_balanced_point() {
        let mut buffers = StreamBuffers::new();
        buffers.append("intro ");
        buffers.append("$$x");
        assert_eq!(buffers.safe(), "intro ");
        buffers.append("+1");
        assert_eq!(buffers.safe(), "intro ");
        assert_eq!(buffers.tail(), "$$x+1");
    }

    #[test]
    fn safe_is_monotonic_prefix() {
        let deltas = ["a ", "```", "rs\nfn", " main()", "\n```\n", "$$", "x", "$$", " end"];
        let mut buffers = StreamBuffers::new();
        let mut last_safe = 0;
        for delta in deltas {
            buffers.append(delta);
            assert!(buffers.full().starts_with(buffers.safe()));
            assert!(buffers.safe().len() >= last_safe);
            last_safe = buffers.safe().len();
        }
        assert_eq!(buffers.safe(), buffers.full());
    }

    #[test]
    fn split_delimiter_across_deltas() {
        let mut buffers = StreamBuffers::new();
        buffers.append("``");
        // Two backticks are not a fence yet.
        assert_eq!(buffers.safe(), "``");
        buffers.append("`code");
        assert_eq!(buffers.safe(), "``");
    }

    #[test]
    fn reset_clears_both() {
        let mut buffers = StreamBuffers::new();
        buffers.append("text");
        buffers.reset();
        assert_eq!(buffers, StreamBuffers::new());
    }
}
