//! Copy-to-clipboard state for code blocks.
//!
//! Each code block is identified by the message it belongs to and its
//! position among that message's code blocks. A successful copy shows a
//! confirmation on that block only, which reverts on its own.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ratatui::text::{Line, Span};

use crate::markdown::{BlockOverride, CodeBlock};
use crate::style::Theme;

/// How long the "copied" confirmation stays visible.
pub const COPY_FEEDBACK: Duration = Duration::from_millis(1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub message: usize,
    pub ordinal: usize,
}

impl BlockId {
    pub fn new(message: usize, ordinal: usize) -> Self {
        Self { message, ordinal }
    }
}

#[derive(Debug, Default)]
pub struct CopyFeedback {
    copied_at: HashMap<BlockId, Instant>,
}

impl CopyFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a copy of `block` at `now`. Restarts the timer if the block
    /// was already showing confirmation.
    pub fn mark(&mut self, block: BlockId, now: Instant) {
        self.copied_at.insert(block, now);
    }

    pub fn is_copied(&self, block: BlockId, now: Instant) -> bool {
        self.copied_at
            .get(&block)
            .is_some_and(|at| now.saturating_duration_since(*at) < COPY_FEEDBACK)
    }

    /// Drop expired confirmations. Returns whether anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.copied_at.len();
        self.copied_at
            .retain(|_, at| now.saturating_duration_since(*at) < COPY_FEEDBACK);
        self.copied_at.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.copied_at.is_empty()
    }
}

/// Code block decoration for one message: a copy hint on every block,
/// focus highlight, and the confirmation label.
pub struct CopyAffordance<'a> {
    pub message: usize,
    pub focused: Option<BlockId>,
    pub feedback: &'a CopyFeedback,
    pub now: Instant,
    pub theme: Theme,
}

impl BlockOverride for CopyAffordance<'_> {
    fn code_block(&self, block: &CodeBlock<'_>, mut default: Vec<Line<'static>>) -> Vec<Line<'static>> {
        let id = BlockId::new(self.message, block.ordinal);
        let focused = self.focused == Some(id);

        let label = if self.feedback.is_copied(id, self.now) {
            Span::styled("  copied", self.theme.copied())
        } else if focused {
            Span::styled("  [ctrl+y copy]", self.theme.dim())
        } else {
            Span::styled("  [copy]", self.theme.dim())
        };

        if let Some(header) = default.first_mut() {
            if focused {
                for span in header.spans.iter_mut() {
                    span.style = span.style.patch(self.theme.focused());
                }
            }
            header.spans.push(label);
        }
        default
    }
}
