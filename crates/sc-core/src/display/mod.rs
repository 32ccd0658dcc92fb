//! Conversation view: messages to styled, scrollable lines.
//!
//! Assistant replies render only their safe prefix through Markdown,
//! followed by the unrendered tail as literal text. A reply that completed
//! with an open fence keeps its tail literal. Reasoning segments become a container
//! that is collapsed unless the message index is in `expanded_think`.

pub mod testing;

use std::collections::HashSet;
use std::time::Instant;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget, Wrap};
use sc_protocol::{Message, Role};

use crate::copy::{BlockId, CopyAffordance, CopyFeedback};
use crate::markdown::{MarkdownRenderer, NoOverride};
use crate::segment::segment;
use crate::session::ChatSession;

/// UI state that affects how messages are drawn.
#[derive(Debug, Clone, Copy)]
pub struct ViewState<'a> {
    pub expanded_think: &'a HashSet<usize>,
    pub focused: Option<BlockId>,
    pub feedback: &'a CopyFeedback,
    pub now: Instant,
    /// Lines scrolled up from the bottom. Zero follows new output.
    pub scroll_back: u16,
}

pub struct ConversationView<'a> {
    session: &'a ChatSession,
    renderer: &'a MarkdownRenderer,
    state: ViewState<'a>,
}

impl<'a> ConversationView<'a> {
    pub fn new(session: &'a ChatSession, renderer: &'a MarkdownRenderer, state: ViewState<'a>) -> Self {
        Self {
            session,
            renderer,
            state,
        }
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        let mut out = Vec::new();
        for (index, message) in self.session.conversation().messages().iter().enumerate() {
            if index > 0 {
                out.push(Line::default());
            }
            self.message_lines(index, message, &mut out);
        }
        out
    }

    fn message_lines(&self, index: usize, message: &Message, out: &mut Vec<Line<'static>>) {
        let theme = self.renderer.theme();
        match message.role {
            Role::User => {
                out.push(Line::from(Span::styled("you", theme.user_label())));
                for line in message.content.split('\n') {
                    out.push(Line::from(Span::styled(line.to_string(), theme.text())));
                }
            }
            Role::Assistant => {
                out.push(Line::from(Span::styled("assistant", theme.assistant_label())));
                if self.session.is_failed(index) {
                    for line in message.content.split('\n') {
                        out.push(Line::from(Span::styled(line.to_string(), theme.error())));
                    }
                } else {
                    self.reply_lines(index, out);
                }
            }
        }
    }

    fn reply_lines(&self, index: usize, out: &mut Vec<Line<'static>>) {
        let theme = self.renderer.theme();
        if self.session.streaming_index() == Some(index) && self.session.buffers().is_empty() {
            out.push(Line::from(Span::styled("…", theme.dim())));
            return;
        }

        let (safe, tail) = self.session.split(index);
        self.content_lines(index, safe, out);
        if !tail.is_empty() {
            for line in tail.split('\n') {
                out.push(Line::from(Span::styled(line.to_string(), theme.tail())));
            }
        }
    }

    fn content_lines(&self, index: usize, text: &str, out: &mut Vec<Line<'static>>) {
        let theme = *self.renderer.theme();
        let affordance = CopyAffordance {
            message: index,
            focused: self.state.focused,
            feedback: self.state.feedback,
            now: self.state.now,
            theme,
        };
        let expanded = self.state.expanded_think.contains(&index);

        let mut ordinal = 0;
        for seg in segment(text) {
            if seg.is_think {
                if expanded {
                    out.push(Line::from(Span::styled("▾ reasoning", theme.think())));
                    let rendered = self.renderer.render(&seg.content, &NoOverride, 0);
                    for mut line in rendered.lines {
                        line.spans.insert(0, Span::styled("┆ ", theme.think()));
                        out.push(line);
                    }
                } else {
                    out.push(Line::from(Span::styled(
                        "▸ reasoning hidden (ctrl+t to show)",
                        theme.think(),
                    )));
                }
            } else {
                let rendered = self.renderer.render(&seg.content, &affordance, ordinal);
                ordinal += rendered.code_blocks;
                out.extend(rendered.lines);
            }
        }
    }
}

impl Widget for ConversationView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines = self.lines();
        let total = wrapped_height(&lines, area.width);
        let bottom = total.saturating_sub(area.height as usize);
        let offset = bottom.saturating_sub(self.state.scroll_back as usize);
        let offset = u16::try_from(offset).unwrap_or(u16::MAX);

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((offset, 0))
            .render(area, buf);
    }
}

/// Rows needed to show `lines` at `width`, assuming character wrapping.
pub fn wrapped_height(lines: &[Line<'_>], width: u16) -> usize {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum()
}

/// Code block contents of a message, in the ordinal order used by the
/// copy affordance. Reasoning segments are not included.
pub fn message_code_blocks(renderer: &MarkdownRenderer, content: &str) -> Vec<String> {
    segment(content)
        .iter()
        .filter(|seg| !seg.is_think)
        .flat_map(|seg| renderer.code_blocks(&seg.content))
        .collect()
}

/// Whether `content` has any reasoning segment.
pub fn has_reasoning(content: &str) -> bool {
    segment(content).iter().any(|seg| seg.is_think)
}
