//! Testing harness for the conversation view.
//!
//! Provides TestTui for driving a session and asserting on rendered output.

use std::collections::HashSet;
use std::time::Instant;

use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::Terminal;
use sc_protocol::WireEvent;

use super::{ConversationView, ViewState};
use crate::copy::{BlockId, CopyFeedback};
use crate::markdown::{Extensions, MarkdownRenderer};
use crate::session::ChatSession;
use crate::style::Theme;

/// Test harness for the conversation view.
pub struct TestTui {
    pub session: ChatSession,
    pub expanded_think: HashSet<usize>,
    pub focused: Option<BlockId>,
    pub feedback: CopyFeedback,
    pub scroll_back: u16,
    renderer: MarkdownRenderer,
    terminal: Terminal<TestBackend>,
}

impl TestTui {
    /// Create a new test TUI with the given dimensions.
    pub fn new(width: u16, height: u16) -> Self {
        let backend = TestBackend::new(width, height);
        let terminal = Terminal::new(backend).expect("failed to create terminal");

        Self {
            session: ChatSession::new(),
            expanded_think: HashSet::new(),
            focused: None,
            feedback: CopyFeedback::new(),
            scroll_back: 0,
            renderer: MarkdownRenderer::new(Extensions::default(), Theme::monochrome()),
            terminal,
        }
    }

    /// Create a test TUI with default dimensions (80x24).
    pub fn default_size() -> Self {
        Self::new(80, 24)
    }

    /// Start a turn with `input`.
    pub fn submit(&mut self, input: &str) {
        self.session.submit(input).expect("submit failed");
    }

    /// Apply a wire event to the session.
    pub fn apply_event(&mut self, event: &WireEvent) {
        self.session.apply(event.clone());
    }

    /// Apply multiple events.
    pub fn apply_events(&mut self, events: &[WireEvent]) {
        for event in events {
            self.session.apply(event.clone());
        }
    }

    fn draw(&mut self) {
        let state = ViewState {
            expanded_think: &self.expanded_think,
            focused: self.focused,
            feedback: &self.feedback,
            now: Instant::now(),
            scroll_back: self.scroll_back,
        };
        let view = ConversationView::new(&self.session, &self.renderer, state);
        self.terminal
            .draw(|frame| {
                let area = frame.area();
                frame.render_widget(view, area);
            })
            .expect("failed to draw");
    }

    /// Render and return as string for assertions.
    pub fn render(&mut self) -> String {
        self.draw();
        buffer_to_string(self.terminal.backend().buffer())
    }

    /// Assert rendered output contains text.
    pub fn assert_contains(&mut self, expected: &str) {
        let rendered = self.render();
        assert!(
            rendered.contains(expected),
            "Expected to find '{}' in:\n{}",
            expected,
            rendered
        );
    }

    /// Assert rendered output does not contain text.
    pub fn assert_not_contains(&mut self, unexpected: &str) {
        let rendered = self.render();
        assert!(
            !rendered.contains(unexpected),
            "Expected NOT to find '{}' in:\n{}",
            unexpected,
            rendered
        );
    }

    /// Get the raw buffer for detailed inspection.
    pub fn buffer(&mut self) -> &Buffer {
        self.draw();
        self.terminal.backend().buffer()
    }

    /// Get the terminal area.
    pub fn area(&self) -> Rect {
        let size = self.terminal.size().unwrap_or_default();
        Rect::new(0, 0, size.width, size.height)
    }
}

/// Convert a buffer to a string representation.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut result = String::new();

    for y in 0..area.height {
        for x in 0..area.width {
            if let Some(cell) = buffer.cell((x, y)) {
                result.push_str(cell.symbol());
            }
        }
        // Trim trailing spaces and add newline
        result = result.trim_end().to_string();
        result.push('\n');
    }

    // Trim trailing empty lines
    while result.ends_with("\n\n") {
        result.pop();
    }

    result
}

/// Key event helpers for testing.
pub mod keys {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    pub fn enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)
    }

    pub fn esc() -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    pub fn tab() -> KeyEvent {
        KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE)
    }

    pub fn backspace() -> KeyEvent {
        KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)
    }

    pub fn page_up() -> KeyEvent {
        KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE)
    }

    pub fn page_down() -> KeyEvent {
        KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE)
    }

    pub fn char(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

/// Test fixtures as wire event sequences.
pub mod fixtures {
    use super::*;

    /// A reply containing two fenced code blocks.
    pub fn two_code_blocks_events() -> Vec<WireEvent> {
        vec![
            WireEvent::Delta("List the files:\n\n".to_string()),
            WireEvent::Delta("```sh\nls /tmp\n```\n\n".to_string()),
            WireEvent::Delta("Then show one:\n\n".to_string()),
            WireEvent::Delta("```sh\ncat file.txt\n```\n".to_string()),
            WireEvent::Done,
        ]
    }

    /// Reasoning followed by an answer, split inside the closing tag.
    pub fn reasoning_events() -> Vec<WireEvent> {
        vec![
            WireEvent::Delta("<think>reason".to_string()),
            WireEvent::Delta("ing</think>answer".to_string()),
            WireEvent::Done,
        ]
    }

    /// Create error events.
    pub fn error_events(msg: &str) -> Vec<WireEvent> {
        vec![WireEvent::Error(msg.to_string())]
    }
}
