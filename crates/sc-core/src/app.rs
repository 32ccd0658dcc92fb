//! Interactive chat: application state, key handling and the main loop.

use std::collections::HashSet;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures::StreamExt;
use sc_protocol::{ChatRequest, Role};
use tokio::task::JoinHandle;

use crate::copy::{BlockId, CopyFeedback};
use crate::display::{has_reasoning, message_code_blocks};
use crate::markdown::MarkdownRenderer;
use crate::osc;
use crate::session::{ChatSession, SubmitError};
use crate::transport::{ChatClient, TurnUpdate};
use crate::tui::{self, AppEvent, EventHandler};
use crate::ui;

const TICK: Duration = Duration::from_millis(100);

/// Local error text when the user aborts a reply.
pub const CANCELLED: &str = "cancelled";

/// Side effects requested by a key press, run by the main loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send { id: u64, request: ChatRequest },
    Cancel,
    Copy { block: BlockId, text: String },
    Quit,
}

pub struct App {
    pub session: ChatSession,
    pub input: String,
    pub scroll_back: u16,
    pub expanded_think: HashSet<usize>,
    pub focused: Option<BlockId>,
    pub feedback: CopyFeedback,
    pub spinner_frame: usize,
    pub notice: Option<String>,
    pub should_quit: bool,
    pub renderer: MarkdownRenderer,
    viewport_height: u16,
    turn_id: u64,
}

impl App {
    pub fn new(renderer: MarkdownRenderer) -> Self {
        Self {
            session: ChatSession::new(),
            input: String::new(),
            scroll_back: 0,
            expanded_think: HashSet::new(),
            focused: None,
            feedback: CopyFeedback::new(),
            spinner_frame: 0,
            notice: None,
            should_quit: false,
            renderer,
            viewport_height: 10,
            turn_id: 0,
        }
    }

    pub fn set_viewport_height(&mut self, height: u16) {
        self.viewport_height = height.max(1);
    }

    /// Every code block that can take copy focus, in display order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        let mut ids = Vec::new();
        for (index, message) in self.session.conversation().messages().iter().enumerate() {
            if message.role != Role::Assistant || self.session.is_failed(index) {
                continue;
            }
            let count = self.code_blocks_of(index).len();
            ids.extend((0..count).map(|ordinal| BlockId::new(index, ordinal)));
        }
        ids
    }

    fn code_blocks_of(&self, index: usize) -> Vec<String> {
        let (safe, _tail) = self.session.split(index);
        message_code_blocks(&self.renderer, safe)
    }

    fn block_text(&self, id: BlockId) -> Option<String> {
        self.code_blocks_of(id.message).into_iter().nth(id.ordinal)
    }

    fn cycle_focus(&mut self, forward: bool) {
        let ids = self.block_ids();
        if ids.is_empty() {
            self.focused = None;
            return;
        }
        let current = self.focused.and_then(|f| ids.iter().position(|id| *id == f));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => ids.len() - 1,
            (Some(i), true) => (i + 1) % ids.len(),
            (Some(i), false) => (i + ids.len() - 1) % ids.len(),
        };
        self.focused = Some(ids[next]);
    }

    fn latest_reasoning(&self) -> Option<usize> {
        self.session
            .conversation()
            .messages()
            .iter()
            .rposition(|m| m.role == Role::Assistant && has_reasoning(&m.content))
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Option<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                Some(Command::Quit)
            }
            KeyCode::Esc => {
                if self.session.state().in_flight() {
                    self.session.fail(CANCELLED);
                    Some(Command::Cancel)
                } else {
                    self.focused = None;
                    None
                }
            }
            KeyCode::Char('t') if ctrl => {
                if let Some(index) = self.latest_reasoning() {
                    if !self.expanded_think.remove(&index) {
                        self.expanded_think.insert(index);
                    }
                }
                None
            }
            KeyCode::Char('y') if ctrl => {
                let block = self.focused?;
                let text = self.block_text(block)?;
                Some(Command::Copy { block, text })
            }
            KeyCode::Tab => {
                self.cycle_focus(true);
                None
            }
            KeyCode::BackTab => {
                self.cycle_focus(false);
                None
            }
            KeyCode::PageUp => {
                self.scroll_back = self.scroll_back.saturating_add(self.viewport_height);
                None
            }
            KeyCode::PageDown => {
                self.scroll_back = self.scroll_back.saturating_sub(self.viewport_height);
                None
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace if self.session.input_enabled() => {
                self.input.pop();
                None
            }
            KeyCode::Char(c) if !ctrl && self.session.input_enabled() => {
                self.input.push(c);
                self.notice = None;
                None
            }
            _ => None,
        }
    }

    fn submit(&mut self) -> Option<Command> {
        match self.session.submit(&self.input) {
            Ok(request) => {
                self.input.clear();
                self.notice = None;
                self.scroll_back = 0;
                self.turn_id += 1;
                Some(Command::Send {
                    id: self.turn_id,
                    request,
                })
            }
            Err(SubmitError::Busy) => None,
            Err(e @ SubmitError::Empty) => {
                self.notice = Some(e.to_string());
                None
            }
        }
    }

    /// Apply a transport update. Updates from superseded turns are dropped.
    pub fn handle_turn(&mut self, id: u64, update: TurnUpdate) {
        if id != self.turn_id {
            tracing::debug!(id, current = self.turn_id, "dropping update from old turn");
            return;
        }
        match update {
            TurnUpdate::Receiving => self.session.start_streaming(),
            TurnUpdate::Event(event) => {
                self.session.apply(event);
            }
        }
    }

    /// Write `text` to the clipboard through `out`. The block shows its
    /// copied state only once the write went through.
    pub fn copy_block<W: Write>(
        &mut self,
        out: &mut W,
        block: BlockId,
        text: &str,
        now: Instant,
    ) -> io::Result<()> {
        osc::copy_to_clipboard(out, text)?;
        self.feedback.mark(block, now);
        Ok(())
    }

    pub fn on_tick(&mut self, now: Instant) {
        if self.session.state().in_flight() {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }
        self.feedback.expire(now);
    }
}

fn spawn_turn(
    client: &ChatClient,
    id: u64,
    request: ChatRequest,
    tx: tokio::sync::mpsc::UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    let updates = client.turn(request);
    tokio::spawn(async move {
        let mut updates = std::pin::pin!(updates);
        while let Some(update) = updates.next().await {
            if tx.send(AppEvent::Turn { id, update }).is_err() {
                break;
            }
        }
    })
}

/// Run the full-screen chat until the user quits.
pub async fn run(client: ChatClient, renderer: MarkdownRenderer) -> io::Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK);
    let mut app = App::new(renderer);
    let mut active: Option<JoinHandle<()>> = None;

    let result = loop {
        if let Ok(size) = terminal.size() {
            app.set_viewport_height(ui::conversation_height(size.height));
        }
        if let Err(e) = terminal.draw(|frame| ui::draw(frame, &app)) {
            break Err(e);
        }

        let Some(event) = events.next().await else {
            break Ok(());
        };
        let now = Instant::now();
        match event {
            AppEvent::Key(key) => match app.handle_key(key, now) {
                Some(Command::Send { id, request }) => {
                    active = Some(spawn_turn(&client, id, request, events.sender()));
                }
                Some(Command::Cancel) => {
                    if let Some(task) = active.take() {
                        task.abort();
                    }
                    tracing::info!("reply cancelled");
                }
                Some(Command::Copy { block, text }) => {
                    if let Err(e) = app.copy_block(&mut io::stderr(), block, &text, now) {
                        tracing::warn!(error = %e, "clipboard write failed");
                        app.notice = Some("copy failed".to_string());
                    }
                }
                Some(Command::Quit) | None => {}
            },
            AppEvent::Resize(..) => {}
            AppEvent::Tick => app.on_tick(now),
            AppEvent::Turn { id, update } => app.handle_turn(id, update),
        }

        if app.should_quit {
            break Ok(());
        }
    };

    if let Some(task) = active.take() {
        task.abort();
    }
    tui::restore()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::testing::keys;
    use crate::markdown::Extensions;
    use crate::session::TurnState;
    use crate::style::Theme;
    use sc_protocol::{Message, WireEvent};

    fn app() -> App {
        App::new(MarkdownRenderer::new(Extensions::default(), Theme::monochrome()))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(keys::char(c), Instant::now());
        }
    }

    fn send(app: &mut App, text: &str) -> u64 {
        type_text(app, text);
        match app.handle_key(keys::enter(), Instant::now()) {
            Some(Command::Send { id, .. }) => id,
            other => panic!("expected send, got {other:?}"),
        }
    }

    fn event(app: &mut App, id: u64, event: WireEvent) {
        app.handle_turn(id, TurnUpdate::Event(event));
    }

    #[test]
    fn enter_sends_history_and_clears_input() {
        let mut app = app();
        type_text(&mut app, "hello");
        let cmd = app.handle_key(keys::enter(), Instant::now());

        assert_eq!(
            cmd,
            Some(Command::Send {
                id: 1,
                request: ChatRequest::new(vec![Message::user("hello")]),
            })
        );
        assert!(app.input.is_empty());
        assert_eq!(app.session.state(), TurnState::Sending);
    }

    #[test]
    fn blank_input_shows_notice() {
        let mut app = app();
        type_text(&mut app, "   ");
        assert_eq!(app.handle_key(keys::enter(), Instant::now()), None);
        assert_eq!(app.notice.as_deref(), Some("message is empty"));
        assert_eq!(app.session.state(), TurnState::Idle);
    }

    #[test]
    fn typing_ignored_while_streaming() {
        let mut app = app();
        send(&mut app, "hi");
        type_text(&mut app, "more");
        assert!(app.input.is_empty());
        assert_eq!(app.handle_key(keys::enter(), Instant::now()), None);
    }

    #[test]
    fn input_reenabled_after_done() {
        let mut app = app();
        let id = send(&mut app, "hi");
        app.handle_turn(id, TurnUpdate::Receiving);
        event(&mut app, id, WireEvent::Delta("hey".to_string()));
        event(&mut app, id, WireEvent::Done);

        type_text(&mut app, "next");
        assert_eq!(app.input, "next");
    }

    #[test]
    fn esc_cancels_in_flight_turn() {
        let mut app = app();
        let id = send(&mut app, "hi");
        event(&mut app, id, WireEvent::Delta("par".to_string()));

        assert_eq!(app.handle_key(keys::esc(), Instant::now()), Some(Command::Cancel));
        assert_eq!(app.session.state(), TurnState::Failed);
        assert_eq!(app.session.conversation().last().unwrap().content, CANCELLED);
    }

    #[test]
    fn stale_turn_updates_dropped() {
        let mut app = app();
        let old = send(&mut app, "one");
        app.handle_key(keys::esc(), Instant::now());
        let new = send(&mut app, "two");
        assert_ne!(old, new);

        event(&mut app, old, WireEvent::Delta("stale".to_string()));
        event(&mut app, old, WireEvent::Done);
        assert_eq!(app.session.state(), TurnState::Sending);
        assert_eq!(app.session.conversation().last().unwrap().content, "");
    }

    #[test]
    fn tab_cycles_code_blocks_and_ctrl_y_copies() {
        let mut app = app();
        let id = send(&mut app, "code");
        event(
            &mut app,
            id,
            WireEvent::Delta("```\none\n```\n\n```\ntwo\n```".to_string()),
        );
        event(&mut app, id, WireEvent::Done);

        app.handle_key(keys::tab(), Instant::now());
        assert_eq!(app.focused, Some(BlockId::new(1, 0)));
        app.handle_key(keys::tab(), Instant::now());
        assert_eq!(app.focused, Some(BlockId::new(1, 1)));
        app.handle_key(keys::tab(), Instant::now());
        assert_eq!(app.focused, Some(BlockId::new(1, 0)));

        let now = Instant::now();
        assert_eq!(
            app.handle_key(keys::ctrl('y'), now),
            Some(Command::Copy {
                block: BlockId::new(1, 0),
                text: "one\n".to_string(),
            })
        );
        // Feedback waits for the clipboard write.
        assert!(app.feedback.is_empty());

        let mut out = Vec::new();
        app.copy_block(&mut out, BlockId::new(1, 0), "one\n", now).unwrap();
        assert!(out.starts_with(b"\x1b]52;c;"));
        assert!(app.feedback.is_copied(BlockId::new(1, 0), now));
        assert!(!app.feedback.is_copied(BlockId::new(1, 1), now));
    }

    struct BrokenTerminal;

    impl Write for BrokenTerminal {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_clipboard_write_shows_no_feedback() {
        let mut app = app();
        let now = Instant::now();
        let result = app.copy_block(&mut BrokenTerminal, BlockId::new(1, 0), "x", now);
        assert!(result.is_err());
        assert!(!app.feedback.is_copied(BlockId::new(1, 0), now));
    }

    #[test]
    fn copy_feedback_clears_on_tick() {
        let mut app = app();
        let start = Instant::now();
        app.feedback.mark(BlockId::new(1, 0), start);
        app.on_tick(start + Duration::from_millis(1300));
        assert!(app.feedback.is_empty());
    }

    #[test]
    fn unbalanced_reply_offers_no_copy_target() {
        let mut app = app();
        let id = send(&mut app, "code");
        event(&mut app, id, WireEvent::Delta("```\nleft open".to_string()));
        event(&mut app, id, WireEvent::Done);

        assert!(app.block_ids().is_empty());
        app.handle_key(keys::tab(), Instant::now());
        assert_eq!(app.focused, None);
    }

    #[test]
    fn ctrl_y_without_focus_does_nothing() {
        let mut app = app();
        assert_eq!(app.handle_key(keys::ctrl('y'), Instant::now()), None);
    }

    #[test]
    fn ctrl_t_toggles_latest_reasoning() {
        let mut app = app();
        let id = send(&mut app, "q");
        event(&mut app, id, WireEvent::Delta("<think>r</think>a".to_string()));
        event(&mut app, id, WireEvent::Done);

        app.handle_key(keys::ctrl('t'), Instant::now());
        assert!(app.expanded_think.contains(&1));
        app.handle_key(keys::ctrl('t'), Instant::now());
        assert!(!app.expanded_think.contains(&1));
    }

    #[test]
    fn ctrl_t_skips_replies_without_reasoning() {
        let mut app = app();
        let id = send(&mut app, "q");
        event(&mut app, id, WireEvent::Delta("<think>r</think>a".to_string()));
        event(&mut app, id, WireEvent::Done);
        let id = send(&mut app, "again");
        event(&mut app, id, WireEvent::Delta("plain".to_string()));
        event(&mut app, id, WireEvent::Done);

        app.handle_key(keys::ctrl('t'), Instant::now());
        assert_eq!(app.expanded_think, HashSet::from([1]));
    }

    #[test]
    fn page_keys_scroll_by_viewport() {
        let mut app = app();
        app.set_viewport_height(8);
        app.handle_key(keys::page_up(), Instant::now());
        app.handle_key(keys::page_up(), Instant::now());
        assert_eq!(app.scroll_back, 16);
        app.handle_key(keys::page_down(), Instant::now());
        assert_eq!(app.scroll_back, 8);
        app.handle_key(keys::page_down(), Instant::now());
        app.handle_key(keys::page_down(), Instant::now());
        assert_eq!(app.scroll_back, 0);
    }

    #[test]
    fn ctrl_c_quits() {
        let mut app = app();
        assert_eq!(app.handle_key(keys::ctrl('c'), Instant::now()), Some(Command::Quit));
        assert!(app.should_quit);
    }

    #[test]
    fn backspace_edits_input() {
        let mut app = app();
        type_text(&mut app, "hix");
        app.handle_key(keys::backspace(), Instant::now());
        assert_eq!(app.input, "hi");
    }
}
