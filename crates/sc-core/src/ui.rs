use std::time::Instant;

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::display::{ConversationView, ViewState};

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

const STATUS_HEIGHT: u16 = 1;
const INPUT_HEIGHT: u16 = 3;

/// Rows left for conversation text in a terminal `height` rows tall.
pub fn conversation_height(height: u16) -> u16 {
    height.saturating_sub(STATUS_HEIGHT + INPUT_HEIGHT + 2)
}

pub fn draw(frame: &mut Frame, app: &App) {
    let [conversation_area, status_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(STATUS_HEIGHT),
        Constraint::Length(INPUT_HEIGHT),
    ])
    .areas(frame.area());

    draw_conversation(frame, app, conversation_area);
    draw_status(frame, app, status_area);
    draw_input(frame, app, input_area);
}

fn draw_conversation(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" streamchat ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let state = ViewState {
        expanded_think: &app.expanded_think,
        focused: app.focused,
        feedback: &app.feedback,
        now: Instant::now(),
        scroll_back: app.scroll_back,
    };
    frame.render_widget(ConversationView::new(&app.session, &app.renderer, state), inner);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.renderer.theme();
    let state = app.session.state();

    let mut spans = Vec::new();
    if state.in_flight() {
        let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
        spans.push(Span::styled(format!(" {spinner} "), theme.assistant_label()));
    } else {
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(state.label(), theme.dim()));

    if let Some(notice) = &app.notice {
        spans.push(Span::styled(format!("  {notice}"), theme.error()));
    }
    if app.scroll_back > 0 {
        spans.push(Span::styled(format!("  ↑{}", app.scroll_back), theme.dim()));
    }

    let hints = if state.in_flight() {
        "  esc cancel · tab focus code · ctrl+t reasoning"
    } else {
        "  enter send · tab focus code · ctrl+y copy · ctrl+c quit"
    };
    spans.push(Span::styled(hints, theme.dim()));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let theme = app.renderer.theme();
    let enabled = app.session.input_enabled();

    let (title, style) = if enabled {
        (" message ", theme.text())
    } else {
        (" waiting for reply ", theme.dim())
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);

    // Keep the end of long input visible.
    let width = inner.width.max(1) as usize;
    let chars = app.input.chars().count();
    let visible: String = app.input.chars().skip(chars.saturating_sub(width - 1)).collect();
    let cursor_x = inner.x + visible.chars().count() as u16;

    frame.render_widget(Paragraph::new(visible).style(style).block(block), area);

    if enabled {
        frame.set_cursor_position((cursor_x, inner.y));
    }
}
