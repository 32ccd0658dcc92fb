//! Terminal styling helpers with NO_COLOR support.
//!
//! `Style` produces raw ANSI codes for line-oriented output (batch mode on
//! stderr). `Theme` produces ratatui styles for the full-screen UI.

use ratatui::style::{Color, Modifier, Style as TuiStyle};

/// Check if color output is enabled (respects `NO_COLOR` env var).
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Terminal style helper that respects NO_COLOR.
pub struct Style {
    enabled: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

impl Style {
    pub fn new() -> Self {
        Self {
            enabled: color_enabled(),
        }
    }

    /// Create a style with colors explicitly enabled (for tests).
    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    /// Create a style with colors explicitly disabled.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn dim_start(&self) -> &'static str {
        if self.enabled {
            "\x1b[2m"
        } else {
            ""
        }
    }

    pub fn red_start(&self) -> &'static str {
        if self.enabled {
            "\x1b[31m"
        } else {
            ""
        }
    }

    pub fn cyan_start(&self) -> &'static str {
        if self.enabled {
            "\x1b[36m"
        } else {
            ""
        }
    }

    pub fn reset(&self) -> &'static str {
        if self.enabled {
            "\x1b[0m"
        } else {
            ""
        }
    }
}

/// Styles for every element of the conversation view.
///
/// Text modifiers (bold, italic) are kept when color is off so structure
/// stays visible on monochrome terminals.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    color: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Theme {
    /// `color` is the user's setting; `NO_COLOR` still wins.
    pub fn new(color: bool) -> Self {
        Self {
            color: color && color_enabled(),
        }
    }

    pub fn monochrome() -> Self {
        Self { color: false }
    }

    fn fg(&self, color: Color) -> TuiStyle {
        if self.color {
            TuiStyle::default().fg(color)
        } else {
            TuiStyle::default()
        }
    }

    pub fn text(&self) -> TuiStyle {
        TuiStyle::default()
    }

    pub fn heading(&self) -> TuiStyle {
        self.fg(Color::Cyan).add_modifier(Modifier::BOLD)
    }

    pub fn strong(&self) -> TuiStyle {
        TuiStyle::default().add_modifier(Modifier::BOLD)
    }

    pub fn emphasis(&self) -> TuiStyle {
        TuiStyle::default().add_modifier(Modifier::ITALIC)
    }

    pub fn strikethrough(&self) -> TuiStyle {
        TuiStyle::default().add_modifier(Modifier::CROSSED_OUT)
    }

    pub fn inline_code(&self) -> TuiStyle {
        self.fg(Color::Yellow)
    }

    pub fn code(&self) -> TuiStyle {
        self.fg(Color::LightYellow)
    }

    pub fn code_header(&self) -> TuiStyle {
        self.fg(Color::DarkGray)
    }

    pub fn math(&self) -> TuiStyle {
        self.fg(Color::Magenta).add_modifier(Modifier::ITALIC)
    }

    pub fn link(&self) -> TuiStyle {
        self.fg(Color::Blue).add_modifier(Modifier::UNDERLINED)
    }

    pub fn quote(&self) -> TuiStyle {
        self.fg(Color::Gray).add_modifier(Modifier::ITALIC)
    }

    pub fn rule(&self) -> TuiStyle {
        self.fg(Color::DarkGray)
    }

    pub fn table_header(&self) -> TuiStyle {
        TuiStyle::default().add_modifier(Modifier::BOLD)
    }

    pub fn think(&self) -> TuiStyle {
        self.fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
    }

    /// Unrendered tail of a streaming reply.
    pub fn tail(&self) -> TuiStyle {
        self.fg(Color::Gray)
    }

    pub fn error(&self) -> TuiStyle {
        self.fg(Color::Red)
    }

    pub fn user_label(&self) -> TuiStyle {
        self.fg(Color::Green).add_modifier(Modifier::BOLD)
    }

    pub fn assistant_label(&self) -> TuiStyle {
        self.fg(Color::Cyan).add_modifier(Modifier::BOLD)
    }

    pub fn dim(&self) -> TuiStyle {
        TuiStyle::default().add_modifier(Modifier::DIM)
    }

    pub fn focused(&self) -> TuiStyle {
        TuiStyle::default().add_modifier(Modifier::REVERSED)
    }

    pub fn copied(&self) -> TuiStyle {
        self.fg(Color::Green).add_modifier(Modifier::BOLD)
    }
}
