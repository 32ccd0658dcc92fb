//! Markdown to styled terminal lines.
//!
//! Drives `pulldown-cmark` and turns its event stream into ratatui
//! [`Line`]s. Raw HTML is shown as literal text and never interpreted.
//! Fenced code blocks pass through a [`BlockOverride`] so callers can
//! decorate them (the copy affordance is one such override).

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::Style as TuiStyle;
use ratatui::text::{Line, Span};

use crate::style::Theme;

const RULE_WIDTH: usize = 40;

/// Optional Markdown syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensions {
    pub tables: bool,
    pub math: bool,
    /// Language label and code coloring for fenced blocks.
    pub highlight: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            tables: true,
            math: true,
            highlight: true,
        }
    }
}

/// A code block as seen by a [`BlockOverride`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    pub lang: Option<&'a str>,
    pub code: &'a str,
    /// Position among the code blocks of the enclosing message.
    pub ordinal: usize,
}

/// Hook for custom code block rendering.
pub trait BlockOverride {
    /// Receives the default rendering and returns the lines to draw.
    fn code_block(&self, block: &CodeBlock<'_>, default: Vec<Line<'static>>) -> Vec<Line<'static>>;
}

/// Keeps the default rendering.
pub struct NoOverride;

impl BlockOverride for NoOverride {
    fn code_block(&self, _block: &CodeBlock<'_>, default: Vec<Line<'static>>) -> Vec<Line<'static>> {
        default
    }
}

#[derive(Debug, Default)]
pub struct Rendered {
    pub lines: Vec<Line<'static>>,
    /// Number of code blocks encountered.
    pub code_blocks: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    extensions: Extensions,
    theme: Theme,
}

impl MarkdownRenderer {
    pub fn new(extensions: Extensions, theme: Theme) -> Self {
        Self { extensions, theme }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn options(&self) -> Options {
        let mut options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        if self.extensions.tables {
            options |= Options::ENABLE_TABLES;
        }
        if self.extensions.math {
            options |= Options::ENABLE_MATH;
        }
        options
    }

    /// Render `text`. Code block ordinals start at `first_ordinal`.
    pub fn render(&self, text: &str, overrides: &dyn BlockOverride, first_ordinal: usize) -> Rendered {
        let mut writer = LineWriter::new(self, overrides, first_ordinal);
        for event in Parser::new_ext(text, self.options()) {
            writer.event(event);
        }
        writer.finish(first_ordinal)
    }

    /// Contents of every code block in `text`, in render order.
    pub fn code_blocks(&self, text: &str) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut current: Option<String> = None;
        for event in Parser::new_ext(text, self.options()) {
            match event {
                Event::Start(Tag::CodeBlock(_)) => current = Some(String::new()),
                Event::Text(t) => {
                    if let Some(code) = current.as_mut() {
                        code.push_str(&t);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(code) = current.take() {
                        blocks.push(code);
                    }
                }
                _ => {}
            }
        }
        blocks
    }

    fn default_code_block(&self, lang: Option<&str>, code: &str) -> Vec<Line<'static>> {
        let theme = &self.theme;
        let frame = theme.code_header();
        let header = match (self.extensions.highlight, lang) {
            (true, Some(lang)) => format!("┌─ {lang}"),
            _ => "┌─".to_string(),
        };
        let body = if self.extensions.highlight {
            theme.code()
        } else {
            theme.text()
        };

        let mut lines = vec![Line::from(Span::styled(header, frame))];
        for line in code.trim_end_matches('\n').split('\n') {
            lines.push(Line::from(vec![
                Span::styled("│ ", frame),
                Span::styled(line.to_string(), body),
            ]));
        }
        lines.push(Line::from(Span::styled("└─", frame)));
        lines
    }
}

struct PendingCode {
    lang: Option<String>,
    text: String,
}

#[derive(Default)]
struct PendingTable {
    rows: Vec<Vec<String>>,
    has_header: bool,
    row: Vec<String>,
    cell: String,
}

struct LineWriter<'a> {
    renderer: &'a MarkdownRenderer,
    overrides: &'a dyn BlockOverride,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<TuiStyle>,
    quote_depth: usize,
    lists: Vec<Option<u64>>,
    links: Vec<String>,
    code: Option<PendingCode>,
    table: Option<PendingTable>,
    next_ordinal: usize,
}

impl<'a> LineWriter<'a> {
    fn new(renderer: &'a MarkdownRenderer, overrides: &'a dyn BlockOverride, first_ordinal: usize) -> Self {
        Self {
            renderer,
            overrides,
            lines: Vec::new(),
            current: Vec::new(),
            styles: Vec::new(),
            quote_depth: 0,
            lists: Vec::new(),
            links: Vec::new(),
            code: None,
            table: None,
            next_ordinal: first_ordinal,
        }
    }

    fn theme(&self) -> &Theme {
        &self.renderer.theme
    }

    fn style(&self) -> TuiStyle {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: TuiStyle) {
        let merged = self.style().patch(style);
        self.styles.push(merged);
    }

    fn span(&mut self, text: impl Into<String>, style: TuiStyle) {
        let text = text.into();
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(&text);
            return;
        }
        self.current.push(Span::styled(text, style));
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            if !first.is_empty() {
                self.span(first.to_string(), style);
            }
        }
        for part in parts {
            self.flush();
            if !part.is_empty() {
                self.span(part.to_string(), style);
            }
        }
    }

    fn quote_prefix(&self) -> Option<Span<'static>> {
        (self.quote_depth > 0).then(|| Span::styled("│ ".repeat(self.quote_depth), self.theme().quote()))
    }

    fn push_line(&mut self, mut line: Line<'static>) {
        if let Some(prefix) = self.quote_prefix() {
            line.spans.insert(0, prefix);
        }
        self.lines.push(line);
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.current);
        self.push_line(Line::from(spans));
    }

    fn blank(&mut self) {
        self.flush();
        if !self.lists.is_empty() {
            return;
        }
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event<'_>) {
        if let Some(code) = self.code.as_mut() {
            match event {
                Event::Text(t) => code.text.push_str(&t),
                Event::End(TagEnd::CodeBlock) => self.end_code_block(),
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(t) => self.text(&t),
            Event::Code(c) => {
                let style = self.theme().inline_code();
                self.span(c.to_string(), style);
            }
            Event::InlineMath(m) => {
                let style = self.theme().math();
                self.span(format!("${m}$"), style);
            }
            Event::DisplayMath(m) => self.display_math(&m),
            Event::Html(h) | Event::InlineHtml(h) => {
                let style = self.theme().text();
                let mut parts = h.split('\n').peekable();
                while let Some(part) = parts.next() {
                    if !part.is_empty() {
                        self.span(part.to_string(), style);
                    }
                    if parts.peek().is_some() {
                        self.flush();
                    }
                }
            }
            Event::SoftBreak => {
                let style = self.style();
                self.span(" ", style);
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                let style = self.theme().rule();
                self.push_line(Line::from(Span::styled("─".repeat(RULE_WIDTH), style)));
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                let style = self.style();
                self.span(marker, style);
            }
            Event::FootnoteReference(name) => {
                let style = self.theme().dim();
                self.span(format!("[^{name}]"), style);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush();
                let style = self.theme().heading();
                self.push_style(style);
                self.span(format!("{} ", "#".repeat(level as usize)), style);
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.quote_depth += 1;
                let style = self.theme().quote();
                self.push_style(style);
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(PendingCode {
                    lang,
                    text: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let style = self.theme().text();
                self.span(format!("{}{marker}", "  ".repeat(depth)), style);
            }
            Tag::Emphasis => {
                let style = self.theme().emphasis();
                self.push_style(style);
            }
            Tag::Strong => {
                let style = self.theme().strong();
                self.push_style(style);
            }
            Tag::Strikethrough => {
                let style = self.theme().strikethrough();
                self.push_style(style);
            }
            Tag::Link { dest_url, .. } => {
                let style = self.theme().link();
                self.push_style(style);
                self.links.push(dest_url.to_string());
            }
            Tag::Image { dest_url, .. } => {
                let style = self.theme().dim();
                self.span("[image: ", style);
                self.links.push(dest_url.to_string());
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(PendingTable::default());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.blank(),
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.blank();
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.styles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                self.blank();
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(url) = self.links.pop() {
                    let style = self.theme().dim();
                    self.span(format!(" <{url}>"), style);
                }
            }
            TagEnd::Image => {
                let style = self.theme().dim();
                let url = self.links.pop().unwrap_or_default();
                self.span(format!("] <{url}>"), style);
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    table.has_header = true;
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.emit_table(table);
                }
                self.blank();
            }
            _ => {}
        }
    }

    fn display_math(&mut self, tex: &str) {
        self.flush();
        let style = self.theme().math();
        for line in tex.trim().split('\n') {
            self.push_line(Line::from(Span::styled(format!("  {line}"), style)));
        }
    }

    fn end_code_block(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let default = self.renderer.default_code_block(code.lang.as_deref(), &code.text);
        let block = CodeBlock {
            lang: code.lang.as_deref(),
            code: &code.text,
            ordinal,
        };
        for line in self.overrides.code_block(&block, default) {
            self.push_line(line);
        }
        self.blank();
    }

    fn emit_table(&mut self, table: PendingTable) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let theme = *self.theme();
        for (index, row) in table.rows.iter().enumerate() {
            let header = table.has_header && index == 0;
            let style = if header { theme.table_header() } else { theme.text() };
            let mut spans = Vec::new();
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" │ ", theme.rule()));
                }
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = width.saturating_sub(cell.chars().count());
                spans.push(Span::styled(format!("{cell}{}", " ".repeat(pad)), style));
            }
            self.push_line(Line::from(spans));

            if header {
                let separator = widths
                    .iter()
                    .map(|w| "─".repeat(*w))
                    .collect::<Vec<_>>()
                    .join("─┼─");
                self.push_line(Line::from(Span::styled(separator, theme.rule())));
            }
        }
    }

    fn finish(mut self, first_ordinal: usize) -> Rendered {
        if self.code.is_some() {
            self.end_code_block();
        }
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        Rendered {
            code_blocks: self.next_ordinal - first_ordinal,
            lines: self.lines,
        }
    }
}

/// Flatten lines to plain text, one `\n` per line. Used by tests and
/// batch output.
pub fn lines_to_string(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|s| s.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
