//! Non-interactive batch mode.
//!
//! Send one prompt to the relay, stream the reply's raw text to stdout as
//! it arrives, and exit. Progress and errors go to stderr. No raw mode, no
//! alternate screen.

use std::io::{IsTerminal, Write};
use std::time::Instant;

use futures::{Stream, StreamExt};
use sc_protocol::WireEvent;

use crate::session::{ChatSession, TurnState};
use crate::style::Style;
use crate::transport::{ChatClient, TurnUpdate};

/// Encapsulates all stderr formatting for batch mode output.
///
/// TTY output overwrites a single status line between persistent
/// boundaries. Non-TTY output uses plain text with one line per event.
pub struct BatchOutput<W: Write> {
    writer: W,
    is_tty: bool,
    style: Style,
    start_time: Instant,
    task_summary: String,
}

impl<W: Write> BatchOutput<W> {
    pub fn new(writer: W, is_tty: bool, prompt: &str) -> Self {
        let summary: String = prompt.chars().take(60).collect();
        let task_summary = if prompt.chars().count() > 60 {
            format!("{summary}...")
        } else {
            summary
        };

        Self {
            writer,
            is_tty,
            style: if is_tty { Style::new() } else { Style::disabled() },
            start_time: Instant::now(),
            task_summary,
        }
    }

    fn prefix(&self) -> String {
        format!(
            "{}{}[sc]{}",
            self.style.dim_start(),
            self.style.cyan_start(),
            self.style.reset()
        )
    }

    /// Emit the start boundary line (persists).
    pub fn emit_start(&mut self) {
        let _ = writeln!(
            self.writer,
            "{} --- \"{}\"",
            self.prefix(),
            self.task_summary
        );
    }

    /// Waiting for the relay to answer (overwritten in TTY mode).
    pub fn emit_waiting(&mut self, url: &str) {
        if self.is_tty {
            let _ = write!(
                self.writer,
                "\r\x1b[K{} {}sending to {url}...{}",
                self.prefix(),
                self.style.dim_start(),
                self.style.reset()
            );
        } else {
            let _ = writeln!(self.writer, "{} sending to {url}", self.prefix());
        }
        let _ = self.writer.flush();
    }

    /// The reply started; clear the waiting line.
    pub fn emit_receiving(&mut self) {
        if self.is_tty {
            let _ = write!(self.writer, "\r\x1b[K");
            let _ = self.writer.flush();
        }
    }

    /// Emit an error (persists, red).
    pub fn emit_error(&mut self, msg: &str) {
        let clear = if self.is_tty { "\r\x1b[K" } else { "" };
        let _ = writeln!(
            self.writer,
            "{clear}{} {}error: {msg}{}",
            self.prefix(),
            self.style.red_start(),
            self.style.reset()
        );
    }

    /// Emit the done boundary line (persists).
    pub fn emit_done(&mut self, chars: usize) {
        let elapsed = self.start_time.elapsed().as_secs();
        let _ = writeln!(
            self.writer,
            "{} --- {}done ({elapsed}s, {chars} chars){}",
            self.prefix(),
            self.style.dim_start(),
            self.style.reset()
        );
    }
}

/// Feed one turn's updates through `session`, writing reply text to
/// `stdout` as it arrives. Returns the process exit code.
pub async fn drive_turn<S, O, E>(
    session: &mut ChatSession,
    updates: S,
    stdout: &mut O,
    status: &mut BatchOutput<E>,
) -> i32
where
    S: Stream<Item = TurnUpdate>,
    O: Write,
    E: Write,
{
    let mut updates = std::pin::pin!(updates);
    let mut ends_with_newline = true;

    while let Some(update) = updates.next().await {
        match update {
            TurnUpdate::Receiving => {
                session.start_streaming();
                status.emit_receiving();
            }
            TurnUpdate::Event(event) => {
                if let WireEvent::Delta(text) = &event {
                    let _ = stdout.write_all(text.as_bytes());
                    let _ = stdout.flush();
                    ends_with_newline = text.ends_with('\n');
                }
                if session.apply(event) != TurnState::Streaming {
                    break;
                }
            }
        }
    }

    if session.state().in_flight() {
        session.fail("stream ended without a result");
    }
    if !ends_with_newline {
        let _ = writeln!(stdout);
    }

    match session.state() {
        TurnState::Completed => {
            status.emit_done(session.buffers().full().chars().count());
            0
        }
        _ => {
            let message = session
                .conversation()
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            status.emit_error(&message);
            1
        }
    }
}

/// Run one prompt against the relay at `client`. Returns the exit code.
pub async fn run_batch(client: &ChatClient, prompt: &str) -> i32 {
    let is_tty = std::io::stderr().is_terminal();
    let mut status = BatchOutput::new(std::io::stderr(), is_tty, prompt);

    let mut session = ChatSession::new();
    let request = match session.submit(prompt) {
        Ok(request) => request,
        Err(e) => {
            status.emit_error(&e.to_string());
            return 1;
        }
    };

    status.emit_start();
    status.emit_waiting(client.url());

    let mut stdout = std::io::stdout().lock();
    drive_turn(&mut session, client.turn(request), &mut stdout, &mut status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn make_output(is_tty: bool, prompt: &str) -> BatchOutput<Vec<u8>> {
        BatchOutput::new(Vec::new(), is_tty, prompt)
    }

    fn output_str(output: &BatchOutput<Vec<u8>>) -> String {
        String::from_utf8_lossy(&output.writer).to_string()
    }

    fn delta(s: &str) -> TurnUpdate {
        TurnUpdate::Event(WireEvent::Delta(s.to_string()))
    }

    async fn drive(updates: Vec<TurnUpdate>) -> (i32, String, String) {
        let mut session = ChatSession::new();
        session.submit("prompt").unwrap();
        let mut stdout = Vec::new();
        let mut status = make_output(false, "prompt");
        let code = drive_turn(&mut session, stream::iter(updates), &mut stdout, &mut status).await;
        (
            code,
            String::from_utf8(stdout).unwrap(),
            output_str(&status),
        )
    }

    #[test]
    fn start_has_boundary_and_summary() {
        let mut out = make_output(false, "explain lifetimes");
        out.emit_start();
        let s = output_str(&out);
        assert_eq!(s, "[sc] --- \"explain lifetimes\"\n");
    }

    #[test]
    fn long_prompt_is_truncated() {
        let long = "x".repeat(100);
        let mut out = make_output(false, &long);
        out.emit_start();
        assert!(output_str(&out).contains(&format!("{}...", "x".repeat(60))));
    }

    #[test]
    fn tty_waiting_is_overwritable() {
        let mut out = make_output(true, "p");
        out.emit_waiting("http://relay/api/chat");
        let s = output_str(&out);
        assert!(s.starts_with("\r\x1b[K"));
        assert!(!s.ends_with('\n'));
    }

    #[test]
    fn non_tty_has_no_ansi() {
        let mut out = make_output(false, "p");
        out.emit_start();
        out.emit_waiting("http://relay/api/chat");
        out.emit_error("boom");
        out.emit_done(3);
        assert!(!output_str(&out).contains('\x1b'));
    }

    #[tokio::test]
    async fn completed_turn_exits_zero() {
        let (code, stdout, status) = drive(vec![
            TurnUpdate::Receiving,
            delta("Hel"),
            delta("lo"),
            TurnUpdate::Event(WireEvent::Done),
        ])
        .await;
        assert_eq!(code, 0);
        assert_eq!(stdout, "Hello\n");
        assert!(status.contains("done"));
    }

    #[tokio::test]
    async fn raw_text_is_not_rendered() {
        let (code, stdout, _) = drive(vec![
            delta("```py\nx\n```\n"),
            TurnUpdate::Event(WireEvent::Done),
        ])
        .await;
        assert_eq!(code, 0);
        assert_eq!(stdout, "```py\nx\n```\n");
    }

    #[tokio::test]
    async fn error_exits_one_with_message() {
        let (code, stdout, status) = drive(vec![
            TurnUpdate::Receiving,
            TurnUpdate::Event(WireEvent::Error("upstream failed".to_string())),
        ])
        .await;
        assert_eq!(code, 1);
        assert_eq!(stdout, "");
        assert!(status.contains("error: upstream failed"));
    }

    #[tokio::test]
    async fn missing_terminal_is_a_failure() {
        let (code, stdout, status) = drive(vec![delta("partial")]).await;
        assert_eq!(code, 1);
        assert_eq!(stdout, "partial\n");
        assert!(status.contains("without a result"));
    }
}
