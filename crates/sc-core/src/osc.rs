//! OSC 52 clipboard writes.
//!
//! The terminal emulator owns the system clipboard; `ESC ] 52 ; c ; <base64>
//! BEL` asks it to store the payload. Works over SSH and inside tmux (with
//! `set-clipboard on`).

use std::io::{self, Write};

use base64::Engine;

/// Encode `text` as an OSC 52 set-clipboard sequence.
pub fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x07")
}

/// Write the sequence for `text` and flush.
pub fn copy_to_clipboard<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    writer.write_all(osc52_sequence(text).as_bytes())?;
    writer.flush()
}
