//! sc-core: the streamchat terminal client.
//!
//! Sends a conversation to the relay, consumes its `data:` frames, and
//! renders the reply while it streams: the longest prefix with balanced
//! code fences and math blocks goes through Markdown, the rest is shown
//! as literal text until it settles. Exposed as a library for integration
//! testing.

pub mod app;
pub mod batch;
pub mod buffers;
pub mod config;
pub mod conversation;
pub mod copy;
pub mod display;
pub mod markdown;
pub mod osc;
pub mod safety;
pub mod segment;
pub mod session;
pub mod style;
pub mod transport;
pub mod tui;
pub mod ui;
