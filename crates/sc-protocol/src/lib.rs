//! sc-protocol: Shared types and wire format for streamchat.
//!
//! This crate defines the conversation types sent from the client to the
//! relay, and the line-oriented event frames the relay streams back.

pub mod chat;
pub mod framer;
pub mod message;

pub use chat::{ChatRequest, Message, Role};
pub use framer::LineFramer;
pub use message::{decode_line, FrameError, WireEvent, DONE_SENTINEL};
