//! The per-turn state machine driving one chat.
//!
//! `Idle → Sending → Streaming → {Completed, Failed}`. A new turn may start
//! from `Idle`, `Completed` or `Failed`. Only this type writes to the
//! conversation and the stream buffers.

use std::collections::{BTreeMap, BTreeSet};

use sc_protocol::{ChatRequest, Message, WireEvent};
use thiserror::Error;

use crate::buffers::StreamBuffers;
use crate::conversation::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl TurnState {
    pub fn in_flight(self) -> bool {
        matches!(self, TurnState::Sending | TurnState::Streaming)
    }

    pub fn label(self) -> &'static str {
        match self {
            TurnState::Idle => "ready",
            TurnState::Sending => "sending…",
            TurnState::Streaming => "streaming…",
            TurnState::Completed => "done",
            TurnState::Failed => "failed",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message is empty")]
    Empty,
    #[error("a reply is still streaming")]
    Busy,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    conversation: Conversation,
    buffers: StreamBuffers,
    state: TurnState,
    failed: BTreeSet<usize>,
    /// Safe prefix length of replies that completed with an open fence or
    /// math block.
    unbalanced: BTreeMap<usize, usize>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            conversation: Conversation::new(),
            buffers: StreamBuffers::new(),
            state: TurnState::Idle,
            failed: BTreeSet::new(),
            unbalanced: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn buffers(&self) -> &StreamBuffers {
        &self.buffers
    }

    pub fn input_enabled(&self) -> bool {
        !self.state.in_flight()
    }

    /// Index of the assistant message currently receiving text.
    pub fn streaming_index(&self) -> Option<usize> {
        if self.state.in_flight() {
            self.conversation.len().checked_sub(1)
        } else {
            None
        }
    }

    /// The part of the message at `index` that may go through Markdown,
    /// and the literal tail after it. The tail is empty for balanced
    /// messages.
    pub fn split(&self, index: usize) -> (&str, &str) {
        if self.streaming_index() == Some(index) {
            return (self.buffers.safe(), self.buffers.tail());
        }
        let Some(message) = self.conversation.messages().get(index) else {
            return ("", "");
        };
        match self.unbalanced.get(&index) {
            Some(&len) if message.content.is_char_boundary(len) => message.content.split_at(len),
            _ => (message.content.as_str(), ""),
        }
    }

    /// Whether the message at `index` holds an error instead of a reply.
    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }

    /// Start a turn: append the user message and an empty assistant
    /// placeholder, and return the request to send. The request carries the
    /// history up to and including the new user message.
    pub fn submit(&mut self, input: &str) -> Result<ChatRequest, SubmitError> {
        if self.state.in_flight() {
            return Err(SubmitError::Busy);
        }
        let text = input.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }

        self.conversation.push(Message::user(text));
        let request = ChatRequest::new(self.conversation.messages().to_vec());
        self.conversation.push(Message::assistant(""));
        self.buffers.reset();
        self.state = TurnState::Sending;

        tracing::debug!(messages = request.messages.len(), "turn submitted");
        Ok(request)
    }

    /// The relay answered; bytes are arriving.
    pub fn start_streaming(&mut self) {
        if self.state == TurnState::Sending {
            self.state = TurnState::Streaming;
        }
    }

    /// Apply one decoded event. Events outside an in-flight turn are
    /// dropped.
    pub fn apply(&mut self, event: WireEvent) -> TurnState {
        if !self.state.in_flight() {
            tracing::debug!(?event, state = ?self.state, "ignoring event outside a turn");
            return self.state;
        }

        match event {
            WireEvent::Delta(text) => {
                self.state = TurnState::Streaming;
                self.buffers.append(&text);
                self.conversation.replace_last(self.buffers.full());
            }
            WireEvent::Error(message) => {
                tracing::debug!(%message, "turn failed");
                self.conversation.replace_last(message);
                if let Some(index) = self.conversation.len().checked_sub(1) {
                    self.failed.insert(index);
                }
                self.finish(TurnState::Failed);
            }
            WireEvent::Done => {
                self.finish(TurnState::Completed);
            }
        }
        self.state
    }

    /// End the in-flight turn locally with `message`.
    pub fn fail(&mut self, message: impl Into<String>) -> TurnState {
        self.apply(WireEvent::Error(message.into()))
    }

    fn finish(&mut self, state: TurnState) {
        self.buffers.recompute();
        if state == TurnState::Completed && !self.buffers.tail().is_empty() {
            if let Some(index) = self.conversation.len().checked_sub(1) {
                tracing::debug!(index, "reply completed unbalanced");
                self.unbalanced.insert(index, self.buffers.safe().len());
            }
        }
        self.state = state;
    }
}
