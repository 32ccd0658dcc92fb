//! The ordered message history of a chat.

use sc_protocol::Message;

/// Owned, versioned message list. The only mutations are appending a
/// message and replacing the content of the last one; every mutation bumps
/// the version so views can tell when to redraw.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    version: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.version += 1;
    }

    /// Overwrite the last message's content. Returns `false` when empty.
    pub fn replace_last(&mut self, content: impl Into<String>) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.content = content.into();
                self.version += 1;
                true
            }
            None => false,
        }
    }
}
