use super::role::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single turn of a conversation about a video
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Empty assistant message that streamed chunks are appended to
    pub fn placeholder() -> Self {
        Message::assistant("")
    }

    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty()
    }

    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }
}
