use std::fmt::Display;
use tokio::sync::watch;
use tracing::{error, info};

use crate::consumer::{AskClient, AskHandle, AskState};
use crate::models::message::Message;
use crate::models::role::Role;

/// What the backend needs to answer a freshly submitted question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub question: String,
    /// Conversation up to and including the new question, without the placeholder
    pub history: Vec<Message>,
}

/// The chat transcript of one viewer, and the only writer to it.
///
/// At most one answer streams at a time: while `pending` is set new questions are
/// ignored. Observers get a fresh copy of the transcript on every change through
/// [`ChatSession::subscribe`].
pub struct ChatSession {
    messages: Vec<Message>,
    pending: bool,
    updates: watch::Sender<Vec<Message>>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            messages: Vec::new(),
            pending: false,
            updates,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.messages.clone());
    }

    /// Start a new turn. Returns `None` for blank input or while an answer is
    /// still streaming.
    pub fn submit(&mut self, question: &str) -> Option<Submission> {
        let question = question.trim();
        if question.is_empty() || self.pending {
            return None;
        }

        self.pending = true;
        self.messages.push(Message::user(question));
        let history = self.messages.clone();
        self.messages.push(Message::placeholder());
        self.publish();

        Some(Submission {
            question: question.to_string(),
            history,
        })
    }

    /// Grow the streaming answer. Ignored unless the last message is the assistant's.
    pub fn append_chunk(&mut self, chunk: &str) {
        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant {
                last.append(chunk);
                self.publish();
            }
        }
    }

    /// Record a failed turn. An answer that never got any text is replaced by
    /// the error; partial answers are left as they are.
    pub fn fail(&mut self, err: &dyn Display) {
        if let Some(last) = self.messages.last_mut() {
            if last.is_placeholder() {
                last.content = format!("Error: {}. Please try again.", err);
                self.publish();
            }
        }
        self.pending = false;
    }

    pub fn finish(&mut self) {
        self.pending = false;
    }

    /// Run a whole turn: submit, stream the answer into the placeholder, and
    /// settle the pending flag whatever the outcome.
    pub async fn ask(
        &mut self,
        client: &AskClient,
        question: &str,
        handle: &AskHandle,
    ) -> Option<AskState> {
        let submission = self.submit(question)?;
        info!(
            video_id = client.video_id(),
            history = submission.history.len(),
            "asking"
        );

        let result = {
            let mut sink = |chunk: &str| self.append_chunk(chunk);
            client
                .ask(&submission.question, &submission.history, handle, &mut sink)
                .await
        };

        let state = match result {
            Ok(state) => state,
            Err(e) => {
                error!("ask failed: {}", e);
                self.fail(&e);
                AskState::Failed
            }
        };
        self.finish();
        Some(state)
    }
}
