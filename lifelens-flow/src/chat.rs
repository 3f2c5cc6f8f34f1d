use serde::{Deserialize, Serialize};

use crate::state::WorkflowStage;

/// Greeting seeded into every fresh session.
pub const GREETING: &str = "Hi I am LifeLens!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
        }
    }
}

/// Append-only conversation history, seeded with the bot greeting.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    started: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::bot(GREETING)],
            started: false,
        }
    }

    /// Append a user message. The first one marks the session as started.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.started = true;
        self.messages.push(ChatMessage::user(text));
    }

    pub fn push_bot(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::bot(text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn started(&self) -> bool {
        self.started
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate predicate: chat opens once the analysis has completed.
pub fn chat_ready(stage: WorkflowStage) -> bool {
    stage >= WorkflowStage::AnalysisComplete
}
