//! UI-agnostic conversation types
//!
//! These are shared by every front end (terminal UI, one-shot CLI commands)
//! and don't depend on any UI framework.

use serde::{Deserialize, Serialize};

use crate::api::types::{Citation, RagAnswer};

/// Prefix of assistant messages that record a failed send.
pub const ERROR_PREFIX: &str = "Error:";

/// A message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: text.to_string(),
            citations: Vec::new(),
        }
    }

    pub fn answer(answer: RagAnswer) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: answer.answer,
            citations: answer.citations,
        }
    }

    /// Assistant entry recording a failed send, so the transcript stays a
    /// single linear record including failures.
    pub fn error(detail: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: format!("{} {}", ERROR_PREFIX, detail),
            citations: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.role == ChatRole::Assistant && self.content.starts_with(ERROR_PREFIX)
    }
}
