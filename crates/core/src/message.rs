//! Message log and persisted conversation state.
//!
//! These are the value objects that flow through the coordinator:
//! a caller submits a message → an agent answers → both land in the shared,
//! append-only, chronological message log. The full log plus the variable
//! set forms the persisted [`ConversationState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::variable::Variable;

/// A single entry in the shared conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: String,

    /// Who produced this message (agent name, or "user").
    pub agent_name: String,

    /// The text content.
    pub content: String,

    /// Kind of message: "agent" (default), "user", or "system".
    #[serde(default = "default_message_type")]
    pub message_type: String,

    /// Set at construction.
    pub timestamp: DateTime<Utc>,

    /// Open key/value metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_message_type() -> String {
    "agent".to_string()
}

impl ConversationMessage {
    /// Create a message attributed to an agent.
    pub fn agent(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_name: agent_name.into(),
            content: content.into(),
            message_type: default_message_type(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a message attributed to the end user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_name: "user".into(),
            content: content.into(),
            message_type: "user".into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_name: "system".into(),
            content: content.into(),
            message_type: "system".into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Snapshot of a conversation: all variables (with history), the message
/// log, and a completion marker. This is the unit the persistence gateway
/// saves and loads, keyed by session id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// All declared variables, in declaration order.
    #[serde(default)]
    pub variables: Vec<Variable>,

    /// The message log, oldest first.
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,

    /// Whether every required variable was filled at snapshot time.
    #[serde(default)]
    pub complete: bool,
}

impl ConversationState {
    /// Append a message, evicting the oldest entries when a bound is set.
    pub fn push_bounded(&mut self, message: ConversationMessage, max_messages: Option<usize>) {
        self.messages.push(message);
        if let Some(max) = max_messages {
            while self.messages.len() > max {
                self.messages.remove(0);
            }
        }
    }
}
