//! Agent registration metadata and the invocation contract.
//!
//! The coordinator never talks to a language model directly. It invokes an
//! [`AgentHandle`] — prompt in, text plus optional structured variable
//! captures out — and stays ignorant of how the handle is implemented
//! (model choice, retries, transport).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::message::ConversationMessage;

/// Default registration priority (mid-value tie-break).
pub const DEFAULT_PRIORITY: i32 = 50;

/// Metadata the coordinator keeps per registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// Unique agent name within one coordinator.
    pub name: String,

    /// Free-text capability description. Keyword-based selection derives
    /// its match set from this text.
    pub expertise: String,

    /// Inactive agents are skipped by every selection strategy.
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Tie-break used by some strategies; higher wins.
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl AgentRegistration {
    /// Register an active agent with default priority.
    pub fn new(name: impl Into<String>, expertise: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expertise: expertise.into(),
            is_active: true,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The agent's capability keyword set: lowercased words of the
    /// expertise text, punctuation stripped, short noise words dropped.
    pub fn expertise_keywords(&self) -> Vec<String> {
        self.expertise
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3)
            .map(|w| w.to_lowercase())
            .collect()
    }

    /// How many of this agent's keywords appear (case-insensitive) in `input`.
    pub fn keyword_matches(&self, input: &str) -> usize {
        let input_lower = input.to_lowercase();
        self.expertise_keywords()
            .iter()
            .filter(|kw| input_lower.contains(kw.as_str()))
            .count()
    }
}

/// A structured variable capture reported by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedVariable {
    /// Declared variable name.
    pub name: String,

    /// The captured value.
    pub value: serde_json::Value,

    /// Agent-reported confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// An agent's response to one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentReply {
    /// The textual response returned to the caller.
    pub text: String,

    /// Variables the agent claims to have captured this turn. Applied to
    /// the store under ownership rules by the coordinator, never here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<CapturedVariable>,
}

impl AgentReply {
    /// A plain text reply with no captures.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: content.into(),
            captured: Vec::new(),
        }
    }
}

/// The agent invocation contract (external collaborator).
///
/// Implementations wrap whatever actually produces the response: an LLM
/// client, a scripted mock, a remote service. The invocation is the only
/// suspension point in a conversation turn and must be cancel-safe: the
/// coordinator applies no state changes until it completes.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// The agent name this handle answers for.
    fn name(&self) -> &str;

    /// Invoke the agent with its assembled system prompt and the
    /// conversation history so far.
    async fn invoke(
        &self,
        prompt: &str,
        history: &[ConversationMessage],
    ) -> std::result::Result<AgentReply, AgentError>;
}
