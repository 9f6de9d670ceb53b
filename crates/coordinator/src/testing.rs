//! Test support: a scripted agent handle.
//!
//! Each invocation returns the next scripted result in the queue. Panics
//! when the script is exhausted, so a test over-calling an agent fails
//! loudly.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use conclave_core::{AgentError, AgentHandle, AgentReply, CapturedVariable, ConversationMessage};

/// An [`AgentHandle`] that replays a scripted sequence of results.
pub struct ScriptedAgent {
    name: String,
    script: Mutex<VecDeque<Result<AgentReply, AgentError>>>,
    calls: Mutex<usize>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
        }
    }

    /// Queue a plain text reply.
    pub fn then_text(self, text: &str) -> Self {
        self.then_reply(AgentReply::text(text))
    }

    /// Queue a reply carrying variable captures.
    pub fn then_captures(self, text: &str, captures: Vec<CapturedVariable>) -> Self {
        self.then_reply(AgentReply {
            text: text.into(),
            captured: captures,
        })
    }

    /// Queue a full reply.
    pub fn then_reply(self, reply: AgentReply) -> Self {
        self.script.lock().unwrap().push_back(Ok(reply));
        self
    }

    /// Queue an invocation failure.
    pub fn then_failure(self, error: AgentError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// How many times this agent has been invoked.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AgentHandle for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _prompt: &str,
        _history: &[ConversationMessage],
    ) -> Result<AgentReply, AgentError> {
        *self.calls.lock().unwrap() += 1;
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!("ScriptedAgent '{}': script exhausted", self.name)
        })
    }
}

/// Shorthand for a capture entry.
pub fn capture(name: &str, value: serde_json::Value, confidence: f64) -> CapturedVariable {
    CapturedVariable {
        name: name.into(),
        value,
        confidence,
    }
}
