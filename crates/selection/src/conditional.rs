//! Conditional-rule selection.
//!
//! An ordered list of `(predicate, agent)` rules is evaluated against the
//! task input; the first matching rule whose agent is active wins, otherwise
//! the explicitly supplied default agent is returned (if active).

use conclave_core::{AgentRegistration, ConversationMessage, SelectionError};
use conclave_store::VariableStore;

use crate::{active, last_user_input, SelectionStrategy};

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct ConditionalStrategy {
    rules: Vec<(Predicate, String)>,
    default_agent: String,
}

impl ConditionalStrategy {
    /// Create a strategy that falls back to `default_agent` when no rule
    /// matches.
    pub fn new(default_agent: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_agent: default_agent.into(),
        }
    }

    /// Append a rule. Rules are evaluated in insertion order.
    pub fn rule(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        agent: impl Into<String>,
    ) -> Self {
        self.rules.push((Box::new(predicate), agent.into()));
        self
    }
}

impl SelectionStrategy for ConditionalStrategy {
    fn name(&self) -> &str {
        "conditional"
    }

    fn select_next(
        &self,
        candidates: &[AgentRegistration],
        history: &[ConversationMessage],
        _store: &VariableStore,
    ) -> Result<String, SelectionError> {
        let active = active(candidates);
        if active.is_empty() {
            return Err(SelectionError::NoActiveCandidates);
        }

        let input = last_user_input(history).unwrap_or("");
        let is_active = |name: &str| active.iter().any(|a| a.name == name);

        for (predicate, agent) in &self.rules {
            if predicate(input) && is_active(agent) {
                return Ok(agent.clone());
            }
        }

        if is_active(&self.default_agent) {
            Ok(self.default_agent.clone())
        } else {
            Err(SelectionError::NoActiveCandidates)
        }
    }
}
