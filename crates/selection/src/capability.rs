//! Capability-keyword selection.
//!
//! Matches the task input (the most recent user message) against each active
//! agent's expertise keyword set, case-insensitively. The agent with the most
//! matching keywords wins; ties break in registration order.

use conclave_core::{AgentRegistration, ConversationMessage, SelectionError};
use conclave_store::VariableStore;
use tracing::debug;

use crate::{active, last_user_input, SelectionStrategy};

#[derive(Debug, Default)]
pub struct CapabilityStrategy;

impl CapabilityStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for CapabilityStrategy {
    fn name(&self) -> &str {
        "capability"
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

        // First-wins on ties keeps registration order authoritative.
        let mut best = active[0];
        let mut best_score = best.keyword_matches(input);
        for candidate in &active[1..] {
            let score = candidate.keyword_matches(input);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }

        debug!(agent = %best.name, score = best_score, "Capability selection");
        Ok(best.name.clone())
    }
}
