//! Agent selection strategies — who speaks next.
//!
//! A [`SelectionStrategy`] picks the next agent to act, given the current
//! candidates, the conversation history, and the variable store. Strategies
//! operate only over active candidates and fail with
//! [`SelectionError::NoActiveCandidates`] when none remain.
//!
//! Implementations:
//! - [`RotatingStrategy`] — round-robin, safe to share across threads
//! - [`CapabilityStrategy`] — keyword match against each agent's expertise
//! - [`PerformanceStrategy`] — highest externally supplied score wins
//! - [`ConditionalStrategy`] — first matching predicate rule, else a default

pub mod capability;
pub mod conditional;
pub mod performance;
pub mod rotating;

pub use capability::CapabilityStrategy;
pub use conditional::ConditionalStrategy;
pub use performance::PerformanceStrategy;
pub use rotating::RotatingStrategy;

use conclave_core::{AgentRegistration, ConversationMessage, SelectionError};
use conclave_store::VariableStore;

/// The common selection contract.
pub trait SelectionStrategy: Send + Sync {
    /// A short strategy name for logging and telemetry.
    fn name(&self) -> &str;

    /// Pick the next agent from `candidates`. Inactive candidates are never
    /// returned.
    fn select_next(
        &self,
        candidates: &[AgentRegistration],
        history: &[ConversationMessage],
        store: &VariableStore,
    ) -> Result<String, SelectionError>;
}

/// Active candidates in registration order.
pub(crate) fn active<'a>(candidates: &'a [AgentRegistration]) -> Vec<&'a AgentRegistration> {
    candidates.iter().filter(|c| c.is_active).collect()
}

/// The task input a content-sensitive strategy evaluates: the most recent
/// user message in the history.
pub fn last_user_input(history: &[ConversationMessage]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.message_type == "user")
        .map(|m| m.content.as_str())
}

#[cfg(test)]
pub(crate) mod test_support {
    use conclave_core::AgentRegistration;

    pub fn agents(names: &[&str]) -> Vec<AgentRegistration> {
        names
            .iter()
            .map(|n| AgentRegistration::new(*n, format!("{n} expertise")))
            .collect()
    }
}
