//! Performance-ranked selection.
//!
//! Scores are supplied externally (e.g. by an evaluation harness watching
//! past turns) and the active agent with the highest score wins. Agents
//! without a score rank at 0.0. Ties break in registration order.

use std::collections::HashMap;
use std::sync::RwLock;

use conclave_core::{AgentRegistration, ConversationMessage, SelectionError};
use conclave_store::VariableStore;

use crate::{active, SelectionStrategy};

#[derive(Debug, Default)]
pub struct PerformanceStrategy {
    scores: RwLock<HashMap<String, f64>>,
}

impl PerformanceStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an agent's current performance score.
    pub fn set_score(&self, agent: impl Into<String>, score: f64) {
        let mut scores = self.scores.write().unwrap_or_else(|e| e.into_inner());
        scores.insert(agent.into(), score);
    }

    pub fn score_of(&self, agent: &str) -> f64 {
        let scores = self.scores.read().unwrap_or_else(|e| e.into_inner());
        scores.get(agent).copied().unwrap_or(0.0)
    }
}

impl SelectionStrategy for PerformanceStrategy {
    fn name(&self) -> &str {
        "performance"
    }

    fn select_next(
        &self,
        candidates: &[AgentRegistration],
        _history: &[ConversationMessage],
        _store: &VariableStore,
    ) -> Result<String, SelectionError> {
        let active = active(candidates);
        if active.is_empty() {
            return Err(SelectionError::NoActiveCandidates);
        }

        let mut best = active[0];
        let mut best_score = self.score_of(&best.name);
        for candidate in &active[1..] {
            let score = self.score_of(&candidate.name);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        Ok(best.name.clone())
    }
}
