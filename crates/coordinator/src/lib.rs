//! The conversation coordinator — one turn at a time.
//!
//! The coordinator owns the registered agents, the active variable store,
//! and the selection strategy, and drives the turn cycle:
//! select agent → build prompt → invoke agent → record results → persist.
//!
//! # Failure discipline
//!
//! The agent invocation is the only await point in a turn, and nothing is
//! written to the store or the message log until it has completed and its
//! captures have been validated. A failed or cancelled invocation therefore
//! leaves the conversation exactly as it was before the turn.
//!
//! # Concurrency
//!
//! One coordinator drives one conversation; callers serialize turns against
//! a given instance. Independent coordinators (distinct conversations) run
//! fully in parallel with no shared state — except a selection strategy,
//! which may be shared deliberately (the rotating strategy is built for it).

pub mod testing;
mod turn;

pub use turn::{TurnPhase, TurnReply};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use conclave_core::event::{DomainEvent, EventBus};
use conclave_core::persistence::{PersistenceGateway, VariableAuditEntry};
use conclave_core::variable::Ownership;
use conclave_core::{
    AgentHandle, AgentRegistration, ConversationMessage, ConversationState, Error, Progress,
    Result, StoreError,
};
use conclave_prompt::{PromptAssembler, PromptTemplate};
use conclave_selection::SelectionStrategy;
use conclave_store::VariableStore;

struct AgentRecord {
    registration: AgentRegistration,
    handle: Arc<dyn AgentHandle>,
}

/// Orchestrates a single multi-agent conversation.
pub struct Coordinator {
    session_id: String,
    agents: Vec<AgentRecord>,
    store: VariableStore,
    assembler: PromptAssembler,
    strategy: Arc<dyn SelectionStrategy>,
    gateway: Arc<dyn PersistenceGateway>,
    event_bus: Arc<EventBus>,
    messages: Vec<ConversationMessage>,
    max_log_messages: Option<usize>,
    continuity: bool,
    current_agent: Option<String>,
    phase: TurnPhase,
    teardowns: Vec<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl Coordinator {
    /// Create a coordinator for one conversation session. The event bus is
    /// an explicit dependency; there is no process-wide telemetry hook.
    pub fn new(
        session_id: impl Into<String>,
        strategy: Arc<dyn SelectionStrategy>,
        gateway: Arc<dyn PersistenceGateway>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            agents: Vec::new(),
            store: VariableStore::new(),
            assembler: PromptAssembler::default(),
            strategy,
            gateway,
            event_bus,
            messages: Vec::new(),
            max_log_messages: None,
            continuity: true,
            current_agent: None,
            phase: TurnPhase::Idle,
            teardowns: Vec::new(),
            closed: false,
        }
    }

    /// Use a custom prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.assembler = PromptAssembler::new(template);
        self
    }

    /// Bound the message log; the oldest messages are evicted first.
    pub fn with_max_log_messages(mut self, max: usize) -> Self {
        self.max_log_messages = Some(max);
        self
    }

    /// Enable or disable the continuity heuristic (enabled by default).
    pub fn with_continuity(mut self, enabled: bool) -> Self {
        self.continuity = enabled;
        self
    }

    // --- Registration ---

    /// Register an agent. Fails with `DuplicateAgent` if the name is taken.
    pub fn register_agent(
        &mut self,
        registration: AgentRegistration,
        handle: Arc<dyn AgentHandle>,
    ) -> Result<()> {
        if self.agents.iter().any(|a| a.registration.name == registration.name) {
            return Err(Error::DuplicateAgent(registration.name));
        }
        debug!(agent = %registration.name, "Agent registered");
        self.agents.push(AgentRecord { registration, handle });
        Ok(())
    }

    /// Toggle an agent's selection eligibility. Inactive agents are never
    /// selected; removal is not needed for correctness.
    pub fn set_agent_active(&mut self, name: &str, active: bool) -> Result<()> {
        let record = self
            .agents
            .iter_mut()
            .find(|a| a.registration.name == name)
            .ok_or_else(|| Error::InvalidArgument(format!("agent '{name}' is not registered")))?;
        record.registration.is_active = active;
        Ok(())
    }

    pub fn registrations(&self) -> Vec<&AgentRegistration> {
        self.agents.iter().map(|a| &a.registration).collect()
    }

    // --- Store access ---

    /// Declare a conversation variable on the active store.
    pub fn declare_variable(
        &mut self,
        name: impl Into<String>,
        owned_by: Ownership,
        description: impl Into<String>,
        required: bool,
        default_value: Option<serde_json::Value>,
    ) {
        self.store.declare(name, owned_by, description, required, default_value);
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VariableStore {
        &mut self.store
    }

    // --- Inspection ---

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The agent selected by the most recent successful turn.
    pub fn current_agent_name(&self) -> Option<&str> {
        self.current_agent.as_deref()
    }

    pub fn current_phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Completion accounting, recomputed on demand.
    pub fn progress(&self) -> Progress {
        self.store.progress()
    }

    /// Human-readable progress with fractions and rounded percentages.
    pub fn progress_report(&self) -> String {
        self.progress().to_string()
    }

    // --- Persistence ---

    /// Load previously persisted state for this session, if any. Returns
    /// whether a snapshot existed.
    pub async fn resume(&mut self) -> Result<bool> {
        let Some(state) = self.gateway.load(&self.session_id).await? else {
            return Ok(false);
        };
        self.store.load_snapshot(state.variables);
        self.messages = state.messages;
        info!(
            session_id = %self.session_id,
            messages = self.messages.len(),
            variables = self.store.len(),
            "Session restored"
        );
        Ok(true)
    }

    // --- Resource lifecycle ---

    /// Attach a disposable resource's release action. Teardowns run on
    /// [`Self::close`] in reverse acquisition order.
    pub fn register_teardown(&mut self, teardown: impl FnOnce() + Send + 'static) {
        self.teardowns.push(Box::new(teardown));
    }

    /// End the conversation: run teardowns (reverse order), then refuse
    /// further turns. Safe to call more than once.
    pub fn close(&mut self) {
        while let Some(teardown) = self.teardowns.pop() {
            teardown();
        }
        if !self.closed {
            info!(session_id = %self.session_id, "Conversation closed");
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // --- The turn ---

    /// Drive one conversation turn for `input`.
    ///
    /// Fails with `EmptyInput` on blank input before any state changes.
    /// With zero active agents, returns a graceful unavailability reply
    /// instead of an error. An invocation failure propagates with its cause
    /// attached and leaves store and log unmodified.
    pub async fn process_message(&mut self, input: &str) -> Result<TurnReply> {
        if self.closed {
            return Err(Error::ConversationClosed);
        }
        if input.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let active: Vec<AgentRegistration> = self
            .agents
            .iter()
            .filter(|a| a.registration.is_active)
            .map(|a| a.registration.clone())
            .collect();
        if active.is_empty() {
            warn!(session_id = %self.session_id, "No active agents registered");
            return Ok(TurnReply::unavailable());
        }

        let started = Instant::now();
        let user_message = ConversationMessage::user(input);

        // ── Selecting ──
        self.phase = TurnPhase::Selecting;
        let mut selection_history = self.messages.clone();
        selection_history.push(user_message.clone());

        let (selected, via) = match self.continuity_pick(&active, input) {
            Some(agent) => (agent, "continuity".to_string()),
            None => {
                let agent = match self.strategy.select_next(&active, &selection_history, &self.store) {
                    Ok(agent) => agent,
                    Err(e) => {
                        self.phase = TurnPhase::Idle;
                        return Err(e.into());
                    }
                };
                (agent, self.strategy.name().to_string())
            }
        };
        debug!(session_id = %self.session_id, agent = %selected, via = %via, "Agent selected");
        self.event_bus.publish(DomainEvent::AgentSelected {
            session_id: self.session_id.clone(),
            agent: selected.clone(),
            strategy: via,
            timestamp: Utc::now(),
        });

        // ── Prompting ──
        self.phase = TurnPhase::Prompting;
        let prompt = match self.assembler.build_for_agent(&selected, &self.store) {
            Ok(p) => p,
            Err(e) => {
                self.phase = TurnPhase::Idle;
                return Err(e);
            }
        };
        let handle = match self.agents.iter().find(|a| a.registration.name == selected) {
            Some(record) => Arc::clone(&record.handle),
            None => {
                self.phase = TurnPhase::Idle;
                return Err(Error::InvalidArgument(format!(
                    "strategy selected unregistered agent '{selected}'"
                )));
            }
        };

        // ── Invoking ── (the only suspension point; no state written yet)
        self.phase = TurnPhase::Invoking;
        let reply = match handle.invoke(&prompt, &selection_history).await {
            Ok(reply) => reply,
            Err(source) => {
                self.phase = TurnPhase::Idle;
                self.event_bus.publish(DomainEvent::TurnFailed {
                    session_id: self.session_id.clone(),
                    context: format!("invoking agent '{selected}'"),
                    error_message: source.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(Error::AgentInvocation {
                    agent: selected,
                    source,
                });
            }
        };

        // ── Recording ──
        self.phase = TurnPhase::Recording;
        if let Err(e) = self.validate_captures(&selected, &reply.captured) {
            self.phase = TurnPhase::Idle;
            self.event_bus.publish(DomainEvent::TurnFailed {
                session_id: self.session_id.clone(),
                context: format!("applying captures from agent '{selected}'"),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            return Err(e.into());
        }

        self.store.set_executing_agent(&selected);
        let mut audit_entries = Vec::with_capacity(reply.captured.len());
        for cap in &reply.captured {
            // Validated above; a failure here is a logic error, not a turn
            // hazard, so it still surfaces.
            self.store.write(&cap.name, cap.value.clone(), cap.confidence)?;
            audit_entries.push(VariableAuditEntry {
                session_id: self.session_id.clone(),
                variable: cap.name.clone(),
                new_value: cap.value.clone(),
                updated_by: selected.clone(),
                confidence: cap.confidence,
                timestamp: Utc::now(),
            });
            self.event_bus.publish(DomainEvent::VariableWritten {
                session_id: self.session_id.clone(),
                variable: cap.name.clone(),
                agent: selected.clone(),
                confidence: cap.confidence,
                timestamp: Utc::now(),
            });
        }

        self.push_message(user_message);
        self.push_message(ConversationMessage::agent(&selected, &reply.text));

        let state = ConversationState {
            variables: self.store.snapshot(),
            messages: self.messages.clone(),
            complete: self.store.progress().is_complete,
        };
        self.gateway.save(&self.session_id, &state).await?;
        for entry in audit_entries {
            self.gateway.append_audit(entry).await?;
        }

        self.current_agent = Some(selected.clone());
        self.phase = TurnPhase::Idle;
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            session_id = %self.session_id,
            agent = %selected,
            duration_ms,
            captures = reply.captured.len(),
            "Turn completed"
        );
        self.event_bus.publish(DomainEvent::TurnCompleted {
            session_id: self.session_id.clone(),
            agent: selected.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(TurnReply::answered(selected, reply.text))
    }

    /// Keep the previous agent when it is still active and the input carries
    /// no strong signal to switch: no other agent matches the input's
    /// keywords strictly better, and no other agent is left waiting on
    /// variables while the previous agent has none to collect.
    fn continuity_pick(&self, active: &[AgentRegistration], input: &str) -> Option<String> {
        if !self.continuity {
            return None;
        }
        let prev = self.current_agent.as_deref()?;
        let prev_reg = active.iter().find(|a| a.name == prev)?;

        let prev_matches = prev_reg.keyword_matches(input);
        let better_match = active
            .iter()
            .any(|a| a.name != prev && a.keyword_matches(input) > prev_matches);
        if better_match {
            return None;
        }

        if self.store.list_missing(prev).is_empty() {
            let other_needs = active
                .iter()
                .any(|a| a.name != prev && !self.store.list_missing(&a.name).is_empty());
            if other_needs {
                return None;
            }
        }

        Some(prev.to_string())
    }

    /// Check every capture against declaration and ownership before any
    /// write, so a rejected capture leaves the store untouched.
    fn validate_captures(
        &self,
        agent: &str,
        captures: &[conclave_core::CapturedVariable],
    ) -> std::result::Result<(), StoreError> {
        for cap in captures {
            let var = self.store.get(&cap.name).ok_or_else(|| StoreError::UnknownVariable {
                name: cap.name.clone(),
            })?;
            if !var.owned_by.permits(agent) {
                return Err(StoreError::OwnershipViolation {
                    agent: agent.to_string(),
                    variable: cap.name.clone(),
                    owner: var.owned_by.to_string(),
                });
            }
        }
        Ok(())
    }

    fn push_message(&mut self, message: ConversationMessage) {
        self.messages.push(message);
        if let Some(max) = self.max_log_messages {
            while self.messages.len() > max {
                self.messages.remove(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAgent;
    use conclave_selection::RotatingStrategy;

    // The coordinator's full turn behavior is covered by the integration
    // suite in `tests/`; these tests pin the synchronous surface.

    fn coordinator() -> Coordinator {
        Coordinator::new(
            "sess-unit",
            Arc::new(RotatingStrategy::new()),
            Arc::new(NullGateway),
            Arc::new(EventBus::default()),
        )
    }

    /// A gateway that accepts everything and remembers nothing.
    struct NullGateway;

    #[async_trait::async_trait]
    impl PersistenceGateway for NullGateway {
        fn name(&self) -> &str {
            "null"
        }
        async fn save(
            &self,
            _: &str,
            _: &ConversationState,
        ) -> std::result::Result<(), conclave_core::PersistenceError> {
            Ok(())
        }
        async fn load(
            &self,
            _: &str,
        ) -> std::result::Result<Option<ConversationState>, conclave_core::PersistenceError>
        {
            Ok(None)
        }
        async fn exists(
            &self,
            _: &str,
        ) -> std::result::Result<bool, conclave_core::PersistenceError> {
            Ok(false)
        }
        async fn append_audit(
            &self,
            _: VariableAuditEntry,
        ) -> std::result::Result<(), conclave_core::PersistenceError> {
            Ok(())
        }
        async fn query_audit(
            &self,
            _: &str,
            _: Option<&str>,
        ) -> std::result::Result<Vec<VariableAuditEntry>, conclave_core::PersistenceError>
        {
            Ok(Vec::new())
        }
        async fn backup(
            &self,
            _: &str,
        ) -> std::result::Result<Vec<u8>, conclave_core::PersistenceError> {
            Ok(Vec::new())
        }
        async fn restore(
            &self,
            _: &str,
            _: &[u8],
        ) -> std::result::Result<(), conclave_core::PersistenceError> {
            Ok(())
        }
        async fn purge_older_than(
            &self,
            _: chrono::DateTime<Utc>,
        ) -> std::result::Result<usize, conclave_core::PersistenceError> {
            Ok(0)
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut coord = coordinator();
        coord
            .register_agent(
                AgentRegistration::new("a", "alpha"),
                Arc::new(ScriptedAgent::new("a")),
            )
            .unwrap();
        let err = coord
            .register_agent(
                AgentRegistration::new("a", "alpha again"),
                Arc::new(ScriptedAgent::new("a")),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAgent(name) if name == "a"));
    }

    #[test]
    fn toggling_unknown_agent_fails() {
        let mut coord = coordinator();
        assert!(coord.set_agent_active("ghost", false).is_err());
    }

    #[test]
    fn teardowns_run_in_reverse_order_and_close_is_idempotent() {
        use std::sync::Mutex;

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut coord = coordinator();
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            coord.register_teardown(move || order.lock().unwrap().push(label));
        }

        coord.close();
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(coord.is_closed());

        // Releasing again must not run anything twice or error
        coord.close();
        assert_eq!(order.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn closed_coordinator_refuses_turns() {
        let mut coord = coordinator();
        coord.close();
        let err = coord.process_message("hello").await.unwrap_err();
        assert!(matches!(err, Error::ConversationClosed));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_state_change() {
        let mut coord = coordinator();
        let err = coord.process_message("   ").await.unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
        assert!(coord.messages().is_empty());
        assert_eq!(coord.current_phase(), TurnPhase::Idle);
    }

    #[test]
    fn progress_report_renders_fractions() {
        let mut coord = coordinator();
        coord.declare_variable("a", Ownership::Any, "", true, None);
        coord.declare_variable("b", Ownership::Any, "", false, None);
        coord.store_mut().set_executing_agent("x");
        coord.store_mut().write("a", serde_json::json!(1), 1.0).unwrap();

        let report = coord.progress_report();
        assert!(report.contains("1/2"));
        assert!(report.contains("1/1"));
    }
}
