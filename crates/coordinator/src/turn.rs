//! Turn-level value objects: the phase machine and the caller-facing reply.

/// Where the coordinator is inside one conversation turn.
///
/// A turn runs `Idle → Selecting → Prompting → Invoking → Recording → Idle`;
/// the conversation only terminates when explicitly closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Selecting,
    Prompting,
    Invoking,
    Recording,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Selecting => "selecting",
            TurnPhase::Prompting => "prompting",
            TurnPhase::Invoking => "invoking",
            TurnPhase::Recording => "recording",
        };
        write!(f, "{s}")
    }
}

/// What `process_message` hands back to the caller.
#[derive(Debug, Clone)]
pub struct TurnReply {
    /// The agent that answered, or `None` on the graceful no-agents path.
    pub agent: Option<String>,

    /// The agent's textual response (or the unavailability notice).
    pub text: String,
}

impl TurnReply {
    pub(crate) fn answered(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent: Some(agent.into()),
            text: text.into(),
        }
    }

    /// The graceful response when no active agents are registered. A normal
    /// return, deliberately not an error, so the conversational loop stays
    /// usable while mis-configured.
    pub(crate) fn unavailable() -> Self {
        Self {
            agent: None,
            text: "No agents are currently available to handle this message. \
                   Register or activate an agent and try again."
                .into(),
        }
    }
}
