//! Error types for the Conclave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Conclave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Variable store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Agent selection errors ---
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    // --- Persistence errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// An agent invocation failed. The store and message log are left
    /// unmodified for the failed turn; the underlying cause is attached.
    #[error("Agent '{agent}' invocation failed: {source}")]
    AgentInvocation {
        agent: String,
        #[source]
        source: AgentError,
    },

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Input message is empty or whitespace")]
    EmptyInput,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conversation has been closed")]
    ConversationClosed,

    /// A failed [`crate::Outcome`] converted into an error at the point of use.
    #[error("Operation failed: {0}")]
    Operation(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Read or write against a name that was never declared.
    #[error("variable '{name}' is not declared")]
    UnknownVariable { name: String },

    /// Write attempted by a non-owning agent. Never downgraded to a no-op.
    #[error("agent '{agent}' may not write variable '{variable}': it is owned by '{owner}'")]
    OwnershipViolation {
        agent: String,
        variable: String,
        owner: String,
    },

    /// A write was attempted before `set_executing_agent` was called.
    #[error("no executing agent set before writing variable '{variable}'")]
    NoExecutingAgent { variable: String },

    /// Typed read could not convert the stored value.
    #[error("variable '{name}' could not be converted: {reason}")]
    Conversion { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Every registered strategy fails this way on an empty active set.
    #[error("no active agents are available for selection")]
    NoActiveCandidates,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Corrupted session data: {0}")]
    Corrupted(String),
}

/// Failures produced by the external agent-invocation collaborator.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invocation failed: {0}")]
    Failed(String),

    #[error("invocation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("invocation was cancelled")]
    Cancelled,
}
