//! Persistence gateway trait — durable conversation state and audit trail.
//!
//! The coordinator saves and loads [`ConversationState`] snapshots keyed by
//! session id, and appends one audit entry per variable write. The bit-level
//! format is an implementation detail of the gateway, not of this core.
//!
//! Implementations: in-memory (tests, ephemeral sessions), JSONL files.
//! Consumers may supply their own (e.g. SQL-backed) without the coordinator
//! changing behavior.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::message::ConversationState;

/// The durable form of a single variable write, scoped per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableAuditEntry {
    /// Session the write belongs to.
    pub session_id: String,

    /// The variable that changed.
    pub variable: String,

    /// The value that was written.
    pub new_value: serde_json::Value,

    /// The agent that performed the write.
    pub updated_by: String,

    /// Writer-reported confidence in [0, 1].
    pub confidence: f64,

    /// When the write happened.
    pub timestamp: DateTime<Utc>,
}

/// The persistence gateway contract.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Save (overwrite) the state snapshot for a session.
    async fn save(
        &self,
        session_id: &str,
        state: &ConversationState,
    ) -> std::result::Result<(), PersistenceError>;

    /// Load the state snapshot for a session, if one exists.
    async fn load(
        &self,
        session_id: &str,
    ) -> std::result::Result<Option<ConversationState>, PersistenceError>;

    /// Whether a session has saved state.
    async fn exists(&self, session_id: &str) -> std::result::Result<bool, PersistenceError>;

    /// Append one audit entry to the session's trail.
    async fn append_audit(
        &self,
        entry: VariableAuditEntry,
    ) -> std::result::Result<(), PersistenceError>;

    /// Retrieve a session's audit trail in write order, optionally filtered
    /// to a single variable name.
    async fn query_audit(
        &self,
        session_id: &str,
        variable: Option<&str>,
    ) -> std::result::Result<Vec<VariableAuditEntry>, PersistenceError>;

    /// Export a session (state + audit) as an opaque blob.
    async fn backup(&self, session_id: &str) -> std::result::Result<Vec<u8>, PersistenceError>;

    /// Replace a session from a blob produced by [`Self::backup`].
    async fn restore(
        &self,
        session_id: &str,
        blob: &[u8],
    ) -> std::result::Result<(), PersistenceError>;

    /// Retention hook: drop sessions whose last write predates `cutoff`.
    /// Returns the number of sessions removed.
    async fn purge_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<usize, PersistenceError>;
}
