//! Persistence gateway implementations for Conclave.
//!
//! Two backends ship here: an in-memory gateway for tests and ephemeral
//! sessions, and a JSONL file gateway for durable local state. Both speak
//! the [`conclave_core::PersistenceGateway`] contract; SQL-backed or remote
//! gateways are external collaborators that implement the same trait.

pub mod file;
pub mod in_memory;

pub use file::FileGateway;
pub use in_memory::InMemoryGateway;

use chrono::{DateTime, Utc};
use conclave_core::{ConversationState, VariableAuditEntry};
use serde::{Deserialize, Serialize};

/// What a gateway holds per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SessionRecord {
    pub state: ConversationState,
    pub audit: Vec<VariableAuditEntry>,
    pub updated_at: DateTime<Utc>,
}

/// The opaque backup format: state plus audit trail, JSON-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SessionBlob {
    pub state: ConversationState,
    #[serde(default)]
    pub audit: Vec<VariableAuditEntry>,
}
