//! In-memory gateway — useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use conclave_core::persistence::{PersistenceGateway, VariableAuditEntry};
use conclave_core::{ConversationState, PersistenceError};

use crate::{SessionBlob, SessionRecord};

/// A gateway that keeps every session in a map. Nothing survives process
/// exit; coordinator behavior is otherwise identical to durable backends.
pub struct InMemoryGateway {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(
        &self,
        session_id: &str,
        state: &ConversationState,
    ) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.entry(session_id.to_string()).or_default();
        record.state = state.clone();
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, PersistenceError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).map(|r| r.state.clone()))
    }

    async fn exists(&self, session_id: &str) -> Result<bool, PersistenceError> {
        Ok(self.sessions.read().await.contains_key(session_id))
    }

    async fn append_audit(&self, entry: VariableAuditEntry) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.entry(entry.session_id.clone()).or_default();
        record.audit.push(entry);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn query_audit(
        &self,
        session_id: &str,
        variable: Option<&str>,
    ) -> Result<Vec<VariableAuditEntry>, PersistenceError> {
        let sessions = self.sessions.read().await;
        let Some(record) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        Ok(record
            .audit
            .iter()
            .filter(|e| variable.is_none_or(|v| e.variable == v))
            .cloned()
            .collect())
    }

    async fn backup(&self, session_id: &str) -> Result<Vec<u8>, PersistenceError> {
        let sessions = self.sessions.read().await;
        let record = sessions
            .get(session_id)
            .ok_or_else(|| PersistenceError::SessionNotFound(session_id.to_string()))?;
        let blob = SessionBlob {
            state: record.state.clone(),
            audit: record.audit.clone(),
        };
        serde_json::to_vec(&blob).map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    async fn restore(&self, session_id: &str, blob: &[u8]) -> Result<(), PersistenceError> {
        let blob: SessionBlob = serde_json::from_slice(blob)
            .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.to_string(),
            SessionRecord {
                state: blob.state,
                audit: blob.audit,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.updated_at >= cutoff);
        Ok(before - sessions.len())
    }
}
