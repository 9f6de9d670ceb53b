//! File-based gateway — durable JSON storage per session.
//!
//! Each session gets two files under the root directory:
//! - `<session>.state.json` — the latest `ConversationState` snapshot
//! - `<session>.audit.jsonl` — one JSON audit entry per line, append-only
//!
//! Simple, portable, human-inspectable, and requires zero external
//! services. Corrupted audit lines are skipped with a warning rather than
//! failing the whole query.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use conclave_core::persistence::{PersistenceGateway, VariableAuditEntry};
use conclave_core::{ConversationState, PersistenceError};

use crate::SessionBlob;

/// A gateway persisting sessions as JSON files under one root directory.
pub struct FileGateway {
    root: PathBuf,
}

impl FileGateway {
    /// Create a gateway rooted at `root`. The directory is created on the
    /// first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "File gateway created");
        Self { root }
    }

    /// Default root: `~/.conclave/sessions`
    pub fn default_root() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".conclave").join("sessions")
    }

    /// Session ids become file stems; anything outside `[A-Za-z0-9_-]`
    /// is replaced so ids can never escape the root directory.
    fn sanitize(session_id: &str) -> String {
        session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn state_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.state.json", Self::sanitize(session_id)))
    }

    fn audit_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.audit.jsonl", Self::sanitize(session_id)))
    }

    fn ensure_root(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| PersistenceError::Storage(format!("failed to create session root: {e}")))
    }

    fn read_audit_file(path: &Path) -> Vec<VariableAuditEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // No audit yet — empty trail
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<VariableAuditEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted audit entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(
        &self,
        session_id: &str,
        state: &ConversationState,
    ) -> Result<(), PersistenceError> {
        self.ensure_root()?;
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        std::fs::write(self.state_path(session_id), json)
            .map_err(|e| PersistenceError::Storage(format!("failed to write state: {e}")))
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, PersistenceError> {
        let path = self.state_path(session_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::Storage(format!("failed to read state: {e}"))),
        };
        let state = serde_json::from_str(&content)
            .map_err(|e| PersistenceError::Corrupted(format!("{}: {e}", path.display())))?;
        Ok(Some(state))
    }

    async fn exists(&self, session_id: &str) -> Result<bool, PersistenceError> {
        Ok(self.state_path(session_id).exists())
    }

    async fn append_audit(&self, entry: VariableAuditEntry) -> Result<(), PersistenceError> {
        use std::io::Write;

        self.ensure_root()?;
        let line = serde_json::to_string(&entry)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.audit_path(&entry.session_id))
            .map_err(|e| PersistenceError::Storage(format!("failed to open audit file: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| PersistenceError::Storage(format!("failed to append audit: {e}")))
    }

    async fn query_audit(
        &self,
        session_id: &str,
        variable: Option<&str>,
    ) -> Result<Vec<VariableAuditEntry>, PersistenceError> {
        let entries = Self::read_audit_file(&self.audit_path(session_id));
        Ok(entries
            .into_iter()
            .filter(|e| variable.is_none_or(|v| e.variable == v))
            .collect())
    }

    async fn backup(&self, session_id: &str) -> Result<Vec<u8>, PersistenceError> {
        let state = self
            .load(session_id)
            .await?
            .ok_or_else(|| PersistenceError::SessionNotFound(session_id.to_string()))?;
        let blob = SessionBlob {
            state,
            audit: Self::read_audit_file(&self.audit_path(session_id)),
        };
        serde_json::to_vec(&blob).map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    async fn restore(&self, session_id: &str, blob: &[u8]) -> Result<(), PersistenceError> {
        let blob: SessionBlob = serde_json::from_slice(blob)
            .map_err(|e| PersistenceError::Corrupted(e.to_string()))?;

        self.save(session_id, &blob.state).await?;

        let mut lines = String::new();
        for entry in &blob.audit {
            let line = serde_json::to_string(entry)
                .map_err(|e| PersistenceError::Storage(e.to_string()))?;
            lines.push_str(&line);
            lines.push('\n');
        }
        std::fs::write(self.audit_path(session_id), lines)
            .map_err(|e| PersistenceError::Storage(format!("failed to write audit: {e}")))
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(PersistenceError::Storage(format!("failed to list root: {e}"))),
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".state.json") else {
                continue;
            };

            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            if modified < cutoff {
                let audit = self.root.join(format!("{stem}.audit.jsonl"));
                std::fs::remove_file(&path)
                    .map_err(|e| PersistenceError::Storage(format!("failed to remove state: {e}")))?;
                if audit.exists() {
                    std::fs::remove_file(&audit).map_err(|e| {
                        PersistenceError::Storage(format!("failed to remove audit: {e}"))
                    })?;
                }
                removed += 1;
            }
        }
        Ok(removed)
    }
}
