//! # Conclave Core
//!
//! Domain types, traits, and error definitions for the Conclave multi-agent
//! conversation coordinator. This crate has **zero framework dependencies** —
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the agent
//! invocation contract ([`AgentHandle`]) and the durable state contract
//! ([`PersistenceGateway`]). Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod outcome;
pub mod persistence;
pub mod variable;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentHandle, AgentRegistration, AgentReply, CapturedVariable, DEFAULT_PRIORITY};
pub use error::{AgentError, Error, PersistenceError, Result, SelectionError, StoreError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationMessage, ConversationState};
pub use outcome::Outcome;
pub use persistence::{PersistenceGateway, VariableAuditEntry};
pub use variable::{Ownership, Progress, Variable, VariableChange};
