//! The shared variable store — named, owned, auditable conversation state.
//!
//! Agents collaborate by filling declared variables. Every write goes
//! through [`VariableStore::write`], which enforces the ownership rule:
//! the current executing agent must be the declared owner, or the variable
//! must be owned by "any". Rejected writes leave the variable untouched.
//!
//! The store is not designed for concurrent mutation from multiple threads;
//! one conversation drives one store, one turn at a time. Independent
//! conversations each own an independent store.

use std::collections::HashMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use conclave_core::variable::{Ownership, Progress, Variable, VariableChange};
use conclave_core::StoreError;

/// Holds declared variables in declaration order, tracks the agent currently
/// permitted to write, and computes completion progress on demand.
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    /// Declaration order (keys of `vars`).
    order: Vec<String>,
    vars: HashMap<String, Variable>,
    executing_agent: Option<String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Re-declaring an existing name overwrites it
    /// (including its history) while keeping its declaration-order slot.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        owned_by: Ownership,
        description: impl Into<String>,
        required: bool,
        default_value: Option<Value>,
    ) {
        let name = name.into();
        let var = Variable::new(name.clone(), owned_by, description, required, default_value);
        if self.vars.insert(name.clone(), var).is_none() {
            self.order.push(name.clone());
        }
        debug!(variable = %name, "Variable declared");
    }

    /// Set the agent all subsequent writes are attributed to. No validation;
    /// the attribution is explicit, never inferred.
    pub fn set_executing_agent(&mut self, agent: impl Into<String>) {
        self.executing_agent = Some(agent.into());
    }

    pub fn executing_agent(&self) -> Option<&str> {
        self.executing_agent.as_deref()
    }

    /// Write a value under the ownership rule. On success: appends a history
    /// record and syncs value/collected/captured-by/captured-at/confidence.
    /// Confidence is clamped to [0, 1].
    pub fn write(
        &mut self,
        name: &str,
        new_value: Value,
        confidence: f64,
    ) -> Result<(), StoreError> {
        let agent = self
            .executing_agent
            .clone()
            .ok_or_else(|| StoreError::NoExecutingAgent {
                variable: name.to_string(),
            })?;

        let var = self
            .vars
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownVariable {
                name: name.to_string(),
            })?;

        if !var.owned_by.permits(&agent) {
            return Err(StoreError::OwnershipViolation {
                agent,
                variable: name.to_string(),
                owner: var.owned_by.to_string(),
            });
        }

        var.apply(VariableChange {
            new_value,
            updated_by: agent.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        });
        debug!(variable = %name, agent = %agent, "Variable written");
        Ok(())
    }

    /// Typed read. Conversion failures surface to the caller; use
    /// [`Self::read_raw`] for the stored representation.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
        let raw = self.read_raw(name)?;
        serde_json::from_value(raw.clone()).map_err(|e| StoreError::Conversion {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// The raw stored value. `Value::Null` for a declared but unset variable.
    pub fn read_raw(&self, name: &str) -> Result<&Value, StoreError> {
        let var = self.vars.get(name).ok_or_else(|| StoreError::UnknownVariable {
            name: name.to_string(),
        })?;
        Ok(var.value.as_ref().unwrap_or(&Value::Null))
    }

    /// Look up a declared variable.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.order.iter().filter_map(|name| self.vars.get(name))
    }

    /// Variables `agent` may write (owned by it, or owned by "any"),
    /// in declaration order.
    pub fn list_owned_by(&self, agent: &str) -> Vec<&Variable> {
        self.variables()
            .filter(|v| v.owned_by.permits(agent))
            .collect()
    }

    /// The uncollected subset of [`Self::list_owned_by`].
    pub fn list_missing(&self, agent: &str) -> Vec<&Variable> {
        self.list_owned_by(agent)
            .into_iter()
            .filter(|v| !v.collected)
            .collect()
    }

    /// Completion accounting, recomputed on every call.
    pub fn progress(&self) -> Progress {
        Progress::compute(self.variables())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove all declared variables. No history remains accessible.
    pub fn clear(&mut self) {
        self.order.clear();
        self.vars.clear();
    }

    /// An independent copy: value-equal variables with independently
    /// mutable history lists. Writes to either copy never affect the other.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Snapshot every variable (with history) in declaration order, for
    /// persistence.
    pub fn snapshot(&self) -> Vec<Variable> {
        self.variables().cloned().collect()
    }

    /// Replace the store contents from a persisted snapshot, preserving the
    /// snapshot's order as declaration order.
    pub fn load_snapshot(&mut self, variables: Vec<Variable>) {
        self.clear();
        for var in variables {
            let name = var.name.clone();
            if self.vars.insert(name.clone(), var).is_none() {
                self.order.push(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn billing_store() -> VariableStore {
        let mut store = VariableStore::new();
        store.declare(
            "invoice_id",
            Ownership::Agent("billing".into()),
            "The invoice under discussion",
            true,
            None,
        );
        store.declare("notes", Ownership::Any, "Shared free-form notes", false, None);
        store
    }

    #[test]
    fn write_by_owner_succeeds() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        store.write("invoice_id", json!("INV-42"), 0.9).unwrap();

        let var = store.get("invoice_id").unwrap();
        assert!(var.collected);
        assert_eq!(var.value, Some(json!("INV-42")));
        assert_eq!(var.captured_by.as_deref(), Some("billing"));
        assert_eq!(var.history.len(), 1);
    }

    #[test]
    fn write_by_non_owner_is_rejected_without_mutation() {
        let mut store = billing_store();
        store.set_executing_agent("support");
        let err = store.write("invoice_id", json!("INV-42"), 1.0).unwrap_err();

        match &err {
            StoreError::OwnershipViolation { agent, variable, owner } => {
                assert_eq!(agent, "support");
                assert_eq!(variable, "invoice_id");
                assert_eq!(owner, "billing");
            }
            other => panic!("expected OwnershipViolation, got {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("support"));
        assert!(msg.contains("invoice_id"));
        assert!(msg.contains("billing"));

        let var = store.get("invoice_id").unwrap();
        assert!(!var.collected);
        assert_eq!(var.value, None);
        assert!(var.history.is_empty());
    }

    #[test]
    fn any_ownership_permits_all_agents() {
        let mut store = billing_store();
        store.set_executing_agent("support");
        store.write("notes", json!("customer called"), 1.0).unwrap();
        store.set_executing_agent("billing");
        store.write("notes", json!("refund issued"), 1.0).unwrap();

        let var = store.get("notes").unwrap();
        assert_eq!(var.history.len(), 2);
        assert_eq!(var.value, Some(json!("refund issued")));
    }

    #[test]
    fn write_undeclared_variable_fails_with_not_declared() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        let err = store.write("ghost", json!(1), 1.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost"));
        assert!(msg.contains("not declared"));
    }

    #[test]
    fn write_without_executing_agent_fails() {
        let mut store = billing_store();
        let err = store.write("notes", json!("x"), 1.0).unwrap_err();
        assert!(matches!(err, StoreError::NoExecutingAgent { .. }));
    }

    #[test]
    fn redeclare_overwrites_in_place() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        store.write("invoice_id", json!("INV-1"), 1.0).unwrap();

        store.declare(
            "invoice_id",
            Ownership::Any,
            "Now shared",
            false,
            None,
        );
        let var = store.get("invoice_id").unwrap();
        assert!(!var.collected);
        assert!(var.history.is_empty());
        assert_eq!(var.owned_by, Ownership::Any);
        // Declaration order is stable across re-declaration
        assert_eq!(store.variables().next().unwrap().name, "invoice_id");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn typed_read_and_conversion_failure() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        store.write("invoice_id", json!("INV-7"), 1.0).unwrap();

        let id: String = store.read("invoice_id").unwrap();
        assert_eq!(id, "INV-7");

        let err = store.read::<u64>("invoice_id").unwrap_err();
        assert!(matches!(err, StoreError::Conversion { .. }));

        // Raw read is untouched by conversion concerns
        assert_eq!(store.read_raw("invoice_id").unwrap(), &json!("INV-7"));
    }

    #[test]
    fn read_undeclared_fails() {
        let store = billing_store();
        let err = store.read::<String>("ghost").unwrap_err();
        assert!(matches!(err, StoreError::UnknownVariable { .. }));
    }

    #[test]
    fn list_owned_by_includes_shared_in_declaration_order() {
        let store = billing_store();
        let billing_vars: Vec<_> = store.list_owned_by("billing").iter().map(|v| v.name.as_str()).collect();
        assert_eq!(billing_vars, vec!["invoice_id", "notes"]);

        let support_vars: Vec<_> = store.list_owned_by("support").iter().map(|v| v.name.as_str()).collect();
        assert_eq!(support_vars, vec!["notes"]);
    }

    #[test]
    fn list_missing_shrinks_as_values_arrive() {
        let mut store = billing_store();
        assert_eq!(store.list_missing("billing").len(), 2);

        store.set_executing_agent("billing");
        store.write("invoice_id", json!("INV-1"), 1.0).unwrap();
        let missing: Vec<_> = store.list_missing("billing").iter().map(|v| v.name.as_str()).collect();
        assert_eq!(missing, vec!["notes"]);
    }

    #[test]
    fn progress_arithmetic() {
        let mut store = VariableStore::new();
        for (name, required) in [("a", true), ("b", true), ("c", true), ("d", false), ("e", false)] {
            store.declare(name, Ownership::Any, "", required, None);
        }
        store.set_executing_agent("anyone");
        store.write("a", json!(1), 1.0).unwrap();
        store.write("b", json!(2), 1.0).unwrap();
        store.write("d", json!(3), 1.0).unwrap();

        let p = store.progress();
        assert_eq!(p.total_variables, 5);
        assert_eq!(p.filled_variables, 3);
        assert_eq!(p.required_variables, 3);
        assert_eq!(p.required_filled, 2);
        assert!((p.completion_percentage - 0.6).abs() < 1e-9);
        assert!((p.required_completion_percentage - 2.0 / 3.0).abs() < 1e-9);
        assert!(!p.is_complete);
    }

    #[test]
    fn progress_on_empty_store() {
        let store = VariableStore::new();
        let p = store.progress();
        assert_eq!(p.total_variables, 0);
        assert!((p.completion_percentage - 1.0).abs() < f64::EPSILON);
        assert!(p.is_complete);
    }

    #[test]
    fn deep_copy_isolates_values_and_history() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        store.write("invoice_id", json!("INV-1"), 1.0).unwrap();

        let copy = store.deep_copy();

        // Writing to the original does not leak into the copy
        store.write("invoice_id", json!("INV-2"), 1.0).unwrap();
        assert_eq!(store.get("invoice_id").unwrap().history.len(), 2);
        assert_eq!(copy.get("invoice_id").unwrap().history.len(), 1);
        assert_eq!(copy.get("invoice_id").unwrap().value, Some(json!("INV-1")));

        // And vice versa
        let mut copy = copy;
        copy.set_executing_agent("billing");
        copy.write("invoice_id", json!("INV-3"), 1.0).unwrap();
        assert_eq!(store.get("invoice_id").unwrap().value, Some(json!("INV-2")));
    }

    #[test]
    fn clear_removes_everything() {
        let mut store = billing_store();
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("invoice_id").is_none());
    }

    #[test]
    fn snapshot_roundtrip_preserves_order_and_history() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        store.write("invoice_id", json!("INV-9"), 0.7).unwrap();

        let snapshot = store.snapshot();
        let mut restored = VariableStore::new();
        restored.load_snapshot(snapshot);

        let names: Vec<_> = restored.variables().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["invoice_id", "notes"]);
        assert_eq!(restored.get("invoice_id").unwrap().history.len(), 1);
        assert!((restored.get("invoice_id").unwrap().confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut store = billing_store();
        store.set_executing_agent("billing");
        store.write("invoice_id", json!("x"), 3.5).unwrap();
        assert!((store.get("invoice_id").unwrap().confidence - 1.0).abs() < f64::EPSILON);
    }
}
