//! Shared conversation variables — the named, owned, auditable slots that
//! agents collaborate on filling.
//!
//! A `Variable` carries its full change history; the current value always
//! mirrors the last history entry once collected. Variables are only ever
//! mutated through the store's ownership-checked write path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who is allowed to write a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Ownership {
    /// Any agent may write ("any" in serialized form).
    Any,
    /// Only the named agent may write.
    Agent(String),
}

impl Ownership {
    /// Whether `agent` is permitted to write a variable with this ownership.
    pub fn permits(&self, agent: &str) -> bool {
        match self {
            Ownership::Any => true,
            Ownership::Agent(owner) => owner == agent,
        }
    }
}

impl From<String> for Ownership {
    fn from(s: String) -> Self {
        if s == "any" {
            Ownership::Any
        } else {
            Ownership::Agent(s)
        }
    }
}

impl From<Ownership> for String {
    fn from(o: Ownership) -> Self {
        o.to_string()
    }
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ownership::Any => write!(f, "any"),
            Ownership::Agent(name) => write!(f, "{name}"),
        }
    }
}

/// One append-only history record of a variable write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableChange {
    /// The value that was written.
    pub new_value: Value,

    /// The agent that performed the write.
    pub updated_by: String,

    /// Writer-reported confidence in [0, 1].
    pub confidence: f64,

    /// When the write happened.
    pub timestamp: DateTime<Utc>,
}

/// A named, owned slot in the shared conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique name within a store, immutable after creation.
    pub name: String,

    /// Which agent may write this variable.
    pub owned_by: Ownership,

    /// Human-readable description, surfaced in agent prompts.
    pub description: String,

    /// Whether this variable counts toward required-completion.
    #[serde(default)]
    pub required: bool,

    /// Current value; `None` until collected unless a default was given.
    #[serde(default)]
    pub value: Option<Value>,

    /// Value assigned at declaration time.
    #[serde(default)]
    pub default_value: Option<Value>,

    /// True iff at least one history entry exists.
    #[serde(default)]
    pub collected: bool,

    /// Confidence of the last write, in [0, 1].
    #[serde(default)]
    pub confidence: f64,

    /// Agent that performed the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_by: Option<String>,

    /// Timestamp of the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,

    /// Ordered change history, oldest first.
    #[serde(default)]
    pub history: Vec<VariableChange>,
}

impl Variable {
    /// Create a freshly declared, uncollected variable.
    pub fn new(
        name: impl Into<String>,
        owned_by: Ownership,
        description: impl Into<String>,
        required: bool,
        default_value: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            owned_by,
            description: description.into(),
            required,
            value: default_value.clone(),
            default_value,
            collected: false,
            confidence: 0.0,
            captured_by: None,
            captured_at: None,
            history: Vec::new(),
        }
    }

    /// Apply a change record: append to history and sync the current fields.
    ///
    /// This is the store's write path; callers outside the store should never
    /// call it directly.
    pub fn apply(&mut self, change: VariableChange) {
        self.value = Some(change.new_value.clone());
        self.collected = true;
        self.confidence = change.confidence;
        self.captured_by = Some(change.updated_by.clone());
        self.captured_at = Some(change.timestamp);
        self.history.push(change);
    }
}

/// Completion accounting over a set of declared variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total_variables: usize,
    pub filled_variables: usize,
    pub required_variables: usize,
    pub required_filled: usize,
    /// `filled / total`, or 1.0 for an empty store.
    pub completion_percentage: f64,
    /// `required_filled / required`, or 1.0 with no required variables.
    pub required_completion_percentage: f64,
    /// True iff every required variable is filled.
    pub is_complete: bool,
}

impl Progress {
    /// Compute progress over an iterator of variables.
    pub fn compute<'a>(vars: impl Iterator<Item = &'a Variable>) -> Self {
        let mut total = 0usize;
        let mut filled = 0usize;
        let mut required = 0usize;
        let mut required_filled = 0usize;

        for v in vars {
            total += 1;
            if v.collected {
                filled += 1;
            }
            if v.required {
                required += 1;
                if v.collected {
                    required_filled += 1;
                }
            }
        }

        let completion = if total == 0 {
            1.0
        } else {
            filled as f64 / total as f64
        };
        let required_completion = if required == 0 {
            1.0
        } else {
            required_filled as f64 / required as f64
        };

        Self {
            total_variables: total,
            filled_variables: filled,
            required_variables: required,
            required_filled,
            completion_percentage: completion,
            required_completion_percentage: required_completion,
            is_complete: required_filled == required,
        }
    }
}

impl std::fmt::Display for Progress {
    /// Human-readable rendering with fractions and rounded percentages,
    /// e.g. `variables 3/5 (60%), required 2/3 (67%), complete: no`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "variables {}/{} ({}%), required {}/{} ({}%), complete: {}",
            self.filled_variables,
            self.total_variables,
            (self.completion_percentage * 100.0).round() as i64,
            self.required_filled,
            self.required_variables,
            (self.required_completion_percentage * 100.0).round() as i64,
            if self.is_complete { "yes" } else { "no" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ownership_permits_any() {
        assert!(Ownership::Any.permits("someone"));
        assert!(Ownership::Agent("billing".into()).permits("billing"));
        assert!(!Ownership::Agent("billing".into()).permits("support"));
    }

    #[test]
    fn ownership_serializes_as_sentinel_string() {
        let any = serde_json::to_string(&Ownership::Any).unwrap();
        assert_eq!(any, "\"any\"");
        let owned: Ownership = serde_json::from_str("\"billing\"").unwrap();
        assert_eq!(owned, Ownership::Agent("billing".into()));
        let round: Ownership = serde_json::from_str("\"any\"").unwrap();
        assert_eq!(round, Ownership::Any);
    }

    #[test]
    fn apply_syncs_current_fields_with_history() {
        let mut var = Variable::new("budget", Ownership::Any, "Project budget", true, None);
        assert!(!var.collected);

        let now = Utc::now();
        var.apply(VariableChange {
            new_value: json!(1500),
            updated_by: "planner".into(),
            confidence: 0.9,
            timestamp: now,
        });

        assert!(var.collected);
        assert_eq!(var.value, Some(json!(1500)));
        assert_eq!(var.captured_by.as_deref(), Some("planner"));
        assert_eq!(var.history.len(), 1);
        assert_eq!(var.history[0].new_value, json!(1500));
    }

    #[test]
    fn default_value_set_but_not_collected() {
        let var = Variable::new("region", Ownership::Any, "Deploy region", false, Some(json!("eu")));
        assert_eq!(var.value, Some(json!("eu")));
        assert!(!var.collected);
        assert!(var.history.is_empty());
    }

    #[test]
    fn progress_on_empty_set_is_complete() {
        let p = Progress::compute(std::iter::empty());
        assert_eq!(p.total_variables, 0);
        assert!((p.completion_percentage - 1.0).abs() < f64::EPSILON);
        assert!((p.required_completion_percentage - 1.0).abs() < f64::EPSILON);
        assert!(p.is_complete);
    }

    #[test]
    fn progress_display_includes_fractions() {
        let p = Progress {
            total_variables: 5,
            filled_variables: 3,
            required_variables: 3,
            required_filled: 2,
            completion_percentage: 0.6,
            required_completion_percentage: 2.0 / 3.0,
            is_complete: false,
        };
        let text = p.to_string();
        assert!(text.contains("3/5"));
        assert!(text.contains("60%"));
        assert!(text.contains("2/3"));
        assert!(text.contains("67%"));
    }
}
