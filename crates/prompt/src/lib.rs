//! Per-agent system prompt assembly, driven by variable store state.
//!
//! The assembler renders what an agent needs to know for its next turn:
//! its mission, the variables assigned to it, which of those are still
//! missing, the values already collected, and how to report a capture back
//! to the coordinator. Everything is configurable through a
//! [`PromptTemplate`] value; template builders return updated copies rather
//! than mutating in place, so configurations never alias.

use std::collections::BTreeMap;

use conclave_core::{Error, Result, Variable};
use conclave_store::VariableStore;

/// Named prompt sections whose headings can be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Mission,
    Variables,
    Missing,
    Context,
    Reporting,
}

impl Section {
    fn default_title(self) -> &'static str {
        match self {
            Section::Mission => "Mission",
            Section::Variables => "Your Variables",
            Section::Missing => "Still Missing",
            Section::Context => "Current Context",
            Section::Reporting => "Reporting Captured Values",
        }
    }
}

/// Immutable prompt configuration. The default template includes the
/// mission statement and the reporting instructions.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    include_mission: bool,
    include_tools: bool,
    titles: BTreeMap<Section, String>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            include_mission: true,
            include_tools: true,
            titles: BTreeMap::new(),
        }
    }
}

impl PromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include or drop the mission section. Returns an updated copy.
    pub fn with_mission(mut self, include: bool) -> Self {
        self.include_mission = include;
        self
    }

    /// Include or drop the capture-reporting instructions. Returns an
    /// updated copy.
    pub fn with_tools(mut self, include: bool) -> Self {
        self.include_tools = include;
        self
    }

    /// Override a section heading. Returns an updated copy.
    pub fn with_section_title(mut self, section: Section, title: impl Into<String>) -> Self {
        self.titles.insert(section, title.into());
        self
    }

    fn title(&self, section: Section) -> &str {
        self.titles
            .get(&section)
            .map(String::as_str)
            .unwrap_or_else(|| section.default_title())
    }
}

/// Renders an agent-specific system prompt from store state.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    template: PromptTemplate,
}

impl PromptAssembler {
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Build the system prompt for `agent_id` from the current store state.
    ///
    /// Fails with `InvalidArgument` on an empty agent id. An empty store
    /// still yields a valid prompt.
    pub fn build_for_agent(&self, agent_id: &str, store: &VariableStore) -> Result<String> {
        if agent_id.trim().is_empty() {
            return Err(Error::InvalidArgument("agent id must not be empty".into()));
        }

        let mut out = String::new();

        if self.template.include_mission {
            out.push_str(&format!("## {}\n", self.template.title(Section::Mission)));
            out.push_str(&format!(
                "You are agent '{agent_id}' in a multi-agent conversation. \
                 Work with the user and your fellow agents to collect the \
                 variables assigned to you below.\n\n"
            ));
        }

        let owned = store.list_owned_by(agent_id);
        out.push_str(&format!("## {}\n", self.template.title(Section::Variables)));
        if owned.is_empty() {
            out.push_str("(none assigned)\n");
        } else {
            for var in &owned {
                out.push_str(&Self::describe(var));
            }
        }
        out.push('\n');

        let missing = store.list_missing(agent_id);
        out.push_str(&format!("## {}\n", self.template.title(Section::Missing)));
        if missing.is_empty() {
            out.push_str("All assigned variables are collected.\n");
        } else {
            for var in &missing {
                out.push_str(&format!("- {}: {}\n", var.name, var.description));
            }
        }
        out.push('\n');

        out.push_str(&format!("## {}\n", self.template.title(Section::Context)));
        let collected: Vec<&Variable> = owned.iter().copied().filter(|v| v.collected).collect();
        if collected.is_empty() {
            out.push_str("No variables collected yet.\n");
        } else {
            for var in collected {
                let value = var
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "null".into());
                let by = var.captured_by.as_deref().unwrap_or("unknown");
                out.push_str(&format!(
                    "- {} = {} (by {}, confidence {:.2})\n",
                    var.name, value, by, var.confidence
                ));
            }
        }

        if self.template.include_tools {
            out.push('\n');
            out.push_str(&format!("## {}\n", self.template.title(Section::Reporting)));
            out.push_str(
                "When you learn the value of one of your variables, report it \
                 in your structured reply as a capture entry:\n\
                 {\"name\": \"<variable>\", \"value\": <value>, \"confidence\": <0.0-1.0>}\n\
                 Only report variables you own or that are shared; writes to \
                 variables owned by another agent will be rejected.\n",
            );
        }

        Ok(out)
    }

    fn describe(var: &Variable) -> String {
        format!(
            "- {} ({}{}): {}\n",
            var.name,
            if var.required { "required" } else { "optional" },
            match &var.owned_by {
                conclave_core::Ownership::Any => ", shared".to_string(),
                conclave_core::Ownership::Agent(a) => format!(", owned by {a}"),
            },
            var.description,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::Ownership;
    use serde_json::json;

    fn sample_store() -> VariableStore {
        let mut store = VariableStore::new();
        store.declare(
            "destination",
            Ownership::Agent("planner".into()),
            "Where the trip goes",
            true,
            None,
        );
        store.declare("budget", Ownership::Any, "Total budget", true, None);
        store.declare(
            "hotel",
            Ownership::Agent("booker".into()),
            "Chosen hotel",
            false,
            None,
        );
        store
    }

    #[test]
    fn default_prompt_contains_all_sections() {
        let assembler = PromptAssembler::default();
        let prompt = assembler.build_for_agent("planner", &sample_store()).unwrap();

        assert!(prompt.contains("Mission"));
        assert!(prompt.contains("planner"));
        assert!(prompt.contains("destination"));
        assert!(prompt.contains("budget"));
        // Not visible to planner: owned by booker
        assert!(!prompt.contains("hotel"));
        assert!(prompt.contains("Still Missing"));
        assert!(prompt.contains("Reporting Captured Values"));
    }

    #[test]
    fn empty_agent_id_is_rejected() {
        let assembler = PromptAssembler::default();
        let err = assembler.build_for_agent("  ", &sample_store()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn empty_store_still_produces_a_prompt() {
        let assembler = PromptAssembler::default();
        let prompt = assembler.build_for_agent("planner", &VariableStore::new()).unwrap();
        assert!(prompt.contains("Mission"));
        assert!(prompt.contains("(none assigned)"));
        assert!(prompt.contains("No variables collected yet."));
    }

    #[test]
    fn collected_values_show_in_context() {
        let mut store = sample_store();
        store.set_executing_agent("planner");
        store.write("destination", json!("Lisbon"), 0.95).unwrap();

        let prompt = PromptAssembler::default()
            .build_for_agent("planner", &store)
            .unwrap();
        assert!(prompt.contains("destination = \"Lisbon\""));
        assert!(prompt.contains("by planner"));
        // Collected variables leave the missing section
        let missing_section = prompt.split("Still Missing").nth(1).unwrap();
        let missing_section = missing_section.split("##").next().unwrap();
        assert!(!missing_section.contains("destination"));
        assert!(missing_section.contains("budget"));
    }

    #[test]
    fn mission_and_tools_can_be_disabled() {
        let template = PromptTemplate::default().with_mission(false).with_tools(false);
        let prompt = PromptAssembler::new(template)
            .build_for_agent("planner", &sample_store())
            .unwrap();
        assert!(!prompt.contains("## Mission"));
        assert!(!prompt.contains("Reporting Captured Values"));
        assert!(prompt.contains("Your Variables"));
    }

    #[test]
    fn section_titles_can_be_overridden() {
        let template =
            PromptTemplate::default().with_section_title(Section::Missing, "Open Items");
        let prompt = PromptAssembler::new(template)
            .build_for_agent("planner", &sample_store())
            .unwrap();
        assert!(prompt.contains("## Open Items"));
        assert!(!prompt.contains("## Still Missing"));
    }

    #[test]
    fn template_builder_returns_independent_values() {
        let base = PromptTemplate::default();
        let modified = base.clone().with_mission(false);
        // The base template is unaffected by deriving a new one
        let from_base = PromptAssembler::new(base)
            .build_for_agent("planner", &sample_store())
            .unwrap();
        let from_modified = PromptAssembler::new(modified)
            .build_for_agent("planner", &sample_store())
            .unwrap();
        assert!(from_base.contains("## Mission"));
        assert!(!from_modified.contains("## Mission"));
    }
}
