//! Stage selection: maps a prompt to an ordered list of stages.
//!
//! The reasoning capability proposes a stage list against the catalog and a
//! set of policy rules. The proposal is validated strictly (unknown or
//! duplicate keys are rejected) and then its ordering is repaired
//! deterministically by [`normalize`], since the rules cannot be guaranteed
//! by the model.

mod validate;

pub use validate::normalize;

use crate::errors::{MalformedResponseError, RepoflowError};
use crate::reasoning::{parse_structured, Reasoner, ReasoningRequest};
use crate::stages::{catalog_json, StageId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SELECTOR_SYSTEM: &str = "You are an expert in determining which tools are needed for code \
analysis tasks. Respond only in valid JSON format.";

const SELECTION_RULES: &str = "Consider that:
The Planner Agent is required for:
- Any code modifications or additions
- Complex code analysis
- Architectural changes
- Code improvements
- Feature additions

1. The Repository Analysis Agent is always required as a baseline and runs first
2. Not all agents are needed for every query
3. The Planner Agent is most useful for complex code analysis, improvements, or architectural questions
4. Simple questions about repository purpose or structure may not need the Planner
5. The Code Reader is needed whenever we need to analyze actual code content, and runs before the Planner and GPT Agent
6. The GPT Agent is needed whenever we need to provide a response to the user's prompt, and runs last";

/// An ordered, validated stage selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDecision {
    /// Stages to run, in order.
    pub stages: Vec<StageId>,
    /// Why these stages were chosen.
    pub justification: String,
    /// Ordering repairs applied after parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(alias = "selected_stages")]
    selected_agents: Vec<String>,
    justification: String,
}

/// Asks the reasoning capability which stages a prompt needs.
#[derive(Clone)]
pub struct Selector {
    reasoner: Arc<dyn Reasoner>,
}

impl Selector {
    /// Creates a selector backed by `reasoner`.
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Builds the selection request for `prompt`.
    #[must_use]
    pub fn build_request(prompt: &str) -> ReasoningRequest {
        let body = format!(
            "Given the following user prompt and available agents, determine which agents should be \
             used and in what order.\n\n\
             User Prompt: \"{}\"\n\n\
             Available Agents:\n{}\n\n\
             {SELECTION_RULES}\n\n\
             Please provide:\n\
             1. List of required agents in order of execution\n\
             2. Brief justification for each agent's inclusion or exclusion\n\n\
             Respond in JSON format with 'selected_agents' (array of agent keys in order) and \
             'justification' (string).",
            prompt.to_lowercase(),
            catalog_json(),
        );

        ReasoningRequest::new("selector")
            .system(SELECTOR_SYSTEM)
            .user(body)
            .with_temperature(0.1)
            .expecting_json()
    }

    /// Parses and validates a raw selection response.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the text is not the expected two-field
    /// object, or lists an unknown or repeated stage key.
    pub fn parse_decision(raw: &str) -> Result<SelectionDecision, RepoflowError> {
        let parsed: RawDecision = parse_structured(raw, "selector")?;

        let mut selected = Vec::with_capacity(parsed.selected_agents.len());
        for key in &parsed.selected_agents {
            let id = StageId::from_key(key).ok_or_else(|| {
                MalformedResponseError::new("selector", format!("unknown stage key '{key}'"))
            })?;
            if selected.contains(&id) {
                return Err(MalformedResponseError::new(
                    "selector",
                    format!("stage '{key}' selected more than once"),
                )
                .into());
            }
            selected.push(id);
        }

        let (stages, notes) = normalize(&selected);
        for note in &notes {
            tracing::warn!(note = %note, "Repaired stage selection");
        }

        Ok(SelectionDecision {
            stages,
            justification: parsed.justification,
            notes,
        })
    }

    /// Decides the stage sequence for `prompt`.
    ///
    /// # Errors
    ///
    /// Propagates reasoning failures and malformed responses; no default
    /// ordering is ever substituted.
    pub async fn decide(&self, prompt: &str) -> Result<SelectionDecision, RepoflowError> {
        let request = Self::build_request(prompt);
        let raw = self.reasoner.complete(&request).await?;
        let decision = Self::parse_decision(&raw)?;
        tracing::debug!(
            stages = ?decision.stages,
            repairs = decision.notes.len(),
            "Stage selection decided"
        );
        Ok(decision)
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector").finish_non_exhaustive()
    }
}
