//! Stage identifiers and the capability catalog shown to the selector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of stage kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    /// Walks the tree and computes file statistics.
    #[serde(rename = "repository_analysis")]
    RepositoryAnalysis,
    /// Aggregates source text.
    #[serde(rename = "code_reader")]
    CodeReader,
    /// Produces an investigation plan.
    #[serde(rename = "planner")]
    Planner,
    /// Answers the prompt and proposes file changes.
    #[serde(rename = "gpt", alias = "modifier")]
    Modifier,
}

impl StageId {
    /// All stage kinds in canonical pipeline order.
    pub const ALL: [Self; 4] = [
        Self::RepositoryAnalysis,
        Self::CodeReader,
        Self::Planner,
        Self::Modifier,
    ];

    /// The stable key used in selector requests and responses.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::RepositoryAnalysis => "repository_analysis",
            Self::CodeReader => "code_reader",
            Self::Planner => "planner",
            Self::Modifier => "gpt",
        }
    }

    /// Parses a stage key, accepting `modifier` as an alias of `gpt`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "repository_analysis" => Some(Self::RepositoryAnalysis),
            "code_reader" => Some(Self::CodeReader),
            "planner" => Some(Self::Planner),
            "gpt" | "modifier" => Some(Self::Modifier),
            _ => None,
        }
    }

    /// Returns the catalog entry for this stage.
    #[must_use]
    pub fn descriptor(&self) -> &'static StageDescriptor {
        match self {
            Self::RepositoryAnalysis => &CATALOG[0],
            Self::CodeReader => &CATALOG[1],
            Self::Planner => &CATALOG[2],
            Self::Modifier => &CATALOG[3],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Describes a stage's capabilities to the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    /// Stage identifier.
    #[serde(skip)]
    pub id: StageId,
    /// Human label.
    pub name: &'static str,
    /// What the stage does.
    pub description: &'static str,
    /// Typical use cases.
    pub use_cases: &'static [&'static str],
    /// Requests that require this stage.
    pub required_for: &'static [&'static str],
}

/// The fixed capability catalog.
pub static CATALOG: [StageDescriptor; 4] = [
    StageDescriptor {
        id: StageId::RepositoryAnalysis,
        name: "Repository Analysis Agent",
        description: "Analyzes basic repository structure, counts files and directories, identifies file types",
        use_cases: &["repository overview", "file statistics", "initial analysis"],
        required_for: &["all queries"],
    },
    StageDescriptor {
        id: StageId::CodeReader,
        name: "Code Reader Agent",
        description: "Reads and processes actual code content from files",
        use_cases: &["code content analysis", "implementation details", "code understanding"],
        required_for: &["code analysis", "implementation questions"],
    },
    StageDescriptor {
        id: StageId::Planner,
        name: "Planner Agent",
        description: "Creates structured plans for detailed code analysis and modifications",
        use_cases: &["code improvements", "architectural changes", "refactoring suggestions"],
        required_for: &["code improvements", "architectural analysis"],
    },
    StageDescriptor {
        id: StageId::Modifier,
        name: "GPT Agent",
        description: "Provides detailed analysis and responses based on code content, and proposes file modifications",
        use_cases: &["code explanation", "answering questions", "providing insights", "code modifications"],
        required_for: &["all queries with prompt"],
    },
];

/// Renders the catalog as a JSON object keyed by stage key.
#[must_use]
pub fn catalog_json() -> String {
    let map: serde_json::Map<String, serde_json::Value> = CATALOG
        .iter()
        .map(|d| {
            (
                d.id.key().to_string(),
                serde_json::to_value(d).unwrap_or(serde_json::Value::Null),
            )
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::Value::Object(map)).unwrap_or_default()
}
