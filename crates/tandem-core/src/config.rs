//! Orchestrator configuration.
//!
//! `OrchestratorConfig` is deserialized from TOML. The caller always supplies
//! the document or an explicit path; nothing here searches the filesystem.
//!
//! Example:
//! ```toml
//! max_iterations = 4
//!
//! [planner]
//! provider = "anthropic"
//! model = "planner-large"
//! thinking_budget = 8000
//!
//! [implementer]
//! provider = "openai"
//! model = "coder-fast"
//! max_tokens = 16000
//!
//! [persona]
//! text = "You are a meticulous staff engineer."
//! target = "planner"
//! position = "prepend"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use tandem_contracts::{
    error::{TandemError, TandemResult},
    role::Role,
};

/// Lowest iteration budget the orchestrator will run with.
pub const MIN_ITERATIONS: u32 = 1;
/// Highest iteration budget the orchestrator will run with.
pub const MAX_ITERATIONS: u32 = 10;
/// Budget used when the configuration omits `max_iterations`.
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Backend settings for one role. Opaque to the core beyond pass-through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub provider: String,
    pub model: String,
    /// Response token cap. `None` means unlimited.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Reasoning token budget. `None` means unlimited.
    #[serde(default)]
    pub thinking_budget: Option<u32>,
}

/// Which role's system prompts receive the persona text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaTarget {
    Planner,
    Implementer,
    Both,
}

impl PersonaTarget {
    pub fn applies_to(&self, role: Role) -> bool {
        matches!(
            (self, role),
            (PersonaTarget::Both, _)
                | (PersonaTarget::Planner, Role::Planner)
                | (PersonaTarget::Implementer, Role::Implementer)
        )
    }
}

/// Where the persona text is inserted relative to the base system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaPosition {
    #[default]
    Prepend,
    Append,
}

/// Persona text spliced into system prompts. Never alters control flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub text: String,
    pub target: PersonaTarget,
    #[serde(default)]
    pub position: PersonaPosition,
}

/// Everything the orchestrator reads at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Requested iteration budget. Clamped to `MIN_ITERATIONS..=MAX_ITERATIONS`
    /// by [`OrchestratorConfig::effective_max_iterations`]; signed so that
    /// nonsense input like `0` or `-3` clamps instead of failing to parse.
    #[serde(default = "default_iterations")]
    pub max_iterations: i64,

    #[serde(default)]
    pub planner: RoleConfig,

    #[serde(default)]
    pub implementer: RoleConfig,

    #[serde(default)]
    pub persona: Option<Persona>,

    /// Number of most recent feedback sections kept in the carried context.
    /// `None` keeps every section. Must be at least 1.
    #[serde(default)]
    pub max_feedback_rounds: Option<usize>,
}

fn default_iterations() -> i64 {
    DEFAULT_ITERATIONS as i64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_iterations(),
            planner: RoleConfig::default(),
            implementer: RoleConfig::default(),
            persona: None,
            max_feedback_rounds: None,
        }
    }
}

impl OrchestratorConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TandemError::ConfigError` if the TOML is malformed, does not
    /// match the expected schema, or sets `max_feedback_rounds = 0`.
    pub fn from_toml_str(s: &str) -> TandemResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TandemError::ConfigError {
            reason: format!("failed to parse orchestrator TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that parse but cannot be honored.
    pub fn validate(&self) -> TandemResult<()> {
        if self.max_feedback_rounds == Some(0) {
            return Err(TandemError::ConfigError {
                reason: "max_feedback_rounds must be at least 1; omit it to keep every round"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Read the file at `path` and parse it as orchestrator configuration.
    pub fn from_file(path: &Path) -> TandemResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TandemError::ConfigError {
            reason: format!("failed to read orchestrator config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The iteration budget the orchestrator actually runs with.
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations
            .clamp(MIN_ITERATIONS as i64, MAX_ITERATIONS as i64) as u32
    }

    pub fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Planner => &self.planner,
            Role::Implementer => &self.implementer,
        }
    }
}
