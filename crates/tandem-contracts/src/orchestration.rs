//! Orchestration state, update, and outcome types.
//!
//! These types describe one refinement run as it flows through
//! Planning → Implementing → Evaluating. The orchestrator owns the state;
//! callers only ever see clones.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a single orchestration run.
///
/// Appears in every log line the orchestrator emits for that run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle phase of a run. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Planning,
    Implementing,
    Evaluating,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Planning => "planning",
            Phase::Implementing => "implementing",
            Phase::Evaluating => "evaluating",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A snapshot of everything a run has produced so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationState {
    pub phase: Phase,
    /// Number of passes started; 0 before the first Planning phase.
    pub iteration: u32,
    pub plan: Option<String>,
    pub implementation: Option<String>,
    pub evaluation: Option<String>,
    /// Most recent reasoning trace from the planner role.
    pub thinking: Option<String>,
}

/// One externally observable event of a run, emitted in phase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IterationUpdate {
    /// The run entered a new phase.
    Phase { phase: Phase, iteration: u32 },

    /// Reasoning trace produced by the planner role in `phase`.
    Thinking {
        phase: Phase,
        iteration: u32,
        content: String,
    },

    Plan { iteration: u32, content: String },

    Implementation { iteration: u32, content: String },

    Evaluation {
        iteration: u32,
        content: String,
        /// True when the evaluation starts with the approval token.
        approved: bool,
    },

    /// Non-blocking structural concerns raised about the implementation.
    Advisory {
        iteration: u32,
        signals: Vec<String>,
        recommendation: String,
        options: Vec<String>,
    },

    /// The reviewer approved; the run is finished.
    Complete {
        iterations: u32,
        implementation: String,
    },

    /// The iteration budget ran out without approval.
    MaxIterationsReached {
        iterations: u32,
        last_evaluation: String,
    },
}

/// How a run ended. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The reviewer approved after `iterations` passes.
    Complete {
        iterations: u32,
        state: OrchestrationState,
    },
    /// The budget was exhausted after `iterations` passes.
    MaxIterationsReached {
        iterations: u32,
        state: OrchestrationState,
    },
    /// The host cancelled the run between phases.
    Cancelled { state: OrchestrationState },
}

impl RunOutcome {
    pub fn state(&self) -> &OrchestrationState {
        match self {
            RunOutcome::Complete { state, .. }
            | RunOutcome::MaxIterationsReached { state, .. }
            | RunOutcome::Cancelled { state } => state,
        }
    }
}
