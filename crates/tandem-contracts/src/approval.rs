//! Approval request, decision, and record types.
//!
//! The approval engine consumes an `ApprovalRequest` and produces an
//! `ApprovalDecision`. Every decision is also described by a `DecisionRecord`
//! written to the audit trail.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TandemError;

/// The category of privileged operation being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Read,
    Write,
    Execute,
    Browse,
    Delete,
}

impl ActionKind {
    /// The lowercase token used in pattern keys (`write:/src/*.rs`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Read => "read",
            ActionKind::Write => "write",
            ActionKind::Execute => "execute",
            ActionKind::Browse => "browse",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = TandemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(ActionKind::Read),
            "write" => Ok(ActionKind::Write),
            "execute" => Ok(ActionKind::Execute),
            "browse" => Ok(ActionKind::Browse),
            "delete" => Ok(ActionKind::Delete),
            other => Err(TandemError::ConfigError {
                reason: format!("unknown action kind '{other}'"),
            }),
        }
    }
}

/// How long a decision may be trusted without re-adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistScope {
    /// Valid for this single request only.
    #[default]
    Once,
    /// Valid for the remainder of the host's session.
    Session,
    /// Valid until the cache is cleared; the only scope the engine caches.
    Always,
}

impl PersistScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistScope::Once => "once",
            PersistScope::Session => "session",
            PersistScope::Always => "always",
        }
    }
}

impl fmt::Display for PersistScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistScope {
    type Err = TandemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(PersistScope::Once),
            "session" => Ok(PersistScope::Session),
            "always" => Ok(PersistScope::Always),
            other => Err(TandemError::ConfigError {
                reason: format!("unknown persistence scope '{other}'"),
            }),
        }
    }
}

/// A decision the host already made earlier in the session, forwarded to the
/// adjudicator as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorDecision {
    pub action: ActionKind,
    pub target: String,
    pub allow: bool,
}

/// Everything the approval engine needs to gate one privileged action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// What the agent wants to do.
    pub action: ActionKind,
    /// File path, command string, or URL the action applies to.
    pub target: String,
    /// Free-text explanation from the agent.
    pub context: String,
    /// Earlier decisions in this session, oldest first.
    #[serde(default)]
    pub prior_decisions: Vec<PriorDecision>,
}

impl ApprovalRequest {
    /// Build a request with no prior-decision history.
    pub fn new(action: ActionKind, target: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            context: context.into(),
            prior_decisions: Vec::new(),
        }
    }
}

/// The engine's answer for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub allow: bool,
    pub persist: PersistScope,
    pub reasoning: String,
}

impl ApprovalDecision {
    pub fn new(allow: bool, persist: PersistScope, reasoning: impl Into<String>) -> Self {
        Self {
            allow,
            persist,
            reasoning: reasoning.into(),
        }
    }
}

/// Which stage of the decision algorithm produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Cache,
    DenyRule,
    AllowRule,
    Adjudicator,
    /// The adjudicator failed and the engine allowed the action once.
    FailOpen,
}

/// An immutable record of one `decide()` call, written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub request: ApprovalRequest,
    /// The generalized cache key computed for the request.
    pub pattern: String,
    pub decision: ApprovalDecision,
    pub source: DecisionSource,
    /// Wall-clock time the record was created (UTC).
    pub timestamp: DateTime<Utc>,
}

/// The structured request sent to the external adjudicator.
///
/// `pattern_hint` is the generalized cache key, so the adjudicator can answer
/// for the whole class of targets when it chooses `persist = always`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjudicationRequest {
    pub action: ActionKind,
    pub target: String,
    pub context: String,
    pub pattern_hint: String,
    #[serde(default)]
    pub prior_decisions: Vec<PriorDecision>,
}
