//! Core trait definitions for the Tandem engines.
//!
//! These traits define every seam between the two engines and the outside
//! world:
//!
//! - `RoleBackend`   : untrusted model channel, one per role
//! - `BackendFactory`: builds a backend from an opaque `RoleConfig`
//! - `Adjudicator`   : external reasoning service for ambiguous actions
//! - `Advisor`       : optional structural-concern reporter
//! - `ApprovalGate`  : the decision engine as seen by the orchestrator
//! - `AuditWriter`   : append-only sink for decision records

use tandem_contracts::{
    advisory::AdvisoryReport,
    approval::{AdjudicationRequest, ApprovalDecision, ApprovalRequest, DecisionRecord},
    error::TandemResult,
    role::{Message, Role, RoleChunk},
};

use crate::config::RoleConfig;

/// A lazy, finite, one-shot sequence of response chunks.
///
/// An `Err` item aborts the phase that is draining the stream.
pub type ChunkStream = Box<dyn Iterator<Item = TandemResult<RoleChunk>> + Send>;

/// A request/response channel to the model serving one role.
///
/// The planner and implementer backends share this contract and differ only
/// in the `RoleConfig` they were built from.
pub trait RoleBackend: Send + Sync {
    /// Submit a system prompt plus message history.
    ///
    /// The returned stream must be drained completely by the caller before
    /// the phase is considered finished. It cannot be restarted.
    fn submit(&self, system_prompt: &str, history: &[Message]) -> TandemResult<ChunkStream>;
}

/// Builds role backends from configuration.
///
/// Provider and model identifiers are opaque to the core; they are handed to
/// the factory untouched.
pub trait BackendFactory: Send + Sync {
    fn build(&self, role: Role, config: &RoleConfig) -> TandemResult<Box<dyn RoleBackend>>;
}

/// The external reasoning service consulted for actions no matcher resolves.
pub trait Adjudicator: Send + Sync {
    /// Perform one request/response exchange and return the raw reply.
    ///
    /// The reply is expected to contain a JSON object shaped like
    /// `{"allow": bool, "persist": "once|session|always", "reasoning": "..."}`.
    /// Transport failures and timeouts are reported as `Err`; the approval
    /// engine turns both into a fail-open decision.
    fn adjudicate(&self, request: &AdjudicationRequest) -> TandemResult<String>;
}

/// An advisory collaborator run over each declared file change.
///
/// Must tolerate arbitrary or untracked paths and return a clean report when
/// there is nothing to flag. Reports never block the run.
pub trait Advisor: Send + Sync {
    fn analyze(&self, file_path: &str, new_content: &str) -> AdvisoryReport;
}

/// The approval engine as consumed by the orchestrator and host.
///
/// `decide` is infallible: adjudication failures are already converted into
/// decisions by the implementation. It may be called from several threads at
/// once.
pub trait ApprovalGate: Send + Sync {
    fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// The audit writer: an immutable record of every approval decision.
pub trait AuditWriter: Send + Sync {
    /// Append one decision record.
    ///
    /// Implementations must treat this as an append-only operation.
    fn write(&self, record: &DecisionRecord) -> TandemResult<()>;
}
