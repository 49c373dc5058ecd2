//! Runtime error types for the Tandem engines.
//!
//! All fallible operations return `TandemResult<T>`. Budget exhaustion and
//! cancellation are NOT errors; they surface as `RunOutcome` values.

use thiserror::Error;

/// The unified error type for the Tandem runtime.
#[derive(Debug, Error)]
pub enum TandemError {
    /// A configuration value is missing, malformed, or out of range.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A caller-supplied matcher pattern failed to compile.
    ///
    /// Raised at engine construction, never at decision time.
    #[error("invalid {list} pattern '{pattern}': {reason}")]
    InvalidPattern {
        list: String,
        pattern: String,
        reason: String,
    },

    /// A role backend call failed during a phase.
    ///
    /// Propagated to the caller of `run()` as-is; the core does not retry.
    #[error("{role} role call failed during {phase}: {reason}")]
    RoleCallFailed {
        role: String,
        phase: String,
        reason: String,
    },

    /// The adjudicator could not be reached or returned an unusable response.
    ///
    /// The approval engine converts this into a fail-open decision; it never
    /// reaches callers of `decide()`.
    #[error("adjudication failed: {reason}")]
    AdjudicationFailed { reason: String },

    /// The orchestration state machine was driven illegally.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    /// The audit writer could not persist a decision record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

/// Convenience alias used throughout the Tandem crates.
pub type TandemResult<T> = Result<T, TandemError>;
