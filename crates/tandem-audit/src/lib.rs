//! # tandem-audit
//!
//! Append-only, SHA-256 hash-chained trail of approval decisions.
//!
//! ## Overview
//!
//! The approval engine hands every `DecisionRecord` to an `AuditWriter`.
//! [`InMemoryAuditWriter`] wraps each record in an [`AuditEntry`] linked to
//! its predecessor by hash, so editing any stored decision is detected by
//! [`verify_chain`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tandem_audit::InMemoryAuditWriter;
//!
//! let trail = InMemoryAuditWriter::new("session-42");
//! let engine = ApprovalEngine::with_defaults(&policy, adjudicator)?
//!     .with_audit(Box::new(trail.clone()));
//!
//! engine.decide(&request);
//! assert!(trail.verify_integrity());
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{hash_entry, verify_chain};
pub use entry::{AuditEntry, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
