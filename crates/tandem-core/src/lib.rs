//! # tandem-core
//!
//! The iterative two-role orchestration runtime for Tandem.
//!
//! This crate provides:
//! - The seam traits (`RoleBackend`, `BackendFactory`, `Adjudicator`,
//!   `Advisor`, `ApprovalGate`, `AuditWriter`)
//! - The `Orchestrator` that drives Planning → Implementing → Evaluating
//! - Configuration, prompt assembly, and declared-file-change extraction
//! - Scripted collaborators in [`testing`] for tests and demos
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tandem_core::{Orchestrator, OrchestratorConfig};
//!
//! let orchestrator = Orchestrator::from_factory(&config, &factory)?
//!     .with_approval_gate(engine);
//! let outcome = orchestrator.run("add a health endpoint", "axum 0.7 service", |update| {
//!     println!("{update:?}");
//! })?;
//! ```

pub mod changes;
pub mod config;
pub mod orchestrator;
pub mod prompt;
pub mod testing;
pub mod traits;

pub use config::OrchestratorConfig;
pub use orchestrator::{CancelToken, Orchestrator, StateHandle};
