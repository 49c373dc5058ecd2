//! Advisory report and declared file-change types.
//!
//! After the Implementing phase, the orchestrator may hand each declared file
//! change to an advisory collaborator. Its report never blocks the run.

use serde::{Deserialize, Serialize};

/// A file the implementer declared it is creating or replacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

/// What an advisory collaborator found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryReport {
    pub needs_review: bool,
    /// Free-text concerns. Empty means "no issue".
    pub signals: Vec<String>,
    pub recommendation: String,
    /// Remediation options the host may offer.
    pub options: Vec<String>,
}

impl AdvisoryReport {
    /// The report for a file with nothing to flag.
    pub fn clean() -> Self {
        Self::default()
    }
}
