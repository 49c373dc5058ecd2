//! Audit entry and exported log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tandem_contracts::approval::{DecisionRecord, DecisionSource};

/// One link in the decision hash chain.
///
/// Editing any field, including the embedded `record`, breaks `this_hash`
/// and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub session_id: String,
    pub record: DecisionRecord,
    /// `this_hash` of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,
    pub this_hash: String,
}

impl AuditEntry {
    /// 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A snapshot of a session's decision trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub session_id: String,
    pub entries: Vec<AuditEntry>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last entry; empty when the log is empty.
    pub terminal_hash: String,
}

impl AuditLog {
    /// Number of entries produced by `source`.
    pub fn count_by_source(&self, source: DecisionSource) -> usize {
        self.entries
            .iter()
            .filter(|e| e.record.source == source)
            .count()
    }

    /// One JSON object per line, in chain order.
    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}
