//! Session-scoped decision trail kept in memory.
//!
//! A host creates one writer per session and passes a clone to
//! `ApprovalEngine::with_audit`. The engine appends a record for every
//! request it answers, whether from the cache, a matcher, the adjudicator or
//! a fail-open. The host keeps its own clone to export the trail as JSONL
//! at session end or to check it with `verify_integrity()`. Nothing is
//! written to disk here.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::debug;

use tandem_contracts::{
    approval::DecisionRecord,
    error::{TandemError, TandemResult},
};
use tandem_core::traits::AuditWriter;

use crate::{
    chain::{hash_entry, verify_chain},
    entry::{AuditEntry, AuditLog},
};

#[derive(Debug)]
pub(crate) struct ChainState {
    pub(crate) entries: Vec<AuditEntry>,
    pub(crate) last_hash: String,
}

/// Append-only decision trail backed by a SHA-256 hash chain.
#[derive(Debug, Clone)]
pub struct InMemoryAuditWriter {
    session_id: String,
    pub(crate) state: Arc<Mutex<ChainState>>,
}

impl InMemoryAuditWriter {
    /// Start an empty trail for `session_id`.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: Arc::new(Mutex::new(ChainState {
                entries: Vec::new(),
                last_hash: AuditEntry::GENESIS_HASH.to_string(),
            })),
        }
    }

    /// The session every entry of this trail is stamped with.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of decisions recorded so far, across all clones.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// True until the engine records its first decision.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every entry written so far. `terminal_hash` is empty for a
    /// trail with no decisions.
    pub fn export_log(&self) -> AuditLog {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        AuditLog {
            session_id: self.session_id.clone(),
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .entries
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    /// Recompute the chain and check every link. False means an entry was
    /// altered, dropped or reordered after it was written.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        verify_chain(&state.entries)
    }
}

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, record: &DecisionRecord) -> TandemResult<()> {
        let mut state = self.state.lock().map_err(|e| TandemError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        let sequence = state.entries.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_entry(&self.session_id, sequence, record, &prev_hash)?;

        debug!(
            session_id = %self.session_id,
            sequence,
            pattern = %record.pattern,
            allow = record.decision.allow,
            "decision appended to audit chain"
        );

        state.entries.push(AuditEntry {
            sequence,
            session_id: self.session_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;
        Ok(())
    }
}
