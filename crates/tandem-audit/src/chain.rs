//! Tamper evidence for the approval trail of one session.
//!
//! Every `DecisionRecord` the approval engine hands over is hashed together
//! with the hash of the decision before it. Rewriting any past verdict (an
//! allow flipped to a deny, a cached pattern renamed, an entry dropped) breaks
//! every later link, and `verify_chain` reports it.
//!
//! Hash input, in order:
//!   1. session_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes
//!   4. compact JSON of the decision record, including pattern and source

use sha2::{Digest, Sha256};

use tandem_contracts::{
    approval::DecisionRecord,
    error::{TandemError, TandemResult},
};

use crate::entry::AuditEntry;

/// Lowercase hex SHA-256 over one entry's fields.
pub fn hash_entry(
    session_id: &str,
    sequence: u64,
    record: &DecisionRecord,
    prev_hash: &str,
) -> TandemResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| TandemError::AuditWriteFailed {
        reason: format!("decision record is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// True when every entry links to its predecessor and its stored hash
/// matches a recomputation. An empty chain is valid.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    let mut expected_prev = AuditEntry::GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64 || entry.prev_hash != expected_prev {
            return false;
        }
        match hash_entry(&entry.session_id, entry.sequence, &entry.record, &entry.prev_hash) {
            Ok(hash) if hash == entry.this_hash => {}
            _ => return false,
        }
        expected_prev = entry.this_hash.clone();
    }

    true
}
