//! The approval engine.
//!
//! `ApprovalEngine` answers every request with a definite decision. Stages,
//! first hit wins:
//!
//! 1. Compute the generalized pattern for the request.
//! 2. Cache lookup on the pattern. A cached allow is skipped when a deny
//!    matcher hits the literal key, so deny precedence survives the cache.
//! 3. Deny matchers against the literal key. The hit is cached as a deny
//!    unless the pattern already holds a learned allow for its class.
//! 4. Allow matchers against the literal key.
//! 5. Ask the adjudicator. A usable reply with `persist = always` is cached;
//!    any failure allows once and leaves the cache untouched.
//!
//! Each decision is described by a `DecisionRecord` handed to the optional
//! audit writer. Audit failures are logged and never change the decision.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock},
};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use tandem_contracts::{
    approval::{
        ApprovalDecision, ApprovalRequest, DecisionRecord, DecisionSource, PersistScope,
    },
    error::TandemResult,
};
use tandem_core::traits::{Adjudicator, ApprovalGate, AuditWriter};

use crate::{
    adjudication::{build_request, parse_reply},
    pattern::{generalize, literal_key, pattern_for},
    rule::{PolicyConfig, RuleSet},
};

pub const REASON_CACHED: &str = "Cached rule";
pub const REASON_DENY: &str = "Blocked pattern";
pub const REASON_ALLOW: &str = "Safe pattern";

/// Decides approval requests from rules, a learned cache, and an adjudicator.
///
/// Safe to share across threads; `decide` takes `&self`.
pub struct ApprovalEngine {
    rules: RuleSet,
    cache: RwLock<HashMap<String, bool>>,
    adjudicator: Box<dyn Adjudicator>,
    audit: Option<Box<dyn AuditWriter>>,
}

impl std::fmt::Debug for ApprovalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalEngine")
            .field("rules", &self.rules)
            .field("cached_patterns", &self.cached_len())
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

impl ApprovalEngine {
    /// Build an engine over an already compiled rule set with an empty cache.
    pub fn new(rules: RuleSet, adjudicator: Box<dyn Adjudicator>) -> Self {
        Self {
            rules,
            cache: RwLock::new(HashMap::new()),
            adjudicator,
            audit: None,
        }
    }

    /// Build an engine over the built-in matcher lists extended with
    /// `custom`. Returns `InvalidPattern` if any custom pattern fails to
    /// compile.
    pub fn with_defaults(
        custom: &PolicyConfig,
        adjudicator: Box<dyn Adjudicator>,
    ) -> TandemResult<Self> {
        Ok(Self::new(RuleSet::with_defaults(custom)?, adjudicator))
    }

    /// Write a `DecisionRecord` for every decision to `writer`.
    pub fn with_audit(mut self, writer: Box<dyn AuditWriter>) -> Self {
        self.audit = Some(writer);
        self
    }

    /// Decide `request`. Never fails.
    pub fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let pattern = pattern_for(request);
        let (decision, source) = self.evaluate(request, &pattern);

        info!(
            action = %request.action,
            pattern = %pattern,
            allow = decision.allow,
            persist = %decision.persist,
            source = ?source,
            "approval decided"
        );
        self.record(request, &pattern, &decision, source);
        decision
    }

    fn evaluate(
        &self,
        request: &ApprovalRequest,
        pattern: &str,
    ) -> (ApprovalDecision, DecisionSource) {
        let literal = literal_key(request);
        let denied_by = self.rules.first_deny(&literal);

        // ── Step 1: learned cache ────────────────────────────────────────────
        // A cached allow covers a whole class of targets, so it never
        // overrides a deny matcher hit on the literal request.
        match self.cached(pattern) {
            Some(true) if denied_by.is_some() => {
                debug!(
                    pattern = %pattern,
                    literal = %literal,
                    "cached allow overridden by deny matcher"
                );
            }
            Some(allow) => {
                debug!(pattern = %pattern, allow, "cache hit");
                return (
                    ApprovalDecision::new(allow, PersistScope::Always, REASON_CACHED),
                    DecisionSource::Cache,
                );
            }
            None => {}
        }

        // ── Step 2: deny matchers ────────────────────────────────────────────
        if let Some(matcher) = denied_by {
            debug!(literal = %literal, matcher = %matcher.source(), "deny matcher hit");
            if self.cached(pattern) != Some(true) {
                self.remember(pattern, false);
            }
            return (
                ApprovalDecision::new(false, PersistScope::Always, REASON_DENY),
                DecisionSource::DenyRule,
            );
        }

        // ── Step 3: allow matchers ───────────────────────────────────────────
        if let Some(matcher) = self.rules.first_allow(&literal) {
            debug!(literal = %literal, matcher = %matcher.source(), "allow matcher hit");
            self.remember(pattern, true);
            return (
                ApprovalDecision::new(true, PersistScope::Always, REASON_ALLOW),
                DecisionSource::AllowRule,
            );
        }

        // ── Step 4: adjudicator ──────────────────────────────────────────────
        let adjudication = build_request(request, pattern);
        match self
            .adjudicator
            .adjudicate(&adjudication)
            .and_then(|raw| parse_reply(&raw))
        {
            Ok(decision) => {
                if decision.persist == PersistScope::Always {
                    self.remember(pattern, decision.allow);
                }
                (decision, DecisionSource::Adjudicator)
            }
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "adjudication failed, allowing once");
                (
                    ApprovalDecision::new(
                        true,
                        PersistScope::Once,
                        format!("Adjudicator unavailable, allowed once: {}", e),
                    ),
                    DecisionSource::FailOpen,
                )
            }
        }
    }

    fn cached(&self, pattern: &str) -> Option<bool> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
            .copied()
    }

    fn remember(&self, pattern: &str, allow: bool) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), allow);
    }

    fn record(
        &self,
        request: &ApprovalRequest,
        pattern: &str,
        decision: &ApprovalDecision,
        source: DecisionSource,
    ) {
        let Some(writer) = &self.audit else {
            return;
        };
        let record = DecisionRecord {
            request: request.clone(),
            pattern: pattern.to_string(),
            decision: decision.clone(),
            source,
            timestamp: Utc::now(),
        };
        if let Err(e) = writer.write(&record) {
            error!(pattern = %pattern, error = %e, "failed to write decision record");
        }
    }

    /// Snapshot of every cached pattern and its allow flag, sorted by key.
    ///
    /// The result can be persisted by the host and fed back through
    /// `import_rules` in a later session.
    pub fn export_rules(&self) -> BTreeMap<String, bool> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Merge `rules` into the cache. Imported entries overwrite existing
    /// ones; keys are re-generalized so hand-written literals still hit.
    pub fn import_rules<I>(&self, rules: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let mut imported = 0usize;
        for (key, allow) in rules {
            cache.insert(generalize(&key), allow);
            imported += 1;
        }
        info!(imported, total = cache.len(), "imported cached rules");
    }

    /// Drop every cached pattern. Matchers are unaffected.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("cleared cached rules");
    }

    /// Number of patterns currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ApprovalGate for ApprovalEngine {
    fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalEngine::decide(self, request)
    }
}
