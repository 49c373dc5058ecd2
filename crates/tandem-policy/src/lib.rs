//! # tandem-policy
//!
//! The approval engine for the Tandem runtime.
//!
//! ## Overview
//!
//! [`ApprovalEngine`] gates privileged agent actions (file reads and writes,
//! command execution, browsing, deletion). Each request is answered from a
//! learned cache, then built-in and caller-supplied deny and allow matchers,
//! and finally an external [`Adjudicator`](tandem_core::traits::Adjudicator).
//! The engine implements [`ApprovalGate`](tandem_core::traits::ApprovalGate)
//! so the orchestrator can forward requests to it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tandem_policy::{ApprovalEngine, PolicyConfig};
//!
//! let engine = ApprovalEngine::with_defaults(&PolicyConfig::default(), Box::new(adjudicator))?;
//! let decision = engine.decide(&request);
//! ```
//!
//! ## Patterns
//!
//! Matchers see the literal `action:target`. The cache is keyed by the
//! generalized pattern (see [`pattern`]), so one `persist = always` answer
//! covers every target in the same class.

pub mod adjudication;
pub mod engine;
pub mod pattern;
pub mod rule;

pub use engine::ApprovalEngine;
pub use rule::{PolicyConfig, RuleSet};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tandem_contracts::{
        approval::{ActionKind, ApprovalRequest, DecisionRecord, DecisionSource, PersistScope},
        error::{TandemError, TandemResult},
    };
    use tandem_core::{testing::ScriptedAdjudicator, traits::AuditWriter};

    use crate::{
        engine::{REASON_ALLOW, REASON_CACHED, REASON_DENY},
        ApprovalEngine, PolicyConfig,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    const ALWAYS_ALLOW: &str =
        r#"{"allow": true, "persist": "always", "reasoning": "container tooling is fine"}"#;

    fn engine(adjudicator: &ScriptedAdjudicator) -> ApprovalEngine {
        ApprovalEngine::with_defaults(&PolicyConfig::default(), Box::new(adjudicator.clone()))
            .expect("built-in patterns compile")
    }

    fn req(action: ActionKind, target: &str) -> ApprovalRequest {
        ApprovalRequest::new(action, target, "agent needs this")
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        records: Arc<Mutex<Vec<DecisionRecord>>>,
    }

    impl AuditWriter for RecordingWriter {
        fn write(&self, record: &DecisionRecord) -> TandemResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct BrokenWriter;

    impl AuditWriter for BrokenWriter {
        fn write(&self, _record: &DecisionRecord) -> TandemResult<()> {
            Err(TandemError::AuditWriteFailed {
                reason: "disk full".to_string(),
            })
        }
    }

    // ── 1. safe pattern, then cache ───────────────────────────────────────────

    #[test]
    fn safe_write_is_allowed_and_cached_for_its_class() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);

        let first = engine.decide(&req(ActionKind::Write, "/project/src/app.ts"));
        assert!(first.allow);
        assert_eq!(first.persist, PersistScope::Always);
        assert_eq!(first.reasoning, REASON_ALLOW);

        let second = engine.decide(&req(ActionKind::Write, "/project/src/other.ts"));
        assert!(second.allow);
        assert_eq!(second.reasoning, REASON_CACHED);
        assert_eq!(adjudicator.call_count(), 0);
        assert_eq!(engine.export_rules().get("write:/project/src/*.ts"), Some(&true));
    }

    // ── 2. blocked pattern ────────────────────────────────────────────────────

    #[test]
    fn destructive_command_is_blocked_without_adjudication() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);

        let decision = engine.decide(&req(ActionKind::Execute, "rm -rf /"));
        assert!(!decision.allow);
        assert_eq!(decision.persist, PersistScope::Always);
        assert_eq!(decision.reasoning, REASON_DENY);
        assert_eq!(adjudicator.call_count(), 0);
    }

    #[test]
    fn deny_wins_when_both_lists_match() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let custom = PolicyConfig {
            deny: vec![],
            allow: vec!["^execute:".to_string()],
        };
        let engine = ApprovalEngine::with_defaults(&custom, Box::new(adjudicator.clone())).unwrap();

        let decision = engine.decide(&req(ActionKind::Execute, "sudo rm -rf /var/lib"));
        assert!(!decision.allow);
        assert_eq!(decision.reasoning, REASON_DENY);

        let decision = engine.decide(&req(ActionKind::Execute, "docker compose up"));
        assert!(decision.allow);
        assert_eq!(decision.reasoning, REASON_ALLOW);
    }

    #[test]
    fn cached_allow_never_overrides_a_deny_matcher() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);

        let warm = engine.decide(&req(ActionKind::Execute, "ls ./target/debug"));
        assert_eq!(warm.reasoning, REASON_ALLOW);
        assert_eq!(engine.export_rules().get("execute:ls ./target/*"), Some(&true));

        let chained = engine.decide(&req(ActionKind::Execute, "ls ./target/x; sudo rm -rf /"));
        assert!(!chained.allow);
        assert_eq!(chained.reasoning, REASON_DENY);

        engine.decide(&req(ActionKind::Write, "/p/node_modules/a/b.js"));
        let secret = engine.decide(&req(ActionKind::Write, "/p/node_modules/.ssh/config.json"));
        assert!(!secret.allow);
        assert_eq!(secret.reasoning, REASON_DENY);

        // The learned allow for the class still serves safe members.
        let again = engine.decide(&req(ActionKind::Execute, "ls ./target/release"));
        assert!(again.allow);
        assert_eq!(again.reasoning, REASON_CACHED);
        assert_eq!(adjudicator.call_count(), 0);
    }

    #[test]
    fn imported_allow_never_overrides_a_deny_matcher() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);
        engine.import_rules([("read:/repo/.env".to_string(), true)]);

        let decision = engine.decide(&req(ActionKind::Read, "/repo/.env"));
        assert!(!decision.allow);
        assert_eq!(decision.reasoning, REASON_DENY);
    }

    #[test]
    fn allowing_one_host_does_not_cover_its_whole_domain() {
        let adjudicator = ScriptedAdjudicator::replying(
            r#"{"allow": false, "persist": "once", "reasoning": "unknown host"}"#,
        );
        let engine = engine(&adjudicator);

        let known = engine.decide(&req(ActionKind::Browse, "https://pypi.org"));
        assert!(known.allow);
        assert_eq!(known.reasoning, REASON_ALLOW);

        let unknown = engine.decide(&req(ActionKind::Browse, "https://evil-exfil.org"));
        assert!(!unknown.allow);
        assert_eq!(unknown.reasoning, "unknown host");
        assert_eq!(adjudicator.call_count(), 1);
    }

    // ── 3. adjudicated and learned ────────────────────────────────────────────

    #[test]
    fn always_adjudication_is_learned_and_reused() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);

        let first = engine.decide(&req(ActionKind::Execute, "docker compose up"));
        assert!(first.allow);
        assert_eq!(first.persist, PersistScope::Always);
        assert_eq!(first.reasoning, "container tooling is fine");

        let second = engine.decide(&req(ActionKind::Execute, "docker compose up"));
        assert_eq!(second.reasoning, REASON_CACHED);
        assert_eq!(adjudicator.call_count(), 1);

        let sent = &adjudicator.requests()[0];
        assert_eq!(sent.pattern_hint, "execute:docker compose up");
        assert_eq!(sent.context, "agent needs this");
    }

    #[test]
    fn once_and_session_adjudications_are_not_cached() {
        let adjudicator = ScriptedAdjudicator::replying(
            r#"{"allow": false, "persist": "session", "reasoning": "not today"}"#,
        );
        let engine = engine(&adjudicator);

        for _ in 0..2 {
            let decision = engine.decide(&req(ActionKind::Execute, "docker compose up"));
            assert!(!decision.allow);
            assert_eq!(decision.persist, PersistScope::Session);
        }
        assert_eq!(adjudicator.call_count(), 2);
        assert!(engine.export_rules().is_empty());
    }

    // ── 4. fail-open ──────────────────────────────────────────────────────────

    #[test]
    fn adjudicator_failure_allows_once_and_leaves_cache_untouched() {
        let adjudicator = ScriptedAdjudicator::failing("connection refused");
        let engine = engine(&adjudicator);
        let before = engine.export_rules();

        let decision = engine.decide(&req(ActionKind::Execute, "docker compose up"));
        assert!(decision.allow);
        assert_eq!(decision.persist, PersistScope::Once);
        assert!(decision.reasoning.contains("connection refused"));
        assert_eq!(engine.export_rules(), before);

        engine.decide(&req(ActionKind::Execute, "docker compose up"));
        assert_eq!(adjudicator.call_count(), 2);
    }

    #[test]
    fn malformed_reply_fails_open() {
        let adjudicator = ScriptedAdjudicator::replying(r#"{"allow": "probably"}"#);
        let engine = engine(&adjudicator);

        let decision = engine.decide(&req(ActionKind::Browse, "https://example.com/pricing"));
        assert!(decision.allow);
        assert_eq!(decision.persist, PersistScope::Once);
        assert!(engine.export_rules().is_empty());
    }

    #[test]
    fn missing_persist_is_treated_as_once() {
        let adjudicator = ScriptedAdjudicator::replying(r#"{"allow": true, "reasoning": "ok"}"#);
        let engine = engine(&adjudicator);

        let decision = engine.decide(&req(ActionKind::Execute, "make deploy-staging"));
        assert!(decision.allow);
        assert_eq!(decision.persist, PersistScope::Once);
        assert!(engine.export_rules().is_empty());
    }

    // ── 5. rule management ────────────────────────────────────────────────────

    #[test]
    fn export_import_and_clear() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let source = engine(&adjudicator);
        source.decide(&req(ActionKind::Execute, "docker compose up"));
        source.decide(&req(ActionKind::Write, "/project/src/app.ts"));
        let exported = source.export_rules();
        assert_eq!(exported.len(), 2);

        let fresh_adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let target = engine(&fresh_adjudicator);
        target.import_rules([("execute:docker compose up".to_string(), false)]);
        target.import_rules(exported.clone());
        assert_eq!(target.export_rules(), exported);

        let decision = target.decide(&req(ActionKind::Execute, "docker compose up"));
        assert_eq!(decision.reasoning, REASON_CACHED);
        assert!(decision.allow);
        assert_eq!(fresh_adjudicator.call_count(), 0);

        target.clear();
        assert!(target.export_rules().is_empty());
        assert_eq!(target.cached_len(), 0);
    }

    #[test]
    fn imported_literal_keys_are_generalized() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);
        engine.import_rules([("browse:https://staging.example.com/v1/items/77".to_string(), true)]);

        assert!(engine
            .export_rules()
            .contains_key("browse:https://staging.example.com/v1/items/*"));
        let decision = engine.decide(&req(
            ActionKind::Browse,
            "https://staging.example.com/v1/items/12",
        ));
        assert_eq!(decision.reasoning, REASON_CACHED);
    }

    #[test]
    fn invalid_custom_pattern_fails_construction() {
        let custom = PolicyConfig {
            deny: vec!["[unterminated".to_string()],
            allow: vec![],
        };
        let adjudicator = Box::new(ScriptedAdjudicator::replying(ALWAYS_ALLOW));
        let result = ApprovalEngine::with_defaults(&custom, adjudicator);
        assert!(matches!(result, Err(TandemError::InvalidPattern { .. })));
    }

    // ── 6. audit trail ────────────────────────────────────────────────────────

    #[test]
    fn every_decision_is_recorded_with_its_source() {
        let writer = RecordingWriter::default();
        let engine =
            engine(&ScriptedAdjudicator::failing("timeout")).with_audit(Box::new(writer.clone()));

        engine.decide(&req(ActionKind::Write, "/project/src/app.ts"));
        engine.decide(&req(ActionKind::Write, "/project/src/lib.ts"));
        engine.decide(&req(ActionKind::Execute, "rm -rf /"));
        engine.decide(&req(ActionKind::Execute, "docker compose up"));

        let records = writer.records.lock().unwrap();
        let sources: Vec<DecisionSource> = records.iter().map(|r| r.source).collect();
        assert_eq!(
            sources,
            vec![
                DecisionSource::AllowRule,
                DecisionSource::Cache,
                DecisionSource::DenyRule,
                DecisionSource::FailOpen,
            ]
        );
        assert_eq!(records[1].pattern, "write:/project/src/*.ts");
    }

    #[test]
    fn audit_failure_does_not_change_the_decision() {
        let engine =
            engine(&ScriptedAdjudicator::replying(ALWAYS_ALLOW)).with_audit(Box::new(BrokenWriter));
        let decision = engine.decide(&req(ActionKind::Execute, "rm -rf /"));
        assert!(!decision.allow);
        assert_eq!(decision.reasoning, REASON_DENY);
    }

    // ── 7. concurrency ────────────────────────────────────────────────────────

    #[test]
    fn concurrent_decisions_share_one_cache() {
        let adjudicator = ScriptedAdjudicator::replying(ALWAYS_ALLOW);
        let engine = engine(&adjudicator);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let engine = &engine;
                scope.spawn(move || {
                    let target = format!("/project/src/module_{i}.rs");
                    let decision = engine.decide(&req(ActionKind::Write, &target));
                    assert!(decision.allow);
                    let decision = engine.decide(&req(ActionKind::Execute, "rm -rf ~"));
                    assert!(!decision.allow);
                });
            }
        });

        let rules = engine.export_rules();
        assert_eq!(rules.get("write:/project/src/*.rs"), Some(&true));
        assert_eq!(rules.get("execute:rm -rf ~"), Some(&false));
        assert_eq!(adjudicator.call_count(), 0);
    }
}
