//! Building adjudication requests and parsing adjudicator replies.
//!
//! Replies are free text expected to contain a JSON object such as
//! `{"allow": true, "persist": "always", "reasoning": "..."}`. The first
//! balanced object in the text is used, so prose or a fenced code block
//! around it is tolerated.

use serde_json::Value;
use tracing::debug;

use tandem_contracts::{
    approval::{AdjudicationRequest, ApprovalDecision, ApprovalRequest, PersistScope},
    error::{TandemError, TandemResult},
};

const NO_REASONING: &str = "No reasoning provided";

pub fn build_request(request: &ApprovalRequest, pattern: &str) -> AdjudicationRequest {
    AdjudicationRequest {
        action: request.action,
        target: request.target.clone(),
        context: request.context.clone(),
        pattern_hint: pattern.to_string(),
        prior_decisions: request.prior_decisions.clone(),
    }
}

/// Parse an adjudicator reply into a decision.
///
/// Fails when no JSON object is present or `allow` is not a boolean. A
/// missing or unrecognized `persist` falls back to `Once`.
pub fn parse_reply(raw: &str) -> TandemResult<ApprovalDecision> {
    let object = first_json_object(raw).ok_or_else(|| TandemError::AdjudicationFailed {
        reason: "reply contains no JSON object".to_string(),
    })?;
    let value: Value = serde_json::from_str(object).map_err(|e| TandemError::AdjudicationFailed {
        reason: format!("reply is not valid JSON: {}", e),
    })?;

    let allow = value
        .get("allow")
        .and_then(Value::as_bool)
        .ok_or_else(|| TandemError::AdjudicationFailed {
            reason: "reply has no boolean 'allow' field".to_string(),
        })?;

    let persist = match value.get("persist").and_then(Value::as_str) {
        Some(raw_scope) => raw_scope.parse::<PersistScope>().unwrap_or_else(|_| {
            debug!(persist = %raw_scope, "unrecognized persist scope, using once");
            PersistScope::Once
        }),
        None => PersistScope::Once,
    };

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(NO_REASONING)
        .to_string();

    Ok(ApprovalDecision::new(allow, persist, reasoning))
}

/// Slice out the first balanced `{...}` in `text`, skipping braces inside
/// JSON strings.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use tandem_contracts::approval::ActionKind;

    use super::*;

    #[test]
    fn parses_bare_json() {
        let d = parse_reply(r#"{"allow": true, "persist": "always", "reasoning": "safe build"}"#)
            .unwrap();
        assert!(d.allow);
        assert_eq!(d.persist, PersistScope::Always);
        assert_eq!(d.reasoning, "safe build");
    }

    #[test]
    fn tolerates_prose_and_fences() {
        let raw = "Sure, here is my verdict:\n```json\n\
                   {\"allow\": false, \"persist\": \"session\", \
                   \"reasoning\": \"touches {prod} config\"}\n```\nLet me know.";
        let d = parse_reply(raw).unwrap();
        assert!(!d.allow);
        assert_eq!(d.persist, PersistScope::Session);
        assert_eq!(d.reasoning, "touches {prod} config");
    }

    #[test]
    fn invalid_or_missing_persist_defaults_to_once() {
        let d = parse_reply(r#"{"allow": true, "persist": "forever"}"#).unwrap();
        assert_eq!(d.persist, PersistScope::Once);
        assert_eq!(d.reasoning, NO_REASONING);

        let d = parse_reply(r#"{"allow": true}"#).unwrap();
        assert_eq!(d.persist, PersistScope::Once);
    }

    #[test]
    fn non_boolean_allow_is_rejected() {
        for raw in [
            r#"{"allow": "yes", "persist": "once"}"#,
            r#"{"persist": "always"}"#,
            "I think this is fine.",
            "{ not json }",
            "{\"allow\": true",
        ] {
            assert!(
                matches!(parse_reply(raw), Err(TandemError::AdjudicationFailed { .. })),
                "expected failure for {raw:?}"
            );
        }
    }

    #[test]
    fn request_carries_pattern_hint_and_history() {
        let mut request =
            ApprovalRequest::new(ActionKind::Execute, "docker compose up", "start db");
        request.prior_decisions.push(tandem_contracts::approval::PriorDecision {
            action: ActionKind::Execute,
            target: "docker ps".to_string(),
            allow: true,
        });

        let adj = build_request(&request, "execute:docker compose up");
        assert_eq!(adj.pattern_hint, "execute:docker compose up");
        assert_eq!(adj.context, "start db");
        assert_eq!(adj.prior_decisions.len(), 1);
    }
}
