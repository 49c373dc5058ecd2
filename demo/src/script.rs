//! Scripted collaborators for the demo commands.

use tandem_contracts::advisory::AdvisoryReport;
use tandem_core::testing::{ScriptedAdjudicator, ScriptedAdvisor, ScriptedBackend, ScriptedReply};

/// What the scripted adjudicator answers for requests no matcher covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Verdict {
    /// Allow and remember the pattern.
    Allow,
    /// Deny and remember the pattern.
    Deny,
    /// Allow this request only.
    Once,
    /// Simulate an unreachable adjudicator.
    Fail,
}

pub fn adjudicator(verdict: Verdict) -> ScriptedAdjudicator {
    match verdict {
        Verdict::Allow => ScriptedAdjudicator::replying(
            r#"{"allow": true, "persist": "always", "reasoning": "Routine for this project"}"#,
        ),
        Verdict::Deny => ScriptedAdjudicator::replying(
            "Verdict follows.\n```json\n{\"allow\": false, \"persist\": \"always\", \
             \"reasoning\": \"Outside the task's scope\"}\n```",
        ),
        Verdict::Once => ScriptedAdjudicator::replying(
            r#"{"allow": true, "persist": "once", "reasoning": "Acceptable this time"}"#,
        ),
        Verdict::Fail => ScriptedAdjudicator::failing("adjudicator endpoint unreachable"),
    }
}

pub const CHANGED_FILE: &str = "src/handler.rs";

/// Planner script: a plan then an evaluation for each pass, approving on
/// pass `approve_on` (never when 0).
pub fn planner(passes: u32, approve_on: u32) -> ScriptedBackend {
    let mut replies = Vec::new();
    for pass in 1..=passes {
        replies.push(ScriptedReply::with_reasoning(
            format!("Pass {pass}: the handler needs input validation first."),
            format!("1. Validate the request body in {CHANGED_FILE}.\n2. Return 400 on bad input."),
        ));
        let evaluation = if pass == approve_on {
            "APPROVED: validation and error path look correct.".to_string()
        } else {
            format!("Pass {pass} misses the empty-body case; handle it explicitly.")
        };
        replies.push(ScriptedReply::with_reasoning(
            "Checking the implementation against the plan.",
            evaluation,
        ));
    }
    ScriptedBackend::new(replies)
}

pub fn implementer(passes: u32) -> ScriptedBackend {
    let replies = (1..=passes)
        .map(|pass| {
            ScriptedReply::text(format!(
                "Revision {pass}.\n\nFile: {CHANGED_FILE}\n```rust\n\
                 pub fn handle(body: &str) -> Result<String, u16> {{\n    \
                 if body.trim().is_empty() {{\n        return Err(400);\n    }}\n    \
                 Ok(body.to_uppercase())\n}}\n```\n"
            ))
        })
        .collect();
    ScriptedBackend::new(replies)
}

pub fn advisor() -> ScriptedAdvisor {
    ScriptedAdvisor::new().with_report(
        CHANGED_FILE,
        AdvisoryReport {
            needs_review: true,
            signals: vec!["public signature changed".to_string()],
            recommendation: "Check callers of handle() for the new error type.".to_string(),
            options: vec!["update callers".to_string(), "keep old signature".to_string()],
        },
    )
}
