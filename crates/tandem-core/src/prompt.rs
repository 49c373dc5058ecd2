//! System prompts, phase messages, and the carried working context.
//!
//! Nothing in this module affects control flow. Persona text only changes the
//! system prompt of the role it targets; the approval token is the single
//! string the orchestrator inspects.

use tandem_contracts::role::Role;

use crate::config::{Persona, PersonaPosition};

/// An evaluation starting with this token (after trimming, case-insensitive)
/// ends the run as Complete.
pub const APPROVAL_TOKEN: &str = "APPROVED";

const PLANNER_PROMPT: &str = "You are the planning role in a two-role coding loop. \
Read the task and context, then write a concrete, numbered implementation plan. \
Name every file that must change and describe each change precisely.";

const IMPLEMENTER_PROMPT: &str = "You are the implementing role in a two-role coding loop. \
Carry out the plan exactly. For every file you create or replace, write a line \
`File: <path>` followed by a fenced code block containing the complete new contents.";

const REVIEWER_PROMPT: &str = "You are reviewing an implementation produced from your plan. \
If it fully satisfies the task, begin your reply with the word APPROVED. \
Otherwise list the concrete problems that must be fixed in the next iteration.";

/// The three system prompts a run uses, with persona text already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompts {
    pub planning: String,
    pub implementing: String,
    pub evaluating: String,
}

impl SystemPrompts {
    /// Build the prompts, splicing `persona` into the roles it targets.
    pub fn build(persona: Option<&Persona>) -> Self {
        Self {
            planning: with_persona(PLANNER_PROMPT, Role::Planner, persona),
            implementing: with_persona(IMPLEMENTER_PROMPT, Role::Implementer, persona),
            evaluating: with_persona(REVIEWER_PROMPT, Role::Planner, persona),
        }
    }
}

fn with_persona(base: &str, role: Role, persona: Option<&Persona>) -> String {
    match persona {
        Some(p) if p.target.applies_to(role) && !p.text.trim().is_empty() => match p.position {
            PersonaPosition::Prepend => format!("{}\n\n{}", p.text.trim(), base),
            PersonaPosition::Append => format!("{}\n\n{}", base, p.text.trim()),
        },
        _ => base.to_string(),
    }
}

pub fn planning_message(task: &str, context: &str) -> String {
    format!("# Task\n{task}\n\n# Context\n{context}\n\nWrite the implementation plan.")
}

pub fn implementing_message(plan: &str, context: &str) -> String {
    format!("# Plan\n{plan}\n\n# Context\n{context}\n\nImplement the plan.")
}

pub fn evaluating_message(task: &str, plan: &str, implementation: &str, context: &str) -> String {
    format!(
        "# Task\n{task}\n\n# Plan\n{plan}\n\n# Implementation\n{implementation}\n\n\
         # Context\n{context}\n\nReview the implementation against the task and plan."
    )
}

/// True when `evaluation` signals reviewer approval.
pub fn is_approved(evaluation: &str) -> bool {
    evaluation
        .trim()
        .to_ascii_uppercase()
        .starts_with(APPROVAL_TOKEN)
}

/// Format the section appended to the context after a rejected iteration.
pub fn feedback_section(iteration: u32, implementation: &str, feedback: &str) -> String {
    format!(
        "## Feedback from iteration {iteration}\n\n\
         ### Previous implementation\n{implementation}\n\n\
         ### Reviewer feedback\n{feedback}\n\n\
         Address every point of the reviewer feedback above in the next iteration."
    )
}

/// The context string carried from one iteration to the next.
///
/// The initial context is always kept. Feedback sections accumulate after it;
/// with `max_feedback_rounds = Some(n)` only the `n` most recent survive.
/// The latest feedback is always carried, so `Some(0)` behaves as `Some(1)`.
#[derive(Debug, Clone)]
pub struct WorkingContext {
    initial: String,
    feedback: Vec<String>,
    max_feedback_rounds: Option<usize>,
}

impl WorkingContext {
    pub fn new(initial: impl Into<String>, max_feedback_rounds: Option<usize>) -> Self {
        Self {
            initial: initial.into(),
            feedback: Vec::new(),
            max_feedback_rounds: max_feedback_rounds.map(|n| n.max(1)),
        }
    }

    pub fn push_feedback(&mut self, section: String) {
        self.feedback.push(section);
        if let Some(max) = self.max_feedback_rounds {
            let excess = self.feedback.len().saturating_sub(max);
            self.feedback.drain(..excess);
        }
    }

    pub fn render(&self) -> String {
        if self.feedback.is_empty() {
            return self.initial.clone();
        }
        let mut out = self.initial.clone();
        for section in &self.feedback {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(section);
        }
        out
    }
}
