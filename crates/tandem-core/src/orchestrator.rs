//! The Tandem orchestrator: the bounded two-role refinement loop.
//!
//! Each pass runs the phases in a fixed order:
//!
//!   Planning → Implementing → [Advisory] → Evaluating → (Complete | next pass | Failed)
//!
//! Exactly one role call is outstanding at a time, and every response is
//! drained completely before the phase advances. Updates are emitted through
//! the caller's sink in phase order and never interleave.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};

use tracing::{debug, info, warn};

use tandem_contracts::{
    approval::{ActionKind, ApprovalDecision, ApprovalRequest, PersistScope},
    error::{TandemError, TandemResult},
    orchestration::{IterationUpdate, OrchestrationState, Phase, RunId, RunOutcome},
    role::{Message, Role, RoleResponse},
};

use crate::{
    changes::extract_file_changes,
    config::OrchestratorConfig,
    prompt::{
        evaluating_message, feedback_section, implementing_message, is_approved,
        planning_message, SystemPrompts, WorkingContext,
    },
    traits::{Advisor, ApprovalGate, BackendFactory, RoleBackend},
};

/// Cooperative cancellation flag shared between the host and a run.
///
/// The orchestrator checks it before entering each phase. A phase that has
/// already started always runs to completion. A cancel applies to the run in
/// flight, or to the next run if none is; the token is re-armed when that run
/// ends.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Withdraw a pending cancel.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Read-only access to a run's state, usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<RwLock<OrchestrationState>>);

impl StateHandle {
    /// Clone the current state.
    pub fn snapshot(&self) -> OrchestrationState {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut OrchestrationState)) {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

/// Clears the running flag and re-arms the cancel token when a run ends,
/// however it ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    cancel: &'a CancelToken,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool, cancel: &'a CancelToken) -> TandemResult<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TandemError::StateMachineError {
                reason: "a run is already in progress on this orchestrator".to_string(),
            })?;
        Ok(Self { running, cancel })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.cancel.reset();
        self.running.store(false, Ordering::Release);
    }
}

/// Drives one refinement task across the planner and implementer roles.
///
/// Construct one orchestrator per task. A second `run()` while one is in
/// flight is rejected with `TandemError::StateMachineError`.
pub struct Orchestrator {
    planner: Box<dyn RoleBackend>,
    implementer: Box<dyn RoleBackend>,
    approval: Option<Arc<dyn ApprovalGate>>,
    advisor: Option<Box<dyn Advisor>>,
    prompts: SystemPrompts,
    max_iterations: u32,
    max_feedback_rounds: Option<usize>,
    state: StateHandle,
    cancel: CancelToken,
    running: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator from explicit backends.
    pub fn new(
        config: &OrchestratorConfig,
        planner: Box<dyn RoleBackend>,
        implementer: Box<dyn RoleBackend>,
    ) -> Self {
        let max_iterations = config.effective_max_iterations();
        if i64::from(max_iterations) != config.max_iterations {
            warn!(
                requested = config.max_iterations,
                effective = max_iterations,
                "iteration budget out of range, clamped"
            );
        }

        Self {
            planner,
            implementer,
            approval: None,
            advisor: None,
            prompts: SystemPrompts::build(config.persona.as_ref()),
            max_iterations,
            max_feedback_rounds: config.max_feedback_rounds,
            state: StateHandle::default(),
            cancel: CancelToken::default(),
            running: AtomicBool::new(false),
        }
    }

    /// Create an orchestrator whose backends are built from the per-role
    /// configuration.
    pub fn from_factory(
        config: &OrchestratorConfig,
        factory: &dyn BackendFactory,
    ) -> TandemResult<Self> {
        let planner = factory.build(Role::Planner, &config.planner)?;
        let implementer = factory.build(Role::Implementer, &config.implementer)?;
        Ok(Self::new(config, planner, implementer))
    }

    /// Route privileged actions through `gate`.
    pub fn with_approval_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.approval = Some(gate);
        self
    }

    /// Consult `advisor` after every Implementing phase.
    pub fn with_advisor(mut self, advisor: Box<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// A clone of the current state. Safe to call while a run is in flight.
    pub fn snapshot(&self) -> OrchestrationState {
        self.state.snapshot()
    }

    /// A handle for observing state from another thread.
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// The token the host sets to stop the run between phases.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Gate a privileged action the implementer wants to take.
    ///
    /// Independent of phase state. Without a configured gate every action is
    /// allowed once.
    pub fn request_approval(
        &self,
        action: ActionKind,
        target: &str,
        context: &str,
    ) -> ApprovalDecision {
        match &self.approval {
            Some(gate) => gate.decide(&ApprovalRequest::new(action, target, context)),
            None => ApprovalDecision::new(true, PersistScope::Once, "Oracle disabled"),
        }
    }

    /// Run the refinement loop for `task` starting from `context`.
    ///
    /// Every observable event is passed to `on_update` in phase order.
    ///
    /// # Errors
    ///
    /// Returns `Err` when a role call fails (`RoleCallFailed`, propagated
    /// without retry) or when another run is already in progress. Reaching
    /// the iteration budget and cancellation are NOT errors; they are
    /// `RunOutcome` variants.
    pub fn run<F>(&self, task: &str, context: &str, mut on_update: F) -> TandemResult<RunOutcome>
    where
        F: FnMut(IterationUpdate),
    {
        let _guard = RunGuard::acquire(&self.running, &self.cancel)?;
        let run_id = RunId::new();
        self.state.update(|s| *s = OrchestrationState::default());

        info!(
            run_id = %run_id,
            max_iterations = self.max_iterations,
            "orchestration run starting"
        );

        let mut working = WorkingContext::new(context, self.max_feedback_rounds);
        let mut iteration = 0u32;

        loop {
            // ── Planning ─────────────────────────────────────────────────────
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(&run_id));
            }
            iteration += 1;
            let ctx = working.render();
            self.enter(Phase::Planning, iteration, &mut on_update);

            let response = self.call_role(
                &run_id,
                Role::Planner,
                Phase::Planning,
                &self.prompts.planning,
                planning_message(task, &ctx),
            )?;
            let plan = response.text();
            let thinking = response.reasoning();
            self.state.update(|s| {
                s.plan = Some(plan.clone());
                if thinking.is_some() {
                    s.thinking = thinking.clone();
                }
            });
            if let Some(content) = thinking {
                on_update(IterationUpdate::Thinking {
                    phase: Phase::Planning,
                    iteration,
                    content,
                });
            }
            on_update(IterationUpdate::Plan {
                iteration,
                content: plan.clone(),
            });

            // ── Implementing ─────────────────────────────────────────────────
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(&run_id));
            }
            self.enter(Phase::Implementing, iteration, &mut on_update);

            // Reasoning blocks from the implementer are discarded.
            let implementation = self
                .call_role(
                    &run_id,
                    Role::Implementer,
                    Phase::Implementing,
                    &self.prompts.implementing,
                    implementing_message(&plan, &ctx),
                )?
                .text();
            self.state
                .update(|s| s.implementation = Some(implementation.clone()));
            on_update(IterationUpdate::Implementation {
                iteration,
                content: implementation.clone(),
            });

            if let Some(update) = self.advise(&run_id, iteration, &implementation) {
                on_update(update);
            }

            // ── Evaluating ───────────────────────────────────────────────────
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(&run_id));
            }
            self.enter(Phase::Evaluating, iteration, &mut on_update);

            let response = self.call_role(
                &run_id,
                Role::Planner,
                Phase::Evaluating,
                &self.prompts.evaluating,
                evaluating_message(task, &plan, &implementation, &ctx),
            )?;
            let evaluation = response.text();
            let thinking = response.reasoning();
            let approved = is_approved(&evaluation);
            self.state.update(|s| {
                s.evaluation = Some(evaluation.clone());
                if thinking.is_some() {
                    s.thinking = thinking.clone();
                }
            });
            if let Some(content) = thinking {
                on_update(IterationUpdate::Thinking {
                    phase: Phase::Evaluating,
                    iteration,
                    content,
                });
            }
            on_update(IterationUpdate::Evaluation {
                iteration,
                content: evaluation.clone(),
                approved,
            });

            // ── Convergence check ────────────────────────────────────────────
            if approved {
                self.state.update(|s| s.phase = Phase::Complete);
                info!(run_id = %run_id, iterations = iteration, "reviewer approved, run complete");
                on_update(IterationUpdate::Complete {
                    iterations: iteration,
                    implementation,
                });
                return Ok(RunOutcome::Complete {
                    iterations: iteration,
                    state: self.snapshot(),
                });
            }

            if iteration >= self.max_iterations {
                self.state.update(|s| s.phase = Phase::Failed);
                warn!(
                    run_id = %run_id,
                    iterations = iteration,
                    "iteration budget exhausted without approval"
                );
                on_update(IterationUpdate::MaxIterationsReached {
                    iterations: iteration,
                    last_evaluation: evaluation,
                });
                return Ok(RunOutcome::MaxIterationsReached {
                    iterations: iteration,
                    state: self.snapshot(),
                });
            }

            debug!(run_id = %run_id, iteration, "evaluation rejected, carrying feedback");
            working.push_feedback(feedback_section(iteration, &implementation, &evaluation));
        }
    }

    fn enter<F: FnMut(IterationUpdate)>(&self, phase: Phase, iteration: u32, on_update: &mut F) {
        self.state.update(|s| {
            s.phase = phase;
            s.iteration = iteration;
        });
        on_update(IterationUpdate::Phase { phase, iteration });
    }

    fn cancelled(&self, run_id: &RunId) -> RunOutcome {
        let state = self.snapshot();
        info!(
            run_id = %run_id,
            phase = %state.phase,
            iteration = state.iteration,
            "run cancelled between phases"
        );
        RunOutcome::Cancelled { state }
    }

    /// Submit one message to `role` and drain the whole response.
    fn call_role(
        &self,
        run_id: &RunId,
        role: Role,
        phase: Phase,
        system_prompt: &str,
        message: String,
    ) -> TandemResult<RoleResponse> {
        let backend = match role {
            Role::Planner => &self.planner,
            Role::Implementer => &self.implementer,
        };
        let fail = |e: TandemError| TandemError::RoleCallFailed {
            role: role.to_string(),
            phase: phase.to_string(),
            reason: e.to_string(),
        };

        debug!(run_id = %run_id, role = %role, phase = %phase, "submitting to role backend");
        let stream = backend
            .submit(system_prompt, &[Message::user(message)])
            .map_err(fail)?;

        let mut response = RoleResponse::default();
        for chunk in stream {
            response.blocks.push(chunk.map_err(fail)?);
        }

        debug!(
            run_id = %run_id,
            role = %role,
            phase = %phase,
            blocks = response.blocks.len(),
            "role response drained"
        );
        Ok(response)
    }

    /// Run the advisor over each declared file change.
    ///
    /// Returns an advisory update only when some file raised a signal. The
    /// result never affects the next transition.
    fn advise(
        &self,
        run_id: &RunId,
        iteration: u32,
        implementation: &str,
    ) -> Option<IterationUpdate> {
        let advisor = self.advisor.as_ref()?;

        let mut signals = Vec::new();
        let mut recommendations: Vec<String> = Vec::new();
        let mut options: Vec<String> = Vec::new();

        for change in extract_file_changes(implementation) {
            let report = advisor.analyze(&change.path, &change.content);
            if report.signals.is_empty() {
                continue;
            }
            signals.extend(report.signals.iter().map(|s| format!("{}: {}", change.path, s)));
            if !report.recommendation.trim().is_empty() {
                recommendations.push(report.recommendation);
            }
            for option in report.options {
                if !options.contains(&option) {
                    options.push(option);
                }
            }
        }

        if signals.is_empty() {
            return None;
        }

        info!(
            run_id = %run_id,
            iteration,
            signal_count = signals.len(),
            "advisory raised structural concerns"
        );
        Some(IterationUpdate::Advisory {
            iteration,
            signals,
            recommendation: recommendations.join("\n"),
            options,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
