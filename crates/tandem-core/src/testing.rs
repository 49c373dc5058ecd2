//! Scripted collaborators for tests and demos.
//!
//! Every double here records what it was asked and replays a fixed script,
//! so runs are fully deterministic. Handles are cheap to clone and share
//! their recordings, letting a test keep one copy while the orchestrator or
//! engine owns another.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use tandem_contracts::{
    advisory::AdvisoryReport,
    approval::AdjudicationRequest,
    error::{TandemError, TandemResult},
    role::{Message, Role, RoleChunk},
};

use crate::{
    config::RoleConfig,
    traits::{Adjudicator, Advisor, BackendFactory, ChunkStream, RoleBackend},
};

/// One scripted backend reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Stream these chunks in order.
    Chunks(Vec<RoleChunk>),
    /// Fail `submit` itself with this reason.
    SubmitError(String),
    /// Stream these chunks, then yield an error mid-stream.
    BrokenStream(Vec<RoleChunk>, String),
}

impl ScriptedReply {
    /// A reply with a single text chunk.
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Chunks(vec![RoleChunk::text(text)])
    }

    /// A reply with a reasoning chunk followed by a text chunk.
    pub fn with_reasoning(reasoning: impl Into<String>, text: impl Into<String>) -> Self {
        ScriptedReply::Chunks(vec![RoleChunk::reasoning(reasoning), RoleChunk::text(text)])
    }
}

/// A call received by a `ScriptedBackend`.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Default)]
struct BackendState {
    replies: VecDeque<ScriptedReply>,
    calls: Vec<RecordedCall>,
    /// When set, served after the queue is empty instead of failing.
    fallback: Option<ScriptedReply>,
}

/// A `RoleBackend` that replays a fixed queue of replies.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                replies: replies.into(),
                ..BackendState::default()
            })),
        }
    }

    /// Serve `reply` forever once the queue runs dry.
    pub fn repeating(reply: ScriptedReply) -> Self {
        let backend = Self::default();
        if let Ok(mut state) = backend.state.lock() {
            state.fallback = Some(reply);
        }
        backend
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }
}

impl RoleBackend for ScriptedBackend {
    fn submit(&self, system_prompt: &str, history: &[Message]) -> TandemResult<ChunkStream> {
        let mut state = self.state.lock().map_err(|e| TandemError::StateMachineError {
            reason: format!("scripted backend lock poisoned: {}", e),
        })?;
        state.calls.push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
        });

        let reply = match state.replies.pop_front().or_else(|| state.fallback.clone()) {
            Some(reply) => reply,
            None => {
                return Err(TandemError::StateMachineError {
                    reason: "scripted backend has no replies left".to_string(),
                })
            }
        };

        let stream: ChunkStream = match reply {
            ScriptedReply::Chunks(chunks) => {
                Box::new(chunks.into_iter().map(Ok::<RoleChunk, TandemError>))
            }
            ScriptedReply::SubmitError(reason) => {
                return Err(TandemError::StateMachineError { reason })
            }
            ScriptedReply::BrokenStream(chunks, reason) => {
                let tail = std::iter::once(Err(TandemError::StateMachineError { reason }));
                Box::new(chunks.into_iter().map(Ok::<RoleChunk, TandemError>).chain(tail))
            }
        };
        Ok(stream)
    }
}

/// A `BackendFactory` handing out pre-built scripted backends.
///
/// Records the `RoleConfig` each role was built with.
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    planner: ScriptedBackend,
    implementer: ScriptedBackend,
    built: Arc<Mutex<Vec<(Role, RoleConfig)>>>,
}

impl ScriptedFactory {
    pub fn new(planner: ScriptedBackend, implementer: ScriptedBackend) -> Self {
        Self {
            planner,
            implementer,
            built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn built(&self) -> Vec<(Role, RoleConfig)> {
        self.built.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl BackendFactory for ScriptedFactory {
    fn build(&self, role: Role, config: &RoleConfig) -> TandemResult<Box<dyn RoleBackend>> {
        if let Ok(mut built) = self.built.lock() {
            built.push((role, config.clone()));
        }
        let backend = match role {
            Role::Planner => self.planner.clone(),
            Role::Implementer => self.implementer.clone(),
        };
        Ok(Box::new(backend))
    }
}

/// An `Adjudicator` that returns a fixed reply and counts calls.
#[derive(Debug, Clone)]
pub struct ScriptedAdjudicator {
    reply: Result<String, String>,
    requests: Arc<Mutex<Vec<AdjudicationRequest>>>,
}

impl ScriptedAdjudicator {
    /// Always answer with `reply` as the raw response body.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always fail the exchange with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<AdjudicationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Adjudicator for ScriptedAdjudicator {
    fn adjudicate(&self, request: &AdjudicationRequest) -> TandemResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.reply
            .clone()
            .map_err(|reason| TandemError::AdjudicationFailed { reason })
    }
}

/// An `Advisor` returning canned reports per path and a clean report otherwise.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdvisor {
    reports: HashMap<String, AdvisoryReport>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, path: impl Into<String>, report: AdvisoryReport) -> Self {
        self.reports.insert(path.into(), report);
        self
    }

    /// Paths analyzed so far, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Advisor for ScriptedAdvisor {
    fn analyze(&self, file_path: &str, _new_content: &str) -> AdvisoryReport {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(file_path.to_string());
        }
        self.reports
            .get(file_path)
            .cloned()
            .unwrap_or_else(AdvisoryReport::clean)
    }
}
