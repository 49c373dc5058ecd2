//! Role identities, chat messages, and role backend response types.
//!
//! A role backend streams `RoleChunk`s; the orchestrator drains them into a
//! `RoleResponse` before the phase advances. Block order is emission order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two roles in the refinement loop.
///
/// The planner also acts as the reviewer during the Evaluating phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Planner,
    Implementer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Planner => f.write_str("planner"),
            Role::Implementer => f.write_str("implementer"),
        }
    }
}

/// Who authored a message in the history sent to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single chat message passed to `RoleBackend::submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Discriminates the payload of a streamed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Text,
    Reasoning,
}

/// One typed content chunk emitted by a role backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChunk {
    pub kind: ChunkKind,
    pub payload: String,
}

impl RoleChunk {
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Text,
            payload: payload.into(),
        }
    }

    pub fn reasoning(payload: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Reasoning,
            payload: payload.into(),
        }
    }
}

/// A fully drained backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleResponse {
    /// Blocks in the order the backend emitted them.
    pub blocks: Vec<RoleChunk>,
}

impl RoleResponse {
    /// Concatenate all text blocks, preserving emission order.
    pub fn text(&self) -> String {
        self.join(ChunkKind::Text)
    }

    /// Concatenate all reasoning blocks, or `None` if the backend emitted none.
    pub fn reasoning(&self) -> Option<String> {
        let joined = self.join(ChunkKind::Reasoning);
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    fn join(&self, kind: ChunkKind) -> String {
        self.blocks
            .iter()
            .filter(|b| b.kind == kind)
            .map(|b| b.payload.as_str())
            .collect()
    }
}
