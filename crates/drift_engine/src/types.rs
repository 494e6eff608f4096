use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Source of "now" for timestamps, prompts and artifact keys.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Timestamp format of `updatedAt`, `lastScanAt` and the report date.
pub fn store_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Timestamp format embedded in artifact keys.
pub fn key_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub alias_id: String,
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self {
            agent_id: "drift-report-agent".to_string(),
            alias_id: "live".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub prompt: String,
    pub session_id: String,
    pub identity: AgentIdentity,
}

/// One event of a streaming completion. The payload is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentChunk {
    pub bytes: Option<Bytes>,
}

impl AgentChunk {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: Some(bytes.into()),
        }
    }

    pub fn empty() -> Self {
        Self { bytes: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentErrorKind {
    /// Request rate exceeded; the only retryable kind.
    Throttling,
    Service { code: String },
    Transport,
}

impl AgentErrorKind {
    pub fn code(&self) -> &str {
        match self {
            AgentErrorKind::Throttling => "throttlingException",
            AgentErrorKind::Service { code } => code,
            AgentErrorKind::Transport => "transportError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentError {
    pub kind: AgentErrorKind,
    pub message: String,
}

impl AgentError {
    pub fn new(kind: AgentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn throttling(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::Throttling, message)
    }

    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::Service { code: code.into() }, message)
    }

    pub fn is_throttling(&self) -> bool {
        self.kind == AgentErrorKind::Throttling
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "An error occurred ({}) when calling the InvokeAgent operation: {}",
            self.kind.code(),
            self.message
        )
    }
}

impl std::error::Error for AgentError {}

/// Terminal result of a retried agent call.
///
/// The rendered text always starts with `Agent invoke error:` and embeds the
/// remote message, so text-based fallbacks downstream can match on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("Agent invoke error: {0}")]
    Fatal(#[source] AgentError),
    #[error("Agent invoke error: Max retries reached due to throttling.")]
    RetriesExhausted { attempts: u32 },
}

impl InvokeError {
    pub fn is_throttling(&self) -> bool {
        match self {
            InvokeError::Fatal(err) => err.is_throttling(),
            InvokeError::RetriesExhausted { .. } => true,
        }
    }
}
