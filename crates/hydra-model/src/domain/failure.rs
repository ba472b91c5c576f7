use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AttemptNumber;

/// Failure taxonomy shared by attempts and outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Malformed job parameters; surfaced immediately and never retried.
    InvalidSpecification,
    /// Transport or connectivity failure talking to the control plane.
    ControlPlaneUnavailable,
    /// The remote execution itself failed.
    AttemptFailed,
    /// The attempt exceeded the caller-supplied deadline.
    Timeout,
    /// The caller requested cancellation before a terminal state.
    Cancelled,
}

impl FailureKind {
    /// Transient kinds are absorbed into the retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::ControlPlaneUnavailable | FailureKind::Timeout
        )
    }

    /// Kinds that stop the retry loop regardless of remaining attempts.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            FailureKind::InvalidSpecification | FailureKind::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidSpecification => "INVALID_SPECIFICATION",
            FailureKind::ControlPlaneUnavailable => "CONTROL_PLANE_UNAVAILABLE",
            FailureKind::AttemptFailed => "ATTEMPT_FAILED",
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the control plane for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    pub kind: FailureKind,
    /// Human-readable message, e.g. the error raised by the remote function.
    pub message: String,
    /// Codec-encoded error payload, if the executor produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    /// Process exit code for command jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl RemoteError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
            exit_code: None,
        }
    }

    /// Application-level failure of the remote execution.
    pub fn attempt_failed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::AttemptFailed, message)
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

/// Structured failure carried by a [`crate::JobOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Attempt that produced the failure; `None` when no attempt was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<AttemptNumber>,
    /// Remote failure payload of the originating attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempt: None,
            payload: None,
            exit_code: None,
        }
    }

    pub fn at_attempt(mut self, attempt: AttemptNumber) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Lift a remote attempt error, remembering which attempt raised it.
    pub fn from_remote(error: RemoteError, attempt: AttemptNumber) -> Self {
        Self {
            kind: error.kind,
            message: error.message,
            attempt: Some(attempt),
            payload: error.payload,
            exit_code: error.exit_code,
        }
    }

    /// Turn back into the wire form recorded on an attempt.
    pub fn to_remote(&self) -> RemoteError {
        RemoteError {
            kind: self.kind,
            message: self.message.clone(),
            payload: self.payload.clone(),
            exit_code: self.exit_code,
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attempt {
            Some(attempt) => write!(f, "{} (attempt {}): {}", self.kind, attempt, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
