use hydra_client::ClientError;
use hydra_model::{CodecError, FailureKind, JobFailure, SpecError};
use thiserror::Error;

/// Failures of the composition root itself, before any job runs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    InvalidSpecification(#[from] SpecError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("job task failed: {0}")]
    Join(String),
}

/// Native error produced by the caller-facing wrappers.
///
/// Displays exactly the message of the underlying failure, so a wrapped remote call
/// reads like the local function failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobExecutionError {
    #[error("{}", .0.message)]
    Failed(JobFailure),

    #[error(transparent)]
    InvalidSpecification(SpecError),

    #[error(transparent)]
    Codec(CodecError),
}

impl JobExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobExecutionError::Failed(failure) => failure.kind,
            JobExecutionError::InvalidSpecification(_) => FailureKind::InvalidSpecification,
            JobExecutionError::Codec(_) => FailureKind::AttemptFailed,
        }
    }

    /// Structured failure, when the error came from a job outcome.
    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            JobExecutionError::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<JobFailure> for JobExecutionError {
    fn from(failure: JobFailure) -> Self {
        JobExecutionError::Failed(failure)
    }
}
