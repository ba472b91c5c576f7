use serde::{Deserialize, Serialize};

use crate::{AttemptNumber, JobFailure, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "SUCCESS",
            OutcomeStatus::Failure => "FAILURE",
        }
    }
}

/// Terminal result of a job after all of its attempts.
///
/// A successful outcome carries an optional result payload and no error;
/// a failed outcome always carries a [`JobFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    job_id: JobId,
    status: OutcomeStatus,
    /// Number of attempts that were submitted.
    attempts: AttemptNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<JobFailure>,
}

impl JobOutcome {
    pub fn success(job_id: JobId, attempts: AttemptNumber, result: Option<Vec<u8>>) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Success,
            attempts,
            result,
            error: None,
        }
    }

    pub fn failure(job_id: JobId, attempts: AttemptNumber, error: JobFailure) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Failure,
            attempts,
            result: None,
            error: Some(error),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn attempts(&self) -> AttemptNumber {
        self.attempts
    }

    pub fn result(&self) -> Option<&[u8]> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&JobFailure> {
        self.error.as_ref()
    }

    /// Split into the success payload or the failure.
    pub fn into_result(self) -> Result<Option<Vec<u8>>, JobFailure> {
        match (self.status, self.error) {
            (OutcomeStatus::Failure, Some(error)) => Err(error),
            _ => Ok(self.result),
        }
    }
}
