use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::{AttemptNumber, AttemptState, JobId, RemoteError};

/// One execution try of a job.
///
/// State only moves forward: once the attempt is terminal, further transitions are ignored.
/// `ended_at` is never earlier than `started_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAttempt {
    pub job_id: JobId,
    /// 1-based attempt counter.
    pub attempt_number: AttemptNumber,
    pub state: AttemptState,
    #[serde(default, with = "super::time_serde")]
    pub started_at: Option<SystemTime>,
    #[serde(default, with = "super::time_serde")]
    pub ended_at: Option<SystemTime>,
    /// Codec-encoded result of a successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<u8>>,
    /// Failure of an unsuccessful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl JobAttempt {
    /// Fresh attempt record in [`AttemptState::Pending`].
    pub fn new(job_id: JobId, attempt_number: AttemptNumber) -> Self {
        Self {
            job_id,
            attempt_number,
            state: AttemptState::Pending,
            started_at: None,
            ended_at: None,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Pending -> Submitted. Stamps `started_at`.
    pub fn mark_submitted(&mut self, at: SystemTime) -> bool {
        if self.state != AttemptState::Pending {
            return false;
        }
        self.state = AttemptState::Submitted;
        self.started_at.get_or_insert(at);
        true
    }

    /// Pending/Submitted -> Running.
    pub fn mark_running(&mut self, at: SystemTime) -> bool {
        if !matches!(self.state, AttemptState::Pending | AttemptState::Submitted) {
            return false;
        }
        self.state = AttemptState::Running;
        self.started_at.get_or_insert(at);
        true
    }

    /// Any active state -> Succeeded.
    pub fn succeed(&mut self, result: Option<Vec<u8>>, at: SystemTime) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = AttemptState::Succeeded;
        self.result = result;
        self.error = None;
        self.stamp_end(at);
        true
    }

    /// Any active state -> Failed.
    pub fn fail(&mut self, error: RemoteError, at: SystemTime) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = AttemptState::Failed;
        self.result = None;
        self.error = Some(error);
        self.stamp_end(at);
        true
    }

    /// Fold a state reported by the control plane into this record.
    ///
    /// Only forward transitions are applied; timestamps are taken from `at`
    /// so that the local record stays monotonic regardless of remote clocks.
    pub fn observe(&mut self, remote: &JobAttempt, at: SystemTime) -> bool {
        match remote.state {
            AttemptState::Pending => false,
            AttemptState::Submitted => self.mark_submitted(at),
            AttemptState::Running => self.mark_running(at),
            AttemptState::Succeeded => self.succeed(remote.result.clone(), at),
            AttemptState::Failed => {
                let error = remote
                    .error
                    .clone()
                    .unwrap_or_else(|| {
                        RemoteError::attempt_failed("attempt failed without error details")
                    });
                self.fail(error, at)
            }
        }
    }

    /// Wall time between start and end, when both are known.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.ended_at?);
        end.duration_since(start).ok()
    }

    fn stamp_end(&mut self, at: SystemTime) {
        let start = *self.started_at.get_or_insert(at);
        self.ended_at = Some(if at < start { start } else { at });
    }
}
