use hydra_model::{
    AttemptState, FailureKind, JobAttempt, JobFailure, JobId, JobOutcome, PayloadCodec,
    RemoteError, decode_as,
};
use serde::de::DeserializeOwned;

use crate::error::JobExecutionError;

/// Turns attempt history into the caller-visible outcome.
///
/// Stateless; every call sees only its arguments.
pub struct Reporter;

impl Reporter {
    /// Outcome implied by the last attempt of `history`.
    ///
    /// A succeeded last attempt yields SUCCESS with its result; anything else yields
    /// FAILURE carrying the last attempt's error and payload.
    pub fn finish(job_id: JobId, history: &[JobAttempt]) -> JobOutcome {
        let attempts = Self::attempt_count(history);
        match history.last() {
            Some(last) if last.state == AttemptState::Succeeded => {
                JobOutcome::success(job_id, attempts, last.result.clone())
            }
            Some(last) => {
                let error = last.error.clone().unwrap_or_else(|| {
                    RemoteError::attempt_failed(format!(
                        "attempt ended in state {}",
                        last.state.as_str()
                    ))
                });
                JobOutcome::failure(
                    job_id,
                    attempts,
                    JobFailure::from_remote(error, last.attempt_number),
                )
            }
            None => JobOutcome::failure(
                job_id,
                0,
                JobFailure::new(FailureKind::AttemptFailed, "no attempt was made"),
            ),
        }
    }

    /// FAILURE with an explicit reason, e.g. cancellation between attempts.
    pub fn abort(job_id: JobId, history: &[JobAttempt], failure: JobFailure) -> JobOutcome {
        JobOutcome::failure(job_id, Self::attempt_count(history), failure)
    }

    /// Unwrap an outcome into the typed value a local call would have returned.
    pub fn into_value<T: DeserializeOwned>(
        outcome: JobOutcome,
        codec: &dyn PayloadCodec,
    ) -> Result<T, JobExecutionError> {
        let result = outcome.into_result()?;
        decode_as(codec, result.as_deref().unwrap_or_default()).map_err(JobExecutionError::Codec)
    }

    fn attempt_count(history: &[JobAttempt]) -> u32 {
        history.last().map(|a| a.attempt_number).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_model::{JsonCodec, OutcomeStatus};
    use std::time::SystemTime;

    fn failed(n: u32, msg: &str) -> JobAttempt {
        let mut a = JobAttempt::new(JobId::from("job-1"), n);
        a.mark_submitted(SystemTime::now());
        a.fail(
            RemoteError::attempt_failed(msg).with_payload(msg.as_bytes().to_vec()),
            SystemTime::now(),
        );
        a
    }

    fn succeeded(n: u32, result: &[u8]) -> JobAttempt {
        let mut a = JobAttempt::new(JobId::from("job-1"), n);
        a.mark_submitted(SystemTime::now());
        a.succeed(Some(result.to_vec()), SystemTime::now());
        a
    }

    #[test]
    fn failure_references_the_last_attempt() {
        let history = vec![failed(1, "first"), failed(2, "second")];
        let outcome = Reporter::finish(JobId::from("job-1"), &history);

        assert_eq!(outcome.status(), OutcomeStatus::Failure);
        assert_eq!(outcome.attempts(), 2);
        let error = outcome.error().unwrap();
        assert_eq!(error.message, "second");
        assert_eq!(error.attempt, Some(2));
        assert_eq!(error.payload.as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn success_carries_the_result() {
        let history = vec![failed(1, "boom"), succeeded(2, br#"{"rows":3}"#)];
        let outcome = Reporter::finish(JobId::from("job-1"), &history);

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 2);

        let value: serde_json::Value = Reporter::into_value(outcome, &JsonCodec).unwrap();
        assert_eq!(value["rows"], 3);
    }

    #[test]
    fn failure_becomes_native_error_with_same_message() {
        let outcome = Reporter::finish(JobId::from("job-1"), &[failed(1, "KeyError: 'x'")]);
        let err = Reporter::into_value::<serde_json::Value>(outcome, &JsonCodec).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'x'");
    }
}
