use hydra_core::JobEvent;
use hydra_model::{FailureKind, OutcomeStatus};
use tracing::Level;

macro_rules! emit {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if level == Level::INFO {
            tracing::info!($($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    }};
}

/// Level a [`JobEvent`] is logged at.
pub fn level_for(event: &JobEvent) -> Level {
    match event {
        JobEvent::IdIssued { local: true, .. } => Level::WARN,
        JobEvent::IdIssued { local: false, .. } => Level::DEBUG,
        JobEvent::AttemptSubmitted { .. } => Level::INFO,
        JobEvent::DuplicateSubmission { .. } => Level::DEBUG,
        JobEvent::AttemptSucceeded { .. } => Level::DEBUG,
        JobEvent::AttemptFailed {
            kind: FailureKind::Cancelled,
            ..
        } => Level::INFO,
        JobEvent::AttemptFailed { .. } => Level::WARN,
        JobEvent::RetryScheduled { .. } => Level::DEBUG,
        JobEvent::CancelRequested { .. } => Level::INFO,
        JobEvent::JobFinished {
            status: OutcomeStatus::Success,
            ..
        } => Level::INFO,
        JobEvent::JobFinished {
            failure: Some(FailureKind::Cancelled),
            ..
        } => Level::INFO,
        JobEvent::JobFinished { .. } => Level::WARN,
    }
}

#[inline]
pub fn message_for(event: &JobEvent) -> &'static str {
    match event {
        JobEvent::IdIssued { local: true, .. } => {
            "job id generated locally (control plane unreachable)"
        }
        JobEvent::IdIssued { local: false, .. } => "job id issued by control plane",
        JobEvent::AttemptSubmitted { .. } => "attempt submitted",
        JobEvent::DuplicateSubmission { .. } => "attempt already known to control plane",
        JobEvent::AttemptSucceeded { .. } => "attempt succeeded",
        JobEvent::AttemptFailed { .. } => "attempt failed",
        JobEvent::RetryScheduled { .. } => "next attempt scheduled",
        JobEvent::CancelRequested { .. } => "cancellation requested",
        JobEvent::JobFinished {
            status: OutcomeStatus::Success,
            ..
        } => "job succeeded",
        JobEvent::JobFinished { .. } => "job failed",
    }
}

pub fn log_event(event: &JobEvent) {
    let level = level_for(event);
    let msg = message_for(event);

    match event {
        JobEvent::IdIssued { job_id, local } => {
            emit!(level, job_id = %job_id, local = *local, "{msg}")
        }
        JobEvent::AttemptSubmitted {
            job_id,
            attempt,
            kind,
        } => emit!(level, job_id = %job_id, attempt = *attempt, kind = *kind, "{msg}"),
        JobEvent::DuplicateSubmission { job_id, attempt } => {
            emit!(level, job_id = %job_id, attempt = *attempt, "{msg}")
        }
        JobEvent::AttemptSucceeded {
            job_id,
            attempt,
            duration,
        } => emit!(
            level,
            job_id = %job_id,
            attempt = *attempt,
            duration_ms = duration.map(|d| d.as_millis() as u64),
            "{msg}"
        ),
        JobEvent::AttemptFailed {
            job_id,
            attempt,
            kind,
            message,
            duration,
        } => emit!(
            level,
            job_id = %job_id,
            attempt = *attempt,
            kind = kind.as_str(),
            reason = %message,
            duration_ms = duration.map(|d| d.as_millis() as u64),
            "{msg}"
        ),
        JobEvent::RetryScheduled {
            job_id,
            next_attempt,
            delay,
        } => emit!(
            level,
            job_id = %job_id,
            attempt = *next_attempt,
            delay_ms = delay.as_millis() as u64,
            "{msg}"
        ),
        JobEvent::CancelRequested { job_id, attempt } => {
            emit!(level, job_id = %job_id, attempt = *attempt, "{msg}")
        }
        JobEvent::JobFinished {
            job_id,
            status,
            attempts,
            failure,
        } => emit!(
            level,
            job_id = %job_id,
            status = status.as_str(),
            attempts = *attempts,
            failure = failure.map(|k| k.as_str()),
            "{msg}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_model::JobId;
    use std::time::Duration;

    fn id() -> JobId {
        JobId::from("job-1")
    }

    #[test]
    fn levels_follow_severity() {
        assert_eq!(
            level_for(&JobEvent::AttemptSubmitted {
                job_id: id(),
                attempt: 1,
                kind: "command",
            }),
            Level::INFO
        );
        assert_eq!(
            level_for(&JobEvent::RetryScheduled {
                job_id: id(),
                next_attempt: 2,
                delay: Duration::from_millis(100),
            }),
            Level::DEBUG
        );
        assert_eq!(
            level_for(&JobEvent::AttemptFailed {
                job_id: id(),
                attempt: 1,
                kind: FailureKind::Timeout,
                message: "slow".into(),
                duration: None,
            }),
            Level::WARN
        );
        assert_eq!(
            level_for(&JobEvent::DuplicateSubmission {
                job_id: id(),
                attempt: 1,
            }),
            Level::DEBUG
        );
    }

    #[test]
    fn cancellation_is_not_a_warning() {
        let finished = JobEvent::JobFinished {
            job_id: id(),
            status: OutcomeStatus::Failure,
            attempts: 2,
            failure: Some(FailureKind::Cancelled),
        };
        assert_eq!(level_for(&finished), Level::INFO);
        assert_eq!(message_for(&finished), "job failed");

        let exhausted = JobEvent::JobFinished {
            job_id: id(),
            status: OutcomeStatus::Failure,
            attempts: 4,
            failure: Some(FailureKind::AttemptFailed),
        };
        assert_eq!(level_for(&exhausted), Level::WARN);
    }
}
