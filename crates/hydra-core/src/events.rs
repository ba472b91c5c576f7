use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use hydra_model::{AttemptNumber, FailureKind, JobId, OutcomeStatus};

/// Observable step of the coordinator's retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A job id was obtained; `local` when it came from the offline fallback generator.
    IdIssued { job_id: JobId, local: bool },
    AttemptSubmitted {
        job_id: JobId,
        attempt: AttemptNumber,
        kind: &'static str,
    },
    /// The plane already knew the `(job_id, attempt)` pair.
    DuplicateSubmission { job_id: JobId, attempt: AttemptNumber },
    AttemptSucceeded {
        job_id: JobId,
        attempt: AttemptNumber,
        duration: Option<Duration>,
    },
    AttemptFailed {
        job_id: JobId,
        attempt: AttemptNumber,
        kind: FailureKind,
        message: String,
        duration: Option<Duration>,
    },
    RetryScheduled {
        job_id: JobId,
        next_attempt: AttemptNumber,
        delay: Duration,
    },
    CancelRequested { job_id: JobId, attempt: AttemptNumber },
    JobFinished {
        job_id: JobId,
        status: OutcomeStatus,
        attempts: AttemptNumber,
        failure: Option<FailureKind>,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::IdIssued { job_id, .. }
            | JobEvent::AttemptSubmitted { job_id, .. }
            | JobEvent::DuplicateSubmission { job_id, .. }
            | JobEvent::AttemptSucceeded { job_id, .. }
            | JobEvent::AttemptFailed { job_id, .. }
            | JobEvent::RetryScheduled { job_id, .. }
            | JobEvent::CancelRequested { job_id, .. }
            | JobEvent::JobFinished { job_id, .. } => job_id,
        }
    }

    /// Stable snake_case name, used as a log field and metric label.
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::IdIssued { .. } => "id_issued",
            JobEvent::AttemptSubmitted { .. } => "attempt_submitted",
            JobEvent::DuplicateSubmission { .. } => "duplicate_submission",
            JobEvent::AttemptSucceeded { .. } => "attempt_succeeded",
            JobEvent::AttemptFailed { .. } => "attempt_failed",
            JobEvent::RetryScheduled { .. } => "retry_scheduled",
            JobEvent::CancelRequested { .. } => "cancel_requested",
            JobEvent::JobFinished { .. } => "job_finished",
        }
    }
}

/// Receiver of [`JobEvent`]s.
///
/// Events are delivered in order, inline with the retry loop, so a subscriber
/// observes every step before the loop moves on. Keep handlers short.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &JobEvent);

    fn name(&self) -> &'static str;
}

/// Fan-out of events to every registered subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscriber: Arc<dyn Subscribe>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub async fn publish(&self, event: JobEvent) {
        for subscriber in &self.subscribers {
            subscriber.on_event(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &JobEvent) {
            self.0.lock().unwrap().push(event.name());
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn publishes_to_every_subscriber_in_order() {
        let a = Arc::new(Recorder(Mutex::new(Vec::new())));
        let b = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut bus = EventBus::new();
        bus.push(a.clone());
        bus.push(b.clone());

        let job_id = JobId::from("job-1");
        bus.publish(JobEvent::IdIssued {
            job_id: job_id.clone(),
            local: false,
        })
        .await;
        bus.publish(JobEvent::CancelRequested { job_id, attempt: 1 }).await;

        assert_eq!(*a.0.lock().unwrap(), vec!["id_issued", "cancel_requested"]);
        assert_eq!(*b.0.lock().unwrap(), vec!["id_issued", "cancel_requested"]);
    }
}
