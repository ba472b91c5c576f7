use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use hydra_client::{ClientError, IdGenerator, SubmissionClient};
use hydra_model::{
    AttemptNumber, AttemptState, FailureKind, JobAttempt, JobFailure, JobId, JobOutcome, JobSpec,
    RemoteError,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, field, info, instrument, warn};

use crate::{
    backoff::{Backoff, NoBackoff},
    events::{EventBus, JobEvent, Subscribe},
    reporter::Reporter,
    wait::WaitStrategy,
};

/// Per-call knobs of [`Coordinator::execute_with`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Deadline for each attempt to reach a terminal state; overrides the coordinator default.
    pub timeout: Option<Duration>,
    /// Cancels the job when triggered.
    pub cancel: CancellationToken,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Drives the bounded retry loop of one logical job.
///
/// One job id per [`Coordinator::execute`] call, reused by every attempt; attempts run
/// strictly one after another and are numbered `1..=max_retries + 1`. Any number of
/// calls may run concurrently against the same coordinator.
pub struct Coordinator<C> {
    client: C,
    backoff: Arc<dyn Backoff>,
    wait: WaitStrategy,
    attempt_timeout: Option<Duration>,
    id_fallback: Option<Arc<dyn IdGenerator>>,
    events: EventBus,
}

enum Submission {
    Accepted,
    /// The plane refused the spec itself.
    Rejected(String),
    Failed(RemoteError),
}

enum Waited {
    Terminal(JobAttempt),
    TimedOut(Duration),
    Cancelled,
    Lost(ClientError),
}

impl<C> Coordinator<C>
where
    C: SubmissionClient,
{
    pub fn new(client: C) -> Self {
        Self {
            client,
            backoff: Arc::new(NoBackoff),
            wait: WaitStrategy::default(),
            attempt_timeout: None,
            id_fallback: None,
            events: EventBus::new(),
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Default per-attempt deadline; `None` waits indefinitely.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Issue ids locally when the control plane cannot.
    pub fn with_id_fallback(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.id_fallback = Some(ids);
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.events.push(subscriber);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run `spec` to a terminal outcome with default options.
    pub async fn execute(&self, spec: &JobSpec) -> JobOutcome {
        self.execute_with(spec, ExecuteOptions::default()).await
    }

    pub async fn execute_with(&self, spec: &JobSpec, opts: ExecuteOptions) -> JobOutcome {
        self.run(spec, opts, None).await
    }

    #[instrument(
        level = "info",
        name = "job",
        skip_all,
        fields(kind = spec.kind().kind(), max_retries = spec.max_retries(), job_id = field::Empty)
    )]
    pub(crate) async fn run(
        &self,
        spec: &JobSpec,
        opts: ExecuteOptions,
        issued: Option<&watch::Sender<Option<JobId>>>,
    ) -> JobOutcome {
        let job_id = match self.acquire_id().await {
            Ok(job_id) => job_id,
            Err(failure) => {
                warn!(error = %failure, "job aborted before the first attempt");
                return self
                    .conclude(Reporter::abort(JobId::new(""), &[], failure))
                    .await;
            }
        };
        Span::current().record("job_id", field::display(&job_id));
        if let Some(slot) = issued {
            slot.send_replace(Some(job_id.clone()));
        }

        let outcome = self.attempt_loop(&job_id, spec, &opts).await;
        self.conclude(outcome).await
    }

    async fn acquire_id(&self) -> Result<JobId, JobFailure> {
        let (job_id, local) = match self.client.issue_id().await {
            Ok(job_id) => (job_id, false),
            Err(err) => match &self.id_fallback {
                Some(ids) => {
                    let job_id = ids.generate();
                    warn!(
                        error = %err,
                        job_id = %job_id,
                        "control plane could not issue an id, using a local one"
                    );
                    (job_id, true)
                }
                None => {
                    return Err(JobFailure::new(
                        FailureKind::ControlPlaneUnavailable,
                        format!("could not obtain a job id: {err}"),
                    ));
                }
            },
        };
        debug!(job_id = %job_id, local, "job id acquired");
        self.events
            .publish(JobEvent::IdIssued {
                job_id: job_id.clone(),
                local,
            })
            .await;
        Ok(job_id)
    }

    async fn attempt_loop(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        opts: &ExecuteOptions,
    ) -> JobOutcome {
        let cancel = &opts.cancel;
        let timeout = opts.timeout.or(self.attempt_timeout);
        let max_attempts = spec.max_attempts();
        let mut history: Vec<JobAttempt> = Vec::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return self.cancelled(job_id, &history).await;
            }

            let mut record = JobAttempt::new(job_id.clone(), attempt);
            record.mark_submitted(SystemTime::now());

            let waited = match self.submit(job_id, spec, attempt).await {
                Submission::Accepted => self.wait(job_id, attempt, timeout, cancel).await,
                Submission::Rejected(message) => {
                    warn!(attempt, %message, "control plane rejected the job");
                    record.fail(
                        RemoteError::new(FailureKind::InvalidSpecification, message),
                        SystemTime::now(),
                    );
                    self.attempt_done(&record).await;
                    history.push(record);
                    return Reporter::finish(job_id.clone(), &history);
                }
                Submission::Failed(err) => {
                    record.fail(err, SystemTime::now());
                    self.attempt_done(&record).await;
                    history.push(record);
                    let next = self
                        .between_attempts(job_id, &history, max_attempts, cancel)
                        .await;
                    if let Some(outcome) = next {
                        return outcome;
                    }
                    continue;
                }
            };

            let now = SystemTime::now();
            match waited {
                Waited::Terminal(remote) => {
                    record.observe(&remote, now);
                }
                Waited::TimedOut(limit) => {
                    warn!(attempt, timeout_ms = limit.as_millis() as u64, "attempt timed out");
                    let message = format!(
                        "attempt {attempt} did not finish within {} ms",
                        limit.as_millis()
                    );
                    record.fail(RemoteError::new(FailureKind::Timeout, message), now);
                    self.abandon(job_id, attempt).await;
                }
                Waited::Lost(err) => {
                    warn!(attempt, error = %err, "lost track of attempt");
                    record.fail(
                        RemoteError::new(FailureKind::ControlPlaneUnavailable, err.to_string()),
                        now,
                    );
                    self.abandon(job_id, attempt).await;
                }
                Waited::Cancelled => {
                    record.fail(
                        RemoteError::new(FailureKind::Cancelled, "cancelled by caller"),
                        now,
                    );
                    self.attempt_done(&record).await;
                    history.push(record);
                    return self.cancelled(job_id, &history).await;
                }
            }

            self.attempt_done(&record).await;
            let state = record.state;
            let final_kind = record.error.as_ref().map(|e| e.kind).filter(FailureKind::is_final);
            history.push(record);

            if state == AttemptState::Succeeded || final_kind.is_some() {
                return Reporter::finish(job_id.clone(), &history);
            }
            let next = self
                .between_attempts(job_id, &history, max_attempts, cancel)
                .await;
            if let Some(outcome) = next {
                return outcome;
            }
        }

        Reporter::finish(job_id.clone(), &history)
    }

    /// Backoff after a failed attempt. Returns an outcome when the loop must stop.
    async fn between_attempts(
        &self,
        job_id: &JobId,
        history: &[JobAttempt],
        max_attempts: AttemptNumber,
        cancel: &CancellationToken,
    ) -> Option<JobOutcome> {
        let failed = history.last().map(|a| a.attempt_number).unwrap_or(0);
        if failed >= max_attempts {
            info!(attempts = failed, "retries exhausted");
            return Some(Reporter::finish(job_id.clone(), history));
        }
        if cancel.is_cancelled() {
            return Some(self.cancelled(job_id, history).await);
        }

        let delay = self.backoff.delay(failed);
        debug!(
            next_attempt = failed + 1,
            delay_ms = delay.as_millis() as u64,
            "retry scheduled"
        );
        self.events
            .publish(JobEvent::RetryScheduled {
                job_id: job_id.clone(),
                next_attempt: failed + 1,
                delay,
            })
            .await;

        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Some(self.cancelled(job_id, history).await),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        None
    }

    async fn submit(&self, job_id: &JobId, spec: &JobSpec, attempt: AttemptNumber) -> Submission {
        match self.client.submit(job_id, spec, attempt).await {
            Ok(ack) if ack.duplicate => self.duplicate(job_id, attempt).await,
            Ok(ack) if ack.accepted => {
                debug!(attempt, "attempt submitted");
                self.events
                    .publish(JobEvent::AttemptSubmitted {
                        job_id: job_id.clone(),
                        attempt,
                        kind: spec.kind().kind(),
                    })
                    .await;
                Submission::Accepted
            }
            Ok(ack) => Submission::Failed(RemoteError::attempt_failed(format!(
                "submission refused: {}",
                ack.message
            ))),
            Err(ClientError::Duplicate(_)) => self.duplicate(job_id, attempt).await,
            Err(ClientError::Rejected(message)) => Submission::Rejected(message),
            Err(err) => {
                warn!(attempt, error = %err, "submission failed");
                Submission::Failed(RemoteError::new(
                    FailureKind::ControlPlaneUnavailable,
                    err.to_string(),
                ))
            }
        }
    }

    async fn duplicate(&self, job_id: &JobId, attempt: AttemptNumber) -> Submission {
        debug!(attempt, "attempt already known to the control plane");
        self.events
            .publish(JobEvent::DuplicateSubmission {
                job_id: job_id.clone(),
                attempt,
            })
            .await;
        Submission::Accepted
    }

    async fn wait(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Waited {
        let observe = self.wait.wait_terminal(&self.client, job_id, attempt);
        let bounded = async {
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, observe).await {
                    Ok(result) => result,
                    Err(_) => return Waited::TimedOut(limit),
                },
                None => observe.await,
            };
            match result {
                Ok(terminal) => Waited::Terminal(terminal),
                Err(err) => Waited::Lost(err),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Waited::Cancelled,
            waited = bounded => waited,
        }
    }

    /// Stop an attempt the loop gave up on, so it cannot overlap the next one.
    async fn abandon(&self, job_id: &JobId, attempt: AttemptNumber) {
        match self.client.cancel_attempt(job_id, attempt).await {
            Ok(ack) if ack.accepted => debug!(attempt, "abandoned attempt stopped"),
            Ok(ack) => {
                debug!(attempt, message = %ack.message, "abandoned attempt already finished")
            }
            Err(err) => warn!(attempt, error = %err, "could not stop abandoned attempt"),
        }
    }

    async fn attempt_done(&self, record: &JobAttempt) {
        let event = match (&record.state, &record.error) {
            (AttemptState::Succeeded, _) => JobEvent::AttemptSucceeded {
                job_id: record.job_id.clone(),
                attempt: record.attempt_number,
                duration: record.duration(),
            },
            (_, error) => {
                let (kind, message) = error
                    .as_ref()
                    .map(|e| (e.kind, e.message.clone()))
                    .unwrap_or((FailureKind::AttemptFailed, String::new()));
                debug!(attempt = record.attempt_number, %kind, %message, "attempt failed");
                JobEvent::AttemptFailed {
                    job_id: record.job_id.clone(),
                    attempt: record.attempt_number,
                    kind,
                    message,
                    duration: record.duration(),
                }
            }
        };
        self.events.publish(event).await;
    }

    async fn cancelled(&self, job_id: &JobId, history: &[JobAttempt]) -> JobOutcome {
        let attempt = history.last().map(|a| a.attempt_number).unwrap_or(0);
        info!(attempt, "cancellation requested");
        self.events
            .publish(JobEvent::CancelRequested {
                job_id: job_id.clone(),
                attempt,
            })
            .await;

        match self.client.cancel(job_id).await {
            Ok(ack) if ack.accepted => debug!("control plane cancelled the job"),
            Ok(ack) => debug!(message = %ack.message, "control plane had nothing to cancel"),
            Err(err) => warn!(error = %err, "cancel request failed"),
        }

        let mut failure = JobFailure::new(FailureKind::Cancelled, "job cancelled by caller");
        if attempt > 0 {
            failure = failure.at_attempt(attempt);
        }
        Reporter::abort(job_id.clone(), history, failure)
    }

    async fn conclude(&self, outcome: JobOutcome) -> JobOutcome {
        match outcome.error() {
            None => info!(attempts = outcome.attempts(), "job succeeded"),
            Some(error) => info!(attempts = outcome.attempts(), %error, "job failed"),
        }
        self.events
            .publish(JobEvent::JobFinished {
                job_id: outcome.job_id().clone(),
                status: outcome.status(),
                attempts: outcome.attempts(),
                failure: outcome.error().map(|e| e.kind),
            })
            .await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ConstantBackoff;
    use hydra_client::{Behavior, InMemoryControlPlane, UuidIdGenerator};
    use hydra_model::{JobKind, OutcomeStatus, build_command};

    fn failing_plane() -> InMemoryControlPlane {
        InMemoryControlPlane::builder()
            .default_behavior(Behavior::Fail(RemoteError::attempt_failed("exit code: 1")))
            .latency(Duration::from_millis(1))
            .build()
    }

    fn spec(retries: u32) -> JobSpec {
        JobSpec::builder(JobKind::Command {
            command: "false".into(),
        })
        .max_retries(retries)
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn exhausts_the_retry_budget() {
        let plane = failing_plane();
        let coordinator = Coordinator::new(plane.clone());

        let outcome = coordinator.execute(&spec(2)).await;

        assert_eq!(outcome.status(), OutcomeStatus::Failure);
        assert_eq!(outcome.attempts(), 3);
        let numbers: Vec<_> = plane.submissions().into_iter().map(|(_, n)| n).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn one_job_id_for_every_attempt() {
        let plane = failing_plane();
        let coordinator = Coordinator::new(plane.clone());

        let outcome = coordinator.execute(&spec(1)).await;

        let submissions = plane.submissions();
        assert_eq!(submissions.len(), 2);
        assert!(submissions.iter().all(|(id, _)| id == outcome.job_id()));
        assert_eq!(plane.issued_ids(), vec![outcome.job_id().clone()]);
    }

    #[tokio::test]
    async fn rejected_spec_is_not_retried() {
        let plane = InMemoryControlPlane::builder()
            .capacity(hydra_model::Resources::parse(1, "256MB").unwrap())
            .build();
        let coordinator = Coordinator::new(plane.clone());

        let outcome = coordinator.execute(&build_command("echo hi").unwrap()).await;

        let error = outcome.error().unwrap();
        assert_eq!(error.kind, FailureKind::InvalidSpecification);
        assert_eq!(outcome.attempts(), 1);
        assert!(plane.submissions().is_empty());
    }

    #[tokio::test]
    async fn unreachable_plane_without_fallback_fails_before_any_attempt() {
        let plane = InMemoryControlPlane::new();
        plane.set_available(false);
        let coordinator = Coordinator::new(plane);

        let outcome = coordinator.execute(&spec(3)).await;

        assert_eq!(outcome.attempts(), 0);
        assert_eq!(outcome.error().unwrap().kind, FailureKind::ControlPlaneUnavailable);
        assert!(outcome.job_id().is_empty());
    }

    #[tokio::test]
    async fn local_id_fallback_keeps_the_job_going() {
        let plane = InMemoryControlPlane::new();
        plane.fail_transport(1);
        let coordinator =
            Coordinator::new(plane.clone()).with_id_fallback(Arc::new(UuidIdGenerator::local()));

        let outcome = coordinator.execute(&spec(0)).await;

        assert!(outcome.is_success());
        assert!(outcome.job_id().as_str().starts_with("job-local-"));
    }

    #[tokio::test]
    async fn submit_outage_consumes_a_retry_slot() {
        let plane = InMemoryControlPlane::builder()
            .latency(Duration::from_millis(1))
            .build();
        plane.fail_submissions(1);
        let coordinator = Coordinator::new(plane.clone());

        let outcome = coordinator.execute(&spec(1)).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 2);
        let numbers: Vec<_> = plane.submissions().into_iter().map(|(_, n)| n).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_stops_the_loop() {
        let plane = failing_plane();
        let coordinator = Coordinator::new(plane.clone())
            .with_backoff(Arc::new(ConstantBackoff(Duration::from_secs(30))));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = coordinator
            .execute_with(&spec(5), ExecuteOptions::default().with_cancel(cancel))
            .await;

        assert_eq!(outcome.error().unwrap().kind, FailureKind::Cancelled);
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(plane.submissions().len(), 1);
        assert_eq!(plane.cancel_count(), 1);
    }

    #[tokio::test]
    async fn poll_mode_reaches_the_same_outcome() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Succeed(Some(b"42".to_vec())))
            .latency(Duration::from_millis(1))
            .build();
        let coordinator =
            Coordinator::new(plane).with_wait(WaitStrategy::poll(Duration::from_millis(2)));

        let outcome = coordinator.execute(&spec(0)).await;
        assert_eq!(outcome.result(), Some(&b"42"[..]));
    }
}
