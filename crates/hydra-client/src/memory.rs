use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use hydra_model::{
    AttemptNumber, AttemptState, FailureKind, JobAttempt, JobId, JobSpec, RemoteError, Resources,
};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::{
    StreamExt,
    wrappers::{BroadcastStream, ReceiverStream, errors::BroadcastStreamRecvError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    error::ClientError,
    ids::{IdGenerator, UuidIdGenerator},
    submission::{Ack, AttemptStream, SubmissionClient},
};

const EVENT_CAPACITY: usize = 1024;

/// What the in-memory control plane does with an accepted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Finish successfully with the given encoded result.
    Succeed(Option<Vec<u8>>),
    /// Finish with the given remote error.
    Fail(RemoteError),
    /// Stay running until the job is cancelled.
    Hang,
    /// Run the spec through the configured [`AttemptExecutor`].
    Execute,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Succeed(None)
    }
}

/// Worker-side execution of one attempt.
///
/// `cancel` fires when the job is cancelled; implementations should stop promptly.
#[async_trait]
pub trait AttemptExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
        spec: &JobSpec,
        cancel: CancellationToken,
    ) -> Result<Option<Vec<u8>>, RemoteError>;
}

/// In-process control plane.
///
/// Issues ids, deduplicates `(job_id, attempt)` submissions, drives every accepted attempt
/// through `Submitted -> Running -> terminal` on a background task and publishes each
/// transition to subscribers of [`SubmissionClient::stream`].
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct InMemoryControlPlane {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    events: broadcast::Sender<JobAttempt>,
    ids: UuidIdGenerator,
    default_behavior: Behavior,
    scripted: HashMap<AttemptNumber, Behavior>,
    latency: Duration,
    reject_duplicates: bool,
    capacity: Option<Resources>,
    executor: Option<Arc<dyn AttemptExecutor>>,
}

#[derive(Default)]
struct State {
    available: bool,
    /// Number of upcoming calls that fail as if the connection dropped.
    transport_failures: u32,
    /// Number of upcoming submissions that fail the same way.
    submit_failures: u32,
    jobs: HashMap<JobId, JobRecord>,
    submissions: Vec<(JobId, AttemptNumber)>,
    duplicates: u32,
    cancel_requests: u32,
    issued: Vec<JobId>,
}

struct JobRecord {
    attempts: BTreeMap<AttemptNumber, JobAttempt>,
    /// Job-wide token; every attempt token is a child of it.
    cancel: CancellationToken,
    attempt_tokens: HashMap<AttemptNumber, CancellationToken>,
    /// Attempt budget of the submitted spec, known after the first submission.
    max_attempts: Option<AttemptNumber>,
}

impl JobRecord {
    fn new() -> Self {
        Self {
            attempts: BTreeMap::new(),
            cancel: CancellationToken::new(),
            attempt_tokens: HashMap::new(),
            max_attempts: None,
        }
    }

    /// True once `attempt` leaves the job with nothing more to report.
    fn closed_by(&self, attempt: &JobAttempt) -> bool {
        if attempt.state == AttemptState::Succeeded {
            return true;
        }
        if !attempt.is_terminal() {
            return false;
        }
        self.cancel.is_cancelled()
            || attempt.error.as_ref().is_some_and(|e| e.kind.is_final())
            || self
                .max_attempts
                .is_some_and(|max| attempt.attempt_number >= max)
    }
}

/// Builder for [`InMemoryControlPlane`].
pub struct InMemoryControlPlaneBuilder {
    default_behavior: Behavior,
    scripted: HashMap<AttemptNumber, Behavior>,
    latency: Duration,
    reject_duplicates: bool,
    capacity: Option<Resources>,
    executor: Option<Arc<dyn AttemptExecutor>>,
}

impl Default for InMemoryControlPlaneBuilder {
    fn default() -> Self {
        Self {
            default_behavior: Behavior::default(),
            scripted: HashMap::new(),
            latency: Duration::from_millis(5),
            reject_duplicates: false,
            capacity: None,
            executor: None,
        }
    }
}

impl InMemoryControlPlaneBuilder {
    /// Behavior of attempts without a scripted override.
    pub fn default_behavior(mut self, behavior: Behavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Override the behavior of every attempt with number `attempt`.
    pub fn on_attempt(mut self, attempt: AttemptNumber, behavior: Behavior) -> Self {
        self.scripted.insert(attempt, behavior);
        self
    }

    /// Delay before an attempt starts running and again before it finishes.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer repeated submissions with [`ClientError::Duplicate`] instead of a duplicate [`Ack`].
    pub fn reject_duplicates(mut self, reject: bool) -> Self {
        self.reject_duplicates = reject;
        self
    }

    /// Refuse specs requesting more than `capacity`.
    pub fn capacity(mut self, capacity: Resources) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Execute attempts through `executor`; makes [`Behavior::Execute`] the default.
    pub fn executor(mut self, executor: Arc<dyn AttemptExecutor>) -> Self {
        self.executor = Some(executor);
        self.default_behavior = Behavior::Execute;
        self
    }

    pub fn build(self) -> InMemoryControlPlane {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        InMemoryControlPlane {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    available: true,
                    ..Default::default()
                }),
                events,
                ids: UuidIdGenerator::default(),
                default_behavior: self.default_behavior,
                scripted: self.scripted,
                latency: self.latency,
                reject_duplicates: self.reject_duplicates,
                capacity: self.capacity,
                executor: self.executor,
            }),
        }
    }
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    /// Plane where every attempt succeeds without a result.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InMemoryControlPlaneBuilder {
        InMemoryControlPlaneBuilder::default()
    }

    /// Toggle reachability; while unavailable every call fails with [`ClientError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.lock().available = available;
        info!(available, "in-memory control plane availability changed");
    }

    /// Fail the next `calls` calls with [`ClientError::Unavailable`].
    pub fn fail_transport(&self, calls: u32) {
        self.inner.lock().transport_failures = calls;
    }

    /// Fail the next `calls` submissions with [`ClientError::Unavailable`]; other calls still work.
    pub fn fail_submissions(&self, calls: u32) {
        self.inner.lock().submit_failures = calls;
    }

    /// Every accepted `(job_id, attempt)` submission, in arrival order.
    pub fn submissions(&self) -> Vec<(JobId, AttemptNumber)> {
        self.inner.lock().submissions.clone()
    }

    /// Accepted submissions of one job.
    pub fn submission_count(&self, job_id: &JobId) -> usize {
        self.inner
            .lock()
            .submissions
            .iter()
            .filter(|(id, _)| id == job_id)
            .count()
    }

    /// Repeated submissions that did not create new work.
    pub fn duplicate_count(&self) -> u32 {
        self.inner.lock().duplicates
    }

    pub fn cancel_count(&self) -> u32 {
        self.inner.lock().cancel_requests
    }

    pub fn is_cancelled(&self, job_id: &JobId) -> bool {
        self.inner
            .lock()
            .jobs
            .get(job_id)
            .is_some_and(|job| job.cancel.is_cancelled())
    }

    /// Current records of every attempt of a job, ordered by attempt number.
    pub fn attempts(&self, job_id: &JobId) -> Vec<JobAttempt> {
        self.inner
            .lock()
            .jobs
            .get(job_id)
            .map(|job| job.attempts.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn issued_ids(&self) -> Vec<JobId> {
        self.inner.lock().issued.clone()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self, op: &'static str) -> Result<(), ClientError> {
        let mut state = self.lock();
        if !state.available {
            return Err(ClientError::Unavailable(format!("{op}: control plane is down")));
        }
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(ClientError::Unavailable(format!("{op}: connection reset")));
        }
        Ok(())
    }

    fn closes_job(&self, attempt: &JobAttempt) -> bool {
        self.lock()
            .jobs
            .get(&attempt.job_id)
            .is_some_and(|job| job.closed_by(attempt))
    }

    fn behavior_for(&self, attempt: AttemptNumber) -> Behavior {
        self.scripted
            .get(&attempt)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone())
    }

    fn check_capacity(&self, spec: &JobSpec) -> Result<(), ClientError> {
        let Some(capacity) = self.capacity else {
            return Ok(());
        };
        let wanted = spec.resources();
        if wanted.cpu() > capacity.cpu() {
            return Err(ClientError::Rejected(format!(
                "requested {} cpu, capacity is {}",
                wanted.cpu(),
                capacity.cpu()
            )));
        }
        if wanted.memory() > capacity.memory() {
            return Err(ClientError::Rejected(format!(
                "requested {} memory, capacity is {}",
                wanted.memory(),
                capacity.memory()
            )));
        }
        Ok(())
    }

    /// Apply `update` to one attempt and publish the new state if it changed.
    fn transition<F>(&self, job_id: &JobId, attempt: AttemptNumber, update: F) -> bool
    where
        F: FnOnce(&mut JobAttempt) -> bool,
    {
        let mut state = self.lock();
        let Some(record) = state
            .jobs
            .get_mut(job_id)
            .and_then(|job| job.attempts.get_mut(&attempt))
        else {
            return false;
        };
        if !update(record) {
            return false;
        }
        trace!(job_id = %job_id, attempt, state = record.state.as_str(), "attempt transition");
        let _ = self.events.send(record.clone());
        true
    }

    async fn drive(
        self: Arc<Self>,
        job_id: JobId,
        attempt: AttemptNumber,
        spec: JobSpec,
        cancel: CancellationToken,
    ) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.latency) => {}
        }
        self.transition(&job_id, attempt, |a| a.mark_running(SystemTime::now()));

        let outcome = match self.behavior_for(attempt) {
            Behavior::Hang => {
                cancel.cancelled().await;
                return;
            }
            Behavior::Succeed(result) => Ok(result),
            Behavior::Fail(err) => Err(err),
            Behavior::Execute => match &self.executor {
                Some(executor) => {
                    let run = executor.execute(&job_id, attempt, &spec, cancel.clone());
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        res = run => res,
                    }
                }
                None => Err(RemoteError::attempt_failed("no executor configured")),
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.latency) => {}
        }

        let now = SystemTime::now();
        match outcome {
            Ok(result) => {
                debug!(job_id = %job_id, attempt, "attempt succeeded");
                self.transition(&job_id, attempt, |a| a.succeed(result, now));
            }
            Err(err) => {
                debug!(job_id = %job_id, attempt, error = %err.message, "attempt failed");
                self.transition(&job_id, attempt, |a| a.fail(err, now));
            }
        }
    }
}

#[async_trait]
impl SubmissionClient for InMemoryControlPlane {
    async fn issue_id(&self) -> Result<JobId, ClientError> {
        self.inner.gate("issue_id")?;

        let job_id = self.inner.ids.generate();
        let mut state = self.inner.lock();
        state.jobs.insert(job_id.clone(), JobRecord::new());
        state.issued.push(job_id.clone());
        debug!(job_id = %job_id, "issued job id");
        Ok(job_id)
    }

    async fn submit(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        self.inner.gate("submit")?;
        {
            let mut state = self.inner.lock();
            if state.submit_failures > 0 {
                state.submit_failures -= 1;
                return Err(ClientError::Unavailable("submit: connection reset".into()));
            }
        }
        if attempt == 0 {
            return Err(ClientError::Rejected("attempt numbers start at 1".into()));
        }
        self.inner.check_capacity(spec)?;

        let cancel = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            let job = state
                .jobs
                .entry(job_id.clone())
                .or_insert_with(JobRecord::new);

            if job.attempts.contains_key(&attempt) {
                state.duplicates += 1;
                warn!(job_id = %job_id, attempt, "duplicate submission ignored");
                let msg = format!("{job_id}/{attempt} already submitted");
                return if self.inner.reject_duplicates {
                    Err(ClientError::Duplicate(msg))
                } else {
                    Ok(Ack::duplicate(msg))
                };
            }
            if job.cancel.is_cancelled() {
                return Ok(Ack::refused(format!("job {job_id} was cancelled")));
            }

            let mut record = JobAttempt::new(job_id.clone(), attempt);
            record.mark_submitted(SystemTime::now());
            job.attempts.insert(attempt, record.clone());
            job.max_attempts.get_or_insert(spec.max_attempts());
            let cancel = job.cancel.child_token();
            job.attempt_tokens.insert(attempt, cancel.clone());

            state.submissions.push((job_id.clone(), attempt));
            let _ = self.inner.events.send(record);
            cancel
        };

        debug!(job_id = %job_id, attempt, kind = spec.kind().kind(), "attempt accepted");
        tokio::spawn(Arc::clone(&self.inner).drive(
            job_id.clone(),
            attempt,
            spec.clone(),
            cancel,
        ));
        Ok(Ack::accepted())
    }

    async fn poll(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError> {
        self.inner.gate("poll")?;

        let state = self.inner.lock();
        state
            .jobs
            .get(job_id)
            .and_then(|job| job.attempts.get(&attempt))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{job_id}/{attempt}")))
    }

    async fn stream(&self, job_id: &JobId) -> Result<AttemptStream, ClientError> {
        self.inner.gate("stream")?;

        // Subscribe under the lock so no transition falls between snapshot and live feed.
        let (rx, snapshot, closed) = {
            let state = self.inner.lock();
            let job = state
                .jobs
                .get(job_id)
                .ok_or_else(|| ClientError::NotFound(job_id.to_string()))?;
            let rx = self.inner.events.subscribe();
            let snapshot: Vec<JobAttempt> = job.attempts.values().cloned().collect();
            let closed = job.cancel.is_cancelled() || snapshot.iter().any(|a| job.closed_by(a));
            (rx, snapshot, closed)
        };

        let (tx, out) = mpsc::channel(EVENT_CAPACITY);
        let inner = Arc::clone(&self.inner);
        let wanted = job_id.clone();
        tokio::spawn(async move {
            for attempt in snapshot {
                if tx.send(Ok(attempt)).await.is_err() {
                    return;
                }
            }
            if closed {
                return;
            }

            let mut live = BroadcastStream::new(rx);
            loop {
                let item = tokio::select! {
                    _ = tx.closed() => return,
                    item = live.next() => item,
                };
                let attempt = match item {
                    Some(Ok(attempt)) if attempt.job_id == wanted => attempt,
                    Some(Ok(_)) => continue,
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        let err = ClientError::Unavailable(format!(
                            "attempt stream lagged by {skipped} events"
                        ));
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                    None => return,
                };
                let last = inner.closes_job(&attempt);
                if tx.send(Ok(attempt)).await.is_err() || last {
                    trace!(job_id = %wanted, "attempt stream finished");
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(out)))
    }

    async fn cancel(&self, job_id: &JobId) -> Result<Ack, ClientError> {
        self.inner.gate("cancel")?;

        let now = SystemTime::now();
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.cancel_requests += 1;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| ClientError::NotFound(job_id.to_string()))?;
        job.cancel.cancel();

        let mut stopped = 0;
        for attempt in job.attempts.values_mut().filter(|a| a.state.is_active()) {
            if attempt.fail(
                RemoteError::new(FailureKind::Cancelled, "cancelled by caller"),
                now,
            ) {
                stopped += 1;
                let _ = self.inner.events.send(attempt.clone());
            }
        }

        if stopped == 0 {
            debug!(job_id = %job_id, "cancel found no active attempt");
            return Ok(Ack::refused("job has no active attempt"));
        }
        info!(job_id = %job_id, stopped, "job cancelled");
        Ok(Ack::accepted())
    }

    async fn cancel_attempt(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        self.inner.gate("cancel_attempt")?;

        let mut state = self.inner.lock();
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| ClientError::NotFound(job_id.to_string()))?;
        if let Some(token) = job.attempt_tokens.remove(&attempt) {
            token.cancel();
        }
        let Some(record) = job.attempts.get_mut(&attempt) else {
            return Err(ClientError::NotFound(format!("{job_id}/{attempt}")));
        };
        let abandoned = RemoteError::attempt_failed("attempt abandoned by the client");
        if !record.fail(abandoned, SystemTime::now()) {
            return Ok(Ack::refused("attempt already finished"));
        }
        let _ = self.inner.events.send(record.clone());
        info!(job_id = %job_id, attempt, "attempt cancelled");
        Ok(Ack::accepted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_model::build_command;

    async fn wait_terminal(
        plane: &InMemoryControlPlane,
        job_id: &JobId,
        attempt: u32,
    ) -> JobAttempt {
        loop {
            let state = plane.poll(job_id, attempt).await.unwrap();
            if state.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn accepted_attempt_runs_to_scripted_result() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Succeed(Some(b"done".to_vec())))
            .on_attempt(1, Behavior::Fail(RemoteError::attempt_failed("boom")))
            .latency(Duration::from_millis(1))
            .build();
        let spec = build_command("echo hi").unwrap();
        let job_id = plane.issue_id().await.unwrap();

        assert!(plane.submit(&job_id, &spec, 1).await.unwrap().accepted);
        assert!(plane.submit(&job_id, &spec, 2).await.unwrap().accepted);

        let first = wait_terminal(&plane, &job_id, 1).await;
        let second = wait_terminal(&plane, &job_id, 2).await;
        assert_eq!(first.state, AttemptState::Failed);
        assert_eq!(first.error.unwrap().message, "boom");
        assert_eq!(second.state, AttemptState::Succeeded);
        assert_eq!(second.result.as_deref(), Some(&b"done"[..]));
    }

    #[tokio::test]
    async fn duplicate_submission_creates_no_new_work() {
        let plane = InMemoryControlPlane::new();
        let spec = build_command("echo hi").unwrap();
        let job_id = plane.issue_id().await.unwrap();

        plane.submit(&job_id, &spec, 1).await.unwrap();
        let ack = plane.submit(&job_id, &spec, 1).await.unwrap();

        assert!(ack.duplicate);
        assert_eq!(plane.submission_count(&job_id), 1);
        assert_eq!(plane.duplicate_count(), 1);
    }

    #[tokio::test]
    async fn strict_plane_rejects_duplicates() {
        let plane = InMemoryControlPlane::builder().reject_duplicates(true).build();
        let spec = build_command("echo hi").unwrap();
        let job_id = plane.issue_id().await.unwrap();

        plane.submit(&job_id, &spec, 1).await.unwrap();
        let err = plane.submit(&job_id, &spec, 1).await.unwrap_err();
        assert!(matches!(err, ClientError::Duplicate(_)));
    }

    #[tokio::test]
    async fn cancel_fails_active_attempts() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Hang)
            .build();
        let spec = build_command("sleep 100").unwrap();
        let job_id = plane.issue_id().await.unwrap();
        plane.submit(&job_id, &spec, 1).await.unwrap();

        assert!(plane.cancel(&job_id).await.unwrap().accepted);
        let state = plane.poll(&job_id, 1).await.unwrap();
        assert_eq!(state.state, AttemptState::Failed);
        assert_eq!(state.error.unwrap().kind, FailureKind::Cancelled);
        assert!(plane.is_cancelled(&job_id));

        // Nothing left to stop.
        assert!(!plane.cancel(&job_id).await.unwrap().accepted);
    }

    #[tokio::test]
    async fn unavailable_plane_fails_every_call() {
        let plane = InMemoryControlPlane::new();
        plane.set_available(false);
        assert!(matches!(plane.issue_id().await, Err(ClientError::Unavailable(_))));

        plane.set_available(true);
        plane.fail_transport(1);
        assert!(plane.issue_id().await.is_err());
        assert!(plane.issue_id().await.is_ok());
    }

    #[tokio::test]
    async fn oversized_spec_is_rejected() {
        let plane = InMemoryControlPlane::builder()
            .capacity(Resources::parse(2, "1GB").unwrap())
            .build();
        let spec = JobSpec::builder(hydra_model::JobKind::Command {
            command: "train".into(),
        })
        .cpu(8)
        .build()
        .unwrap();
        let job_id = plane.issue_id().await.unwrap();

        let err = plane.submit(&job_id, &spec, 1).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected(msg) if msg.contains("cpu")));
        assert!(plane.submissions().is_empty());
    }

    #[tokio::test]
    async fn stream_replays_snapshot_then_follows_live_transitions() {
        let plane = InMemoryControlPlane::builder()
            .latency(Duration::from_millis(50))
            .build();
        let spec = build_command("echo hi").unwrap();
        let job_id = plane.issue_id().await.unwrap();
        plane.submit(&job_id, &spec, 1).await.unwrap();

        let mut events = plane.stream(&job_id).await.unwrap();
        let mut seen = Vec::new();
        while let Some(item) = events.next().await {
            seen.push(item.unwrap().state);
        }

        assert_eq!(seen.first(), Some(&AttemptState::Submitted));
        assert_eq!(seen.last(), Some(&AttemptState::Succeeded));
    }

    async fn drain(plane: &InMemoryControlPlane, job_id: &JobId) -> Vec<JobAttempt> {
        let mut events = plane.stream(job_id).await.unwrap();
        let collect = async {
            let mut seen = Vec::new();
            while let Some(item) = events.next().await {
                seen.push(item.unwrap());
            }
            seen
        };
        tokio::time::timeout(Duration::from_millis(500), collect)
            .await
            .expect("attempt stream did not end")
    }

    #[tokio::test]
    async fn stream_of_finished_job_ends_after_the_snapshot() {
        let plane = InMemoryControlPlane::builder()
            .latency(Duration::from_millis(1))
            .build();
        let spec = build_command("echo hi").unwrap();
        let job_id = plane.issue_id().await.unwrap();
        plane.submit(&job_id, &spec, 1).await.unwrap();
        wait_terminal(&plane, &job_id, 1).await;

        let seen = drain(&plane, &job_id).await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].state, AttemptState::Succeeded);
    }

    #[tokio::test]
    async fn stream_ends_when_the_last_allowed_attempt_fails() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Fail(RemoteError::attempt_failed("boom")))
            .latency(Duration::from_millis(1))
            .build();
        let spec = JobSpec::builder(hydra_model::JobKind::Command {
            command: "false".into(),
        })
        .max_retries(1)
        .build()
        .unwrap();
        let job_id = plane.issue_id().await.unwrap();
        plane.submit(&job_id, &spec, 1).await.unwrap();
        wait_terminal(&plane, &job_id, 1).await;

        // Attempt 1 of 2 failed: the job stays open for the retry.
        let mut events = plane.stream(&job_id).await.unwrap();
        assert!(events.next().await.unwrap().unwrap().is_terminal());
        plane.submit(&job_id, &spec, 2).await.unwrap();

        let mut last = None;
        let follow = async {
            while let Some(item) = events.next().await {
                last = Some(item.unwrap());
            }
        };
        tokio::time::timeout(Duration::from_millis(500), follow)
            .await
            .expect("attempt stream did not end");
        let last = last.unwrap();
        assert_eq!(last.attempt_number, 2);
        assert_eq!(last.state, AttemptState::Failed);
    }

    #[tokio::test]
    async fn stream_of_cancelled_job_ends() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Hang)
            .build();
        let spec = build_command("sleep 100").unwrap();
        let job_id = plane.issue_id().await.unwrap();
        plane.submit(&job_id, &spec, 1).await.unwrap();

        let mut events = plane.stream(&job_id).await.unwrap();
        assert!(!events.next().await.unwrap().unwrap().is_terminal());
        plane.cancel(&job_id).await.unwrap();

        let mut rest = Vec::new();
        let follow = async {
            while let Some(item) = events.next().await {
                rest.push(item.unwrap());
            }
        };
        tokio::time::timeout(Duration::from_millis(500), follow)
            .await
            .expect("attempt stream did not end");
        assert_eq!(rest.last().map(|a| a.state), Some(AttemptState::Failed));
    }

    #[tokio::test]
    async fn cancel_attempt_stops_only_that_attempt() {
        let plane = InMemoryControlPlane::builder()
            .on_attempt(1, Behavior::Hang)
            .latency(Duration::from_millis(1))
            .build();
        let spec = JobSpec::builder(hydra_model::JobKind::Command {
            command: "sleep 100".into(),
        })
        .max_retries(1)
        .build()
        .unwrap();
        let job_id = plane.issue_id().await.unwrap();
        plane.submit(&job_id, &spec, 1).await.unwrap();

        assert!(plane.cancel_attempt(&job_id, 1).await.unwrap().accepted);
        let first = plane.poll(&job_id, 1).await.unwrap();
        assert_eq!(first.state, AttemptState::Failed);
        assert!(!plane.is_cancelled(&job_id));
        assert!(!plane.cancel_attempt(&job_id, 1).await.unwrap().accepted);

        assert!(plane.submit(&job_id, &spec, 2).await.unwrap().accepted);
        let second = wait_terminal(&plane, &job_id, 2).await;
        assert_eq!(second.state, AttemptState::Succeeded);
    }

    #[tokio::test]
    async fn poll_of_unknown_attempt_is_not_found() {
        let plane = InMemoryControlPlane::new();
        let err = plane.poll(&JobId::from("job-missing"), 1).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }
}
