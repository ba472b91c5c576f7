use std::{future::Future, time::Duration};

use async_trait::async_trait;
use hydra_model::{AttemptNumber, JobAttempt, JobId, JobSpec};
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    submission::{Ack, AttemptStream, SubmissionClient},
};

/// Bounded retry of transient transport errors.
///
/// Only [`ClientError::is_transient`] errors are retried; everything else is returned at once.
/// The delay grows linearly with the retry number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportRetry {
    /// Extra tries after the first call.
    pub max_retries: u32,
    /// Base delay between tries.
    pub delay_ms: u64,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 100,
        }
    }
}

impl TransportRetry {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay_ms: 0,
        }
    }

    pub async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut retry = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = Duration::from_millis(self.delay_ms.saturating_mul(retry as u64));
                    debug!(
                        op,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient transport error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(op, tries = retry + 1, error = %err, "transport retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// [`SubmissionClient`] decorator applying a [`TransportRetry`] policy to every call.
///
/// Retrying `submit` is safe because the control plane deduplicates `(job_id, attempt)` pairs.
/// For `stream` only opening the stream is retried.
pub struct RetryingClient<C> {
    inner: C,
    policy: TransportRetry,
}

impl<C> RetryingClient<C>
where
    C: SubmissionClient,
{
    pub fn new(inner: C, policy: TransportRetry) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn policy(&self) -> TransportRetry {
        self.policy
    }
}

#[async_trait]
impl<C> SubmissionClient for RetryingClient<C>
where
    C: SubmissionClient,
{
    async fn issue_id(&self) -> Result<JobId, ClientError> {
        let inner = &self.inner;
        self.policy.run("issue_id", move || inner.issue_id()).await
    }

    async fn submit(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        let inner = &self.inner;
        self.policy
            .run("submit", move || inner.submit(job_id, spec, attempt))
            .await
    }

    async fn poll(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError> {
        let inner = &self.inner;
        self.policy
            .run("poll", move || inner.poll(job_id, attempt))
            .await
    }

    async fn stream(&self, job_id: &JobId) -> Result<AttemptStream, ClientError> {
        let inner = &self.inner;
        self.policy.run("stream", move || inner.stream(job_id)).await
    }

    async fn cancel(&self, job_id: &JobId) -> Result<Ack, ClientError> {
        let inner = &self.inner;
        self.policy.run("cancel", move || inner.cancel(job_id)).await
    }

    async fn cancel_attempt(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        let inner = &self.inner;
        self.policy
            .run("cancel_attempt", move || inner.cancel_attempt(job_id, attempt))
            .await
    }
}
