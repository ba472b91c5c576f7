use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use hydra_model::{AttemptNumber, JobAttempt, JobId, JobSpec};
use tokio_stream::Stream;

use crate::error::ClientError;

/// Lazy sequence of attempt state transitions for one job.
pub type AttemptStream = Pin<Box<dyn Stream<Item = Result<JobAttempt, ClientError>> + Send>>;

/// Acknowledgement returned by submission and cancellation calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ack {
    pub accepted: bool,
    /// The request repeated an earlier one; no new work was created.
    pub duplicate: bool,
    pub message: String,
}

impl Ack {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            ..Default::default()
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            duplicate: true,
            message: message.into(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            duplicate: false,
            message: message.into(),
        }
    }
}

/// Façade over the control plane.
///
/// Implementations must be safe for concurrent use by many coordinators:
/// calls for different jobs never interfere with each other.
#[async_trait]
pub trait SubmissionClient: Send + Sync + 'static {
    /// Issue a fresh job id, unique across concurrent callers.
    async fn issue_id(&self) -> Result<JobId, ClientError>;

    /// Submit one attempt of `job_id`.
    ///
    /// Idempotent per `(job_id, attempt)`: a repeated pair never creates new work.
    async fn submit(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError>;

    /// Current state of one attempt.
    async fn poll(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError>;

    /// State transitions of every attempt of `job_id`, starting with the current snapshot.
    ///
    /// The stream is finite: it ends after the transition that leaves the job unable to
    /// progress (an attempt succeeded, the last allowed attempt finished, or the job was
    /// cancelled).
    async fn stream(&self, job_id: &JobId) -> Result<AttemptStream, ClientError>;

    /// Best-effort cancellation. A job that already finished is not an error;
    /// the control plane answers with a refused [`Ack`].
    async fn cancel(&self, job_id: &JobId) -> Result<Ack, ClientError>;

    /// Stop one attempt the caller gave up on, leaving the job open for the next attempt.
    ///
    /// An attempt that is already terminal is answered with a refused [`Ack`].
    async fn cancel_attempt(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError>;
}

#[async_trait]
impl<C> SubmissionClient for Arc<C>
where
    C: SubmissionClient + ?Sized,
{
    async fn issue_id(&self) -> Result<JobId, ClientError> {
        (**self).issue_id().await
    }

    async fn submit(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        (**self).submit(job_id, spec, attempt).await
    }

    async fn poll(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError> {
        (**self).poll(job_id, attempt).await
    }

    async fn stream(&self, job_id: &JobId) -> Result<AttemptStream, ClientError> {
        (**self).stream(job_id).await
    }

    async fn cancel(&self, job_id: &JobId) -> Result<Ack, ClientError> {
        (**self).cancel(job_id).await
    }

    async fn cancel_attempt(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        (**self).cancel_attempt(job_id, attempt).await
    }
}
