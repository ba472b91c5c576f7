use std::sync::Arc;

use hydra_client::SubmissionClient;
use hydra_model::{JobId, JobOutcome, JobSpec};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    coordinator::{Coordinator, ExecuteOptions},
    error::CoreError,
};

/// Non-blocking handle to a job running on a background task.
pub struct JobHandle {
    issued: watch::Receiver<Option<JobId>>,
    cancel: CancellationToken,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn spawn<C>(
        coordinator: Arc<Coordinator<C>>,
        spec: JobSpec,
        opts: ExecuteOptions,
    ) -> Self
    where
        C: SubmissionClient,
    {
        let (tx, issued) = watch::channel(None);
        let cancel = opts.cancel.clone();
        let task = tokio::spawn(async move { coordinator.run(&spec, opts, Some(&tx)).await });

        Self {
            issued,
            cancel,
            task,
        }
    }

    /// Job id, once the control plane issued it.
    pub fn job_id(&self) -> Option<JobId> {
        self.issued.borrow().clone()
    }

    /// Wait until the job id is known. `None` if the job ended without one.
    pub async fn issued_id(&mut self) -> Option<JobId> {
        let _ = self.issued.wait_for(Option::is_some).await;
        self.issued.borrow().clone()
    }

    /// Request cancellation; the outcome reports `CANCELLED` unless the job already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn await_result(self) -> Result<JobOutcome, CoreError> {
        self.task.await.map_err(|e| CoreError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_client::{Behavior, InMemoryControlPlane};
    use hydra_model::{FailureKind, build_command};
    use std::time::Duration;

    #[tokio::test]
    async fn handle_reports_id_and_outcome() {
        let plane = InMemoryControlPlane::new();
        let coordinator = Arc::new(Coordinator::new(plane.clone()));

        let mut handle = JobHandle::spawn(
            coordinator,
            build_command("echo hi").unwrap(),
            ExecuteOptions::default(),
        );
        let job_id = handle.issued_id().await.unwrap();
        let outcome = handle.await_result().await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.job_id(), &job_id);
    }

    #[tokio::test]
    async fn cancel_through_the_handle() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Hang)
            .build();
        let coordinator = Arc::new(Coordinator::new(plane.clone()));

        let mut handle = JobHandle::spawn(
            coordinator,
            build_command("sleep 600").unwrap(),
            ExecuteOptions::default(),
        );
        let job_id = handle.issued_id().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let outcome = handle.await_result().await.unwrap();
        let error = outcome.error().unwrap();
        assert_eq!(error.kind, FailureKind::Cancelled);
        assert_eq!(error.attempt, Some(1));
        assert!(plane.is_cancelled(&job_id));
    }
}
