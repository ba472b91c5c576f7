use std::sync::Arc;

use async_trait::async_trait;
use hydra_client::AttemptExecutor;
use hydra_model::{AttemptNumber, JobId, JobSpec, RemoteError};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::{error::ExecError, runner::Runner};

/// [`AttemptExecutor`] dispatching each attempt to the first runner supporting its kind.
#[derive(Default)]
pub struct RouterExecutor {
    runners: Vec<Arc<dyn Runner>>,
}

impl RouterExecutor {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.register(runner);
        self
    }

    #[inline]
    pub fn register(&mut self, runner: Arc<dyn Runner>) {
        self.runners.push(runner);
    }

    pub fn pick(&self, spec: &JobSpec) -> Option<&Arc<dyn Runner>> {
        self.runners.iter().find(|r| r.supports(spec))
    }
}

#[async_trait]
impl AttemptExecutor for RouterExecutor {
    #[instrument(
        level = "debug",
        skip_all,
        fields(job_id = %job_id, attempt = attempt, kind = spec.kind().kind())
    )]
    async fn execute(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
        spec: &JobSpec,
        cancel: CancellationToken,
    ) -> Result<Option<Vec<u8>>, RemoteError> {
        let runner = self
            .pick(spec)
            .ok_or(ExecError::NoRunner(spec.kind().kind()))?;
        trace!(runner = runner.name(), "runner picked");

        runner.run(spec, cancel).await.map_err(RemoteError::from)
    }
}
