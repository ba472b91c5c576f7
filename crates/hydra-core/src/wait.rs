use std::time::Duration;

use hydra_client::{ClientError, SubmissionClient};
use hydra_model::{AttemptNumber, JobAttempt, JobId};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{debug, trace, warn};

/// How the coordinator observes an attempt until it is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    /// Follow `stream(job_id)`; fall back to polling if the stream breaks or ends early.
    #[default]
    Stream,
    /// Call `poll(job_id, attempt)` every `poll_interval`.
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStrategy {
    pub mode: WaitMode,
    pub poll_interval: Duration,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self {
            mode: WaitMode::Stream,
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl WaitStrategy {
    pub fn poll(poll_interval: Duration) -> Self {
        Self {
            mode: WaitMode::Poll,
            poll_interval,
        }
    }

    pub fn stream(poll_interval: Duration) -> Self {
        Self {
            mode: WaitMode::Stream,
            poll_interval,
        }
    }

    /// Resolve with the first terminal state of `attempt`.
    ///
    /// Never gives up on its own; the caller bounds it with a timeout and cancellation.
    pub async fn wait_terminal<C>(
        &self,
        client: &C,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError>
    where
        C: SubmissionClient + ?Sized,
    {
        if self.mode == WaitMode::Stream {
            match follow_stream(client, job_id, attempt).await {
                Some(terminal) => return Ok(terminal),
                None => debug!(job_id = %job_id, attempt, "stream gave no terminal state, polling"),
            }
        }
        self.poll_until_terminal(client, job_id, attempt).await
    }

    async fn poll_until_terminal<C>(
        &self,
        client: &C,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError>
    where
        C: SubmissionClient + ?Sized,
    {
        loop {
            let state = client.poll(job_id, attempt).await?;
            if state.is_terminal() {
                return Ok(state);
            }
            trace!(job_id = %job_id, attempt, state = state.state.as_str(), "attempt still active");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

async fn follow_stream<C>(client: &C, job_id: &JobId, attempt: AttemptNumber) -> Option<JobAttempt>
where
    C: SubmissionClient + ?Sized,
{
    let mut events = match client.stream(job_id).await {
        Ok(events) => events,
        Err(err) => {
            warn!(job_id = %job_id, attempt, error = %err, "failed to open attempt stream");
            return None;
        }
    };

    while let Some(item) = events.next().await {
        match item {
            Ok(state) if state.attempt_number == attempt && state.is_terminal() => {
                return Some(state);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(job_id = %job_id, attempt, error = %err, "attempt stream broke");
                return None;
            }
        }
    }
    None
}
