use async_trait::async_trait;
use hydra_model::{AttemptNumber, JobAttempt, JobId, JobSpec};
use tokio_stream::StreamExt;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, instrument};

use crate::{
    config::ClientConfig,
    error::ClientError,
    proto::{self, control_plane_client::ControlPlaneClient},
    submission::{Ack, AttemptStream, SubmissionClient},
};

/// [`SubmissionClient`] speaking the `hydra.v1.ControlPlane` gRPC protocol.
///
/// Cheap to clone; every clone shares one HTTP/2 channel.
#[derive(Debug, Clone)]
pub struct GrpcSubmissionClient {
    client: ControlPlaneClient<Channel>,
}

impl GrpcSubmissionClient {
    /// Build a client whose channel connects on first use.
    ///
    /// An unreachable control plane surfaces as [`ClientError::Unavailable`] on the first call.
    pub fn connect_lazy(config: &ClientConfig) -> Result<Self, ClientError> {
        let channel = endpoint(config)?.connect_lazy();
        Ok(Self::from_channel(channel))
    }

    /// Build a client and establish the connection eagerly.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let channel = endpoint(config)?.connect().await?;
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: ControlPlaneClient::new(channel),
        }
    }
}

fn endpoint(config: &ClientConfig) -> Result<Endpoint, ClientError> {
    config.validate()?;
    let endpoint = Endpoint::from_shared(config.address.trim().to_string())
        .map_err(|e| ClientError::InvalidConfig(format!("invalid address: {e}")))?
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout());
    Ok(endpoint)
}

#[async_trait]
impl SubmissionClient for GrpcSubmissionClient {
    #[instrument(level = "debug", skip(self))]
    async fn issue_id(&self) -> Result<JobId, ClientError> {
        let resp = self
            .client
            .clone()
            .issue_job_id(proto::IssueJobIdRequest {})
            .await?
            .into_inner();

        if resp.job_id.trim().is_empty() {
            return Err(ClientError::InvalidResponse("control plane issued an empty job id".into()));
        }
        Ok(JobId::from(resp.job_id))
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job_id, attempt = attempt))]
    async fn submit(
        &self,
        job_id: &JobId,
        spec: &JobSpec,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        let req = proto::SubmitAttemptRequest {
            job_id: job_id.to_string(),
            attempt_number: attempt,
            spec: Some(proto::JobSpec::from(spec)),
        };
        let ack = self.client.clone().submit_attempt(req).await?.into_inner();
        Ok(Ack::from(ack))
    }

    #[instrument(level = "trace", skip_all, fields(job_id = %job_id, attempt = attempt))]
    async fn poll(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<JobAttempt, ClientError> {
        let req = proto::GetAttemptStateRequest {
            job_id: job_id.to_string(),
            attempt_number: attempt,
        };
        let wire = self.client.clone().get_attempt_state(req).await?.into_inner();
        JobAttempt::try_from(wire)
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job_id))]
    async fn stream(&self, job_id: &JobId) -> Result<AttemptStream, ClientError> {
        let req = proto::StreamJobEventsRequest {
            job_id: job_id.to_string(),
        };
        let inbound = self.client.clone().stream_job_events(req).await?.into_inner();
        debug!("attempt stream opened");

        let stream = inbound.map(|item| match item {
            Ok(wire) => JobAttempt::try_from(wire),
            Err(status) => Err(ClientError::from(status)),
        });
        Ok(Box::pin(stream))
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job_id))]
    async fn cancel(&self, job_id: &JobId) -> Result<Ack, ClientError> {
        let req = proto::CancelJobRequest {
            job_id: job_id.to_string(),
        };
        let ack = self.client.clone().cancel_job(req).await?.into_inner();
        Ok(Ack::from(ack))
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job_id, attempt = attempt))]
    async fn cancel_attempt(
        &self,
        job_id: &JobId,
        attempt: AttemptNumber,
    ) -> Result<Ack, ClientError> {
        let req = proto::CancelAttemptRequest {
            job_id: job_id.to_string(),
            attempt_number: attempt,
        };
        let ack = self.client.clone().cancel_attempt(req).await?.into_inner();
        Ok(Ack::from(ack))
    }
}
