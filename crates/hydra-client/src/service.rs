use std::pin::Pin;

use hydra_model::{JobId, JobSpec};
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::{
    proto::{
        self,
        control_plane_server::{ControlPlane, ControlPlaneServer},
    },
    submission::SubmissionClient,
};

/// gRPC server exposing any [`SubmissionClient`] as a `hydra.v1.ControlPlane`.
///
/// Serving an [`crate::InMemoryControlPlane`] this way gives a local control plane
/// that remote hydra clients can talk to.
pub struct ControlPlaneService<C> {
    backend: C,
}

impl<C> ControlPlaneService<C>
where
    C: SubmissionClient,
{
    pub fn new(backend: C) -> Self {
        Self { backend }
    }

    pub fn into_server(self) -> ControlPlaneServer<Self> {
        ControlPlaneServer::new(self)
    }
}

fn job_id_from(raw: String) -> Result<JobId, Status> {
    if raw.trim().is_empty() {
        return Err(Status::invalid_argument("job_id cannot be empty"));
    }
    Ok(JobId::from(raw))
}

fn attempt_from(raw: u32) -> Result<u32, Status> {
    if raw == 0 {
        return Err(Status::invalid_argument("attempt_number must be at least 1"));
    }
    Ok(raw)
}

type AttemptEvents =
    Pin<Box<dyn Stream<Item = Result<proto::JobAttempt, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl<C> ControlPlane for ControlPlaneService<C>
where
    C: SubmissionClient,
{
    async fn issue_job_id(
        &self,
        _request: Request<proto::IssueJobIdRequest>,
    ) -> Result<Response<proto::IssueJobIdResponse>, Status> {
        let job_id = self.backend.issue_id().await.map_err(Status::from)?;
        Ok(Response::new(proto::IssueJobIdResponse {
            job_id: job_id.to_string(),
        }))
    }

    async fn submit_attempt(
        &self,
        request: Request<proto::SubmitAttemptRequest>,
    ) -> Result<Response<proto::Ack>, Status> {
        let req = request.into_inner();

        let job_id = job_id_from(req.job_id)?;
        let attempt = attempt_from(req.attempt_number)?;
        let spec = req
            .spec
            .ok_or_else(|| Status::invalid_argument("missing spec"))?;
        let spec = JobSpec::try_from(spec).map_err(Status::from)?;

        let ack = self
            .backend
            .submit(&job_id, &spec, attempt)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(proto::Ack::from(ack)))
    }

    async fn get_attempt_state(
        &self,
        request: Request<proto::GetAttemptStateRequest>,
    ) -> Result<Response<proto::JobAttempt>, Status> {
        let req = request.into_inner();

        let job_id = job_id_from(req.job_id)?;
        let attempt = attempt_from(req.attempt_number)?;

        let state = self
            .backend
            .poll(&job_id, attempt)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(proto::JobAttempt::from(state)))
    }

    type StreamJobEventsStream = AttemptEvents;

    async fn stream_job_events(
        &self,
        request: Request<proto::StreamJobEventsRequest>,
    ) -> Result<Response<Self::StreamJobEventsStream>, Status> {
        let job_id = job_id_from(request.into_inner().job_id)?;

        let events = self.backend.stream(&job_id).await.map_err(Status::from)?;
        debug!(job_id = %job_id, "serving attempt stream");

        let events = events.map(|item| item.map(proto::JobAttempt::from).map_err(Status::from));
        Ok(Response::new(Box::pin(events)))
    }

    async fn cancel_job(
        &self,
        request: Request<proto::CancelJobRequest>,
    ) -> Result<Response<proto::Ack>, Status> {
        let job_id = job_id_from(request.into_inner().job_id)?;

        let ack = self.backend.cancel(&job_id).await.map_err(Status::from)?;
        Ok(Response::new(proto::Ack::from(ack)))
    }

    async fn cancel_attempt(
        &self,
        request: Request<proto::CancelAttemptRequest>,
    ) -> Result<Response<proto::Ack>, Status> {
        let req = request.into_inner();

        let job_id = job_id_from(req.job_id)?;
        let attempt = attempt_from(req.attempt_number)?;

        let ack = self
            .backend
            .cancel_attempt(&job_id, attempt)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(proto::Ack::from(ack)))
    }
}
