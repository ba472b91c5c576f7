use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hydra_model::{
    AttemptState, FailureKind, FunctionCall, JobAttempt, JobId, JobKind, JobSpec, JobSpecBuilder,
    MemorySize, RemoteError,
};
use tracing::warn;

use crate::{error::ClientError, proto, submission::Ack};

impl From<AttemptState> for proto::AttemptState {
    fn from(state: AttemptState) -> Self {
        match state {
            AttemptState::Pending => proto::AttemptState::Pending,
            AttemptState::Submitted => proto::AttemptState::Submitted,
            AttemptState::Running => proto::AttemptState::Running,
            AttemptState::Succeeded => proto::AttemptState::Succeeded,
            AttemptState::Failed => proto::AttemptState::Failed,
        }
    }
}

impl TryFrom<proto::AttemptState> for AttemptState {
    type Error = ClientError;

    fn try_from(state: proto::AttemptState) -> Result<Self, Self::Error> {
        match state {
            proto::AttemptState::Pending => Ok(AttemptState::Pending),
            proto::AttemptState::Submitted => Ok(AttemptState::Submitted),
            proto::AttemptState::Running => Ok(AttemptState::Running),
            proto::AttemptState::Succeeded => Ok(AttemptState::Succeeded),
            proto::AttemptState::Failed => Ok(AttemptState::Failed),
            proto::AttemptState::Unspecified => Err(ClientError::InvalidResponse(
                "attempt state is unspecified".into(),
            )),
        }
    }
}

impl From<FailureKind> for proto::FailureKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::InvalidSpecification => proto::FailureKind::InvalidSpecification,
            FailureKind::ControlPlaneUnavailable => proto::FailureKind::ControlPlaneUnavailable,
            FailureKind::AttemptFailed => proto::FailureKind::AttemptFailed,
            FailureKind::Timeout => proto::FailureKind::Timeout,
            FailureKind::Cancelled => proto::FailureKind::Cancelled,
        }
    }
}

/// Unspecified kinds are read as a plain attempt failure.
fn failure_kind_from_wire(raw: i32) -> FailureKind {
    match proto::FailureKind::try_from(raw) {
        Ok(proto::FailureKind::InvalidSpecification) => FailureKind::InvalidSpecification,
        Ok(proto::FailureKind::ControlPlaneUnavailable) => FailureKind::ControlPlaneUnavailable,
        Ok(proto::FailureKind::Timeout) => FailureKind::Timeout,
        Ok(proto::FailureKind::Cancelled) => FailureKind::Cancelled,
        Ok(proto::FailureKind::AttemptFailed) | Ok(proto::FailureKind::Unspecified) => {
            FailureKind::AttemptFailed
        }
        Err(_) => {
            warn!(kind = raw, "unknown failure kind on the wire, treating as attempt failure");
            FailureKind::AttemptFailed
        }
    }
}

impl From<RemoteError> for proto::RemoteError {
    fn from(err: RemoteError) -> Self {
        proto::RemoteError {
            kind: proto::FailureKind::from(err.kind) as i32,
            message: err.message,
            payload: err.payload,
            exit_code: err.exit_code,
        }
    }
}

impl From<proto::RemoteError> for RemoteError {
    fn from(err: proto::RemoteError) -> Self {
        RemoteError {
            kind: failure_kind_from_wire(err.kind),
            message: err.message,
            payload: err.payload,
            exit_code: err.exit_code,
        }
    }
}

fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_else(|e| {
            warn!(error = %e, "timestamp is before unix epoch, defaulting to 0");
            Duration::ZERO
        })
        .as_millis() as u64
}

fn from_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

impl From<JobAttempt> for proto::JobAttempt {
    fn from(attempt: JobAttempt) -> Self {
        proto::JobAttempt {
            job_id: attempt.job_id.to_string(),
            attempt_number: attempt.attempt_number,
            state: proto::AttemptState::from(attempt.state) as i32,
            started_at_ms: attempt.started_at.map(to_millis),
            ended_at_ms: attempt.ended_at.map(to_millis),
            result: attempt.result,
            error: attempt.error.map(proto::RemoteError::from),
        }
    }
}

impl TryFrom<proto::JobAttempt> for JobAttempt {
    type Error = ClientError;

    fn try_from(attempt: proto::JobAttempt) -> Result<Self, Self::Error> {
        if attempt.job_id.trim().is_empty() {
            return Err(ClientError::InvalidResponse("attempt without job id".into()));
        }
        if attempt.attempt_number == 0 {
            return Err(ClientError::InvalidResponse(
                "attempt numbers start at 1".into(),
            ));
        }

        let state = proto::AttemptState::try_from(attempt.state)
            .map_err(|_| {
                ClientError::InvalidResponse(format!("unknown attempt state {}", attempt.state))
            })
            .and_then(AttemptState::try_from)?;

        Ok(JobAttempt {
            job_id: JobId::from(attempt.job_id),
            attempt_number: attempt.attempt_number,
            state,
            started_at: attempt.started_at_ms.map(from_millis),
            ended_at: attempt.ended_at_ms.map(from_millis),
            result: attempt.result,
            error: attempt.error.map(RemoteError::from),
        })
    }
}

impl From<&JobSpec> for proto::JobSpec {
    fn from(spec: &JobSpec) -> Self {
        let payload = match spec.kind() {
            JobKind::Command { command } => {
                proto::job_spec::Payload::Command(proto::CommandPayload {
                    command: command.clone(),
                })
            }
            JobKind::Function(call) => proto::job_spec::Payload::Function(proto::FunctionPayload {
                callable: call.callable.clone(),
                args: call.args.clone(),
                kwargs: call.kwargs.clone(),
                codec: call.codec.clone(),
            }),
        };

        proto::JobSpec {
            payload: Some(payload),
            resources: Some(proto::Resources {
                cpu: spec.resources().cpu(),
                memory_bytes: spec.resources().memory().bytes(),
            }),
            max_retries: spec.max_retries(),
        }
    }
}

/// Wire specs are re-validated through [`JobSpecBuilder`]; violations become
/// [`ClientError::Rejected`].
impl TryFrom<proto::JobSpec> for JobSpec {
    type Error = ClientError;

    fn try_from(spec: proto::JobSpec) -> Result<Self, Self::Error> {
        let kind = match spec.payload {
            Some(proto::job_spec::Payload::Command(cmd)) => JobKind::Command {
                command: cmd.command,
            },
            Some(proto::job_spec::Payload::Function(func)) => {
                let call = FunctionCall::new(func.callable, func.args, func.kwargs);
                JobKind::Function(if func.codec.is_empty() {
                    call
                } else {
                    call.with_codec(func.codec)
                })
            }
            None => return Err(ClientError::Rejected("missing job payload".into())),
        };

        let mut builder = JobSpecBuilder::new(kind).max_retries(spec.max_retries);
        if let Some(resources) = spec.resources {
            let memory = MemorySize::from_bytes(resources.memory_bytes)
                .map_err(|e| ClientError::Rejected(e.to_string()))?;
            builder = builder.cpu(resources.cpu).memory_size(memory);
        }

        builder
            .build()
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }
}

impl From<Ack> for proto::Ack {
    fn from(ack: Ack) -> Self {
        proto::Ack {
            accepted: ack.accepted,
            duplicate: ack.duplicate,
            message: ack.message,
        }
    }
}

impl From<proto::Ack> for Ack {
    fn from(ack: proto::Ack) -> Self {
        Ack {
            accepted: ack.accepted,
            duplicate: ack.duplicate,
            message: ack.message,
        }
    }
}
