use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use hydra_client::SubmissionClient;
use hydra_model::{
    FailureKind, FunctionCall, JobFailure, JobSpecBuilder, JsonCodec, PayloadCodec, Resources,
    encode_as,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::trace;

use crate::{coordinator::Coordinator, error::JobExecutionError, reporter::Reporter};

/// A function the caller can invoke without knowing where it runs.
///
/// [`LocalCall`] runs it in-process; [`RemoteCall`] routes it through the coordinator
/// as a FUNCTION job. Both report failures as [`JobExecutionError`] carrying the same message.
#[async_trait]
pub trait Executable<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str;

    async fn call(&self, input: I) -> Result<O, JobExecutionError>;
}

type LocalFn<I, O> = dyn Fn(I) -> Result<O, String> + Send + Sync;

/// Direct in-process call.
pub struct LocalCall<I, O> {
    name: String,
    func: Arc<LocalFn<I, O>>,
}

impl<I, O> LocalCall<I, O> {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(I) -> Result<O, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<I, O> Executable<I, O> for LocalCall<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, input: I) -> Result<O, JobExecutionError> {
        trace!(callable = %self.name, "local call");
        (self.func)(input).map_err(|message| {
            JobExecutionError::Failed(
                JobFailure::new(FailureKind::AttemptFailed, message).at_attempt(1),
            )
        })
    }
}

/// Call routed through the coordinator as a FUNCTION job.
///
/// The input is encoded as the positional arguments; keyword arguments are an empty map.
pub struct RemoteCall<C, I, O> {
    name: String,
    coordinator: Arc<Coordinator<C>>,
    resources: Resources,
    max_retries: u32,
    codec: Arc<dyn PayloadCodec>,
    _io: PhantomData<fn(I) -> O>,
}

impl<C, I, O> RemoteCall<C, I, O>
where
    C: SubmissionClient,
{
    pub fn new(
        coordinator: Arc<Coordinator<C>>,
        name: impl Into<String>,
        resources: Resources,
        max_retries: u32,
    ) -> Self {
        Self {
            name: name.into(),
            coordinator,
            resources,
            max_retries,
            codec: Arc::new(JsonCodec),
            _io: PhantomData,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }
}

#[async_trait]
impl<C, I, O> Executable<I, O> for RemoteCall<C, I, O>
where
    C: SubmissionClient,
    I: Serialize + Send + Sync + 'static,
    O: DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, input: I) -> Result<O, JobExecutionError> {
        let codec = self.codec.as_ref();
        let args = encode_as(codec, &input).map_err(JobExecutionError::Codec)?;
        let kwargs = codec
            .encode(&Value::Object(Map::new()))
            .map_err(JobExecutionError::Codec)?;

        let spec = JobSpecBuilder::function(
            FunctionCall::new(self.name.clone(), args, kwargs).with_codec(codec.name()),
        )
        .resources(self.resources)
        .max_retries(self.max_retries)
        .build()
        .map_err(JobExecutionError::InvalidSpecification)?;

        let outcome = self.coordinator.execute(&spec).await;
        Reporter::into_value(outcome, codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_client::{Behavior, InMemoryControlPlane};
    use hydra_model::RemoteError;

    #[tokio::test]
    async fn local_failure_keeps_the_message() {
        let call = LocalCall::new("parse", |raw: String| {
            raw.parse::<u32>().map_err(|e| format!("ValueError: {e}"))
        });

        assert_eq!(call.call("42".to_string()).await.unwrap(), 42);
        let err = call.call("x".to_string()).await.unwrap_err();
        assert!(err.to_string().starts_with("ValueError: "));
    }

    #[tokio::test]
    async fn remote_call_decodes_result_and_sends_function_spec() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Succeed(Some(br#"{"status":"success"}"#.to_vec())))
            .latency(std::time::Duration::from_millis(1))
            .build();
        let coordinator = Arc::new(Coordinator::new(plane.clone()));
        let call: RemoteCall<_, String, Value> = RemoteCall::new(
            coordinator,
            "analyze_data",
            Resources::parse(4, "4GB").unwrap(),
            5,
        );

        let value = call.call("s3://bucket/x.csv".to_string()).await.unwrap();
        assert_eq!(value["status"], "success");

        let (job_id, _) = plane.submissions().remove(0);
        assert_eq!(plane.attempts(&job_id).len(), 1);
    }

    #[tokio::test]
    async fn remote_failure_reads_like_a_local_one() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Fail(RemoteError::attempt_failed("ValueError: bad row")))
            .latency(std::time::Duration::from_millis(1))
            .build();
        let coordinator = Arc::new(Coordinator::new(plane));
        let call: RemoteCall<_, u32, u32> =
            RemoteCall::new(coordinator, "double", Resources::default(), 0);

        let err = call.call(1).await.unwrap_err();
        assert_eq!(err.to_string(), "ValueError: bad row");
        assert!(!matches!(err, JobExecutionError::Codec(_)));
    }
}
