use std::sync::Arc;

use hydra_client::{IdGenerator, InMemoryControlPlane, SubmissionClient, UuidIdGenerator};
use hydra_model::{
    FunctionCall, JobDefaults, JobKind, JobOutcome, JobSpec, JobSpecBuilder, Resources,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::{
    backoff::Backoff,
    config::{ExecutionMode, HydraConfig},
    coordinator::{Coordinator, ExecuteOptions},
    error::CoreError,
    events::{EventBus, Subscribe},
    executable::{Executable, LocalCall, RemoteCall},
    handle::JobHandle,
};

type SharedClient = Arc<dyn SubmissionClient>;

/// Composition root: one explicit client object per caller, no global state.
///
/// Owns the coordinator and the spec defaults derived from [`HydraConfig`].
pub struct HydraClient {
    config: HydraConfig,
    defaults: JobDefaults,
    coordinator: Arc<Coordinator<SharedClient>>,
}

pub struct HydraClientBuilder {
    config: HydraConfig,
    client: Option<SharedClient>,
    backoff: Option<Arc<dyn Backoff>>,
    ids: Option<Arc<dyn IdGenerator>>,
    events: EventBus,
}

impl HydraClientBuilder {
    /// Use `client` instead of the gRPC transport built from the config.
    pub fn submission_client(mut self, client: SharedClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Overrides `config.backoff`.
    pub fn backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Offline id generator; implies `local_id_fallback`.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.events.push(subscriber);
        self
    }

    /// Validate the config and assemble the client.
    ///
    /// Without an explicit submission client this opens a lazy gRPC channel,
    /// which needs a running Tokio runtime.
    pub fn build(self) -> Result<HydraClient, CoreError> {
        self.config.validate()?;
        let defaults = self.config.defaults()?;

        let client = match self.client {
            Some(client) => client,
            None => default_transport(&self.config)?,
        };

        let ids = match self.ids {
            Some(ids) => Some(ids),
            None if self.config.local_id_fallback => {
                Some(Arc::new(UuidIdGenerator::local()) as Arc<dyn IdGenerator>)
            }
            None => None,
        };

        let mut coordinator = Coordinator::new(client)
            .with_backoff(self.backoff.unwrap_or_else(|| self.config.backoff.build()))
            .with_wait(self.config.wait_strategy())
            .with_attempt_timeout(self.config.attempt_timeout())
            .with_events(self.events);
        if let Some(ids) = ids {
            coordinator = coordinator.with_id_fallback(ids);
        }

        info!(
            mode = ?self.config.mode,
            address = %self.config.control_plane_address,
            "hydra client ready"
        );
        Ok(HydraClient {
            config: self.config,
            defaults,
            coordinator: Arc::new(coordinator),
        })
    }
}

#[cfg(feature = "grpc")]
fn default_transport(config: &HydraConfig) -> Result<SharedClient, CoreError> {
    use hydra_client::{GrpcSubmissionClient, RetryingClient};

    let client_cfg = config.client_config();
    let grpc = GrpcSubmissionClient::connect_lazy(&client_cfg)?;
    debug!(address = %client_cfg.address, "using grpc control plane");
    Ok(Arc::new(RetryingClient::new(grpc, client_cfg.transport_retry.into())))
}

#[cfg(not(feature = "grpc"))]
fn default_transport(_config: &HydraConfig) -> Result<SharedClient, CoreError> {
    debug!("grpc transport disabled");
    Err(CoreError::InvalidConfig(
        "no submission client configured and the grpc transport is disabled".into(),
    ))
}

impl HydraClient {
    pub fn builder(config: HydraConfig) -> HydraClientBuilder {
        HydraClientBuilder {
            config,
            client: None,
            backoff: None,
            ids: None,
            events: EventBus::new(),
        }
    }

    /// gRPC-backed client for `config.control_plane_address`.
    #[cfg(feature = "grpc")]
    pub fn connect_lazy(config: HydraConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    /// Client running every job on an in-process control plane.
    pub fn in_memory(config: HydraConfig, plane: InMemoryControlPlane) -> Result<Self, CoreError> {
        Self::builder(config)
            .submission_client(Arc::new(plane))
            .build()
    }

    pub fn config(&self) -> &HydraConfig {
        &self.config
    }

    pub fn defaults(&self) -> &JobDefaults {
        &self.defaults
    }

    pub fn coordinator(&self) -> &Arc<Coordinator<SharedClient>> {
        &self.coordinator
    }

    /// Builder for a COMMAND spec seeded with the configured defaults.
    pub fn command(&self, command: impl Into<String>) -> JobSpecBuilder {
        JobSpecBuilder::command(command).defaults(self.defaults.clone())
    }

    /// Builder for a FUNCTION spec seeded with the configured defaults.
    pub fn function(&self, call: FunctionCall) -> JobSpecBuilder {
        JobSpecBuilder::function(call).defaults(self.defaults.clone())
    }

    /// Build a spec from `kind` plus optional overrides and run it to completion.
    pub async fn submit_job(
        &self,
        kind: JobKind,
        resources: Option<Resources>,
        max_retries: Option<u32>,
    ) -> Result<JobOutcome, CoreError> {
        let mut builder = JobSpecBuilder::new(kind).defaults(self.defaults.clone());
        if let Some(resources) = resources {
            builder = builder.resources(resources);
        }
        if let Some(max_retries) = max_retries {
            builder = builder.max_retries(max_retries);
        }
        let spec = builder.build()?;
        Ok(self.submit(&spec).await)
    }

    pub async fn submit(&self, spec: &JobSpec) -> JobOutcome {
        self.coordinator.execute(spec).await
    }

    pub async fn submit_with(&self, spec: &JobSpec, opts: ExecuteOptions) -> JobOutcome {
        self.coordinator.execute_with(spec, opts).await
    }

    /// Run `spec` on a background task.
    pub fn spawn(&self, spec: JobSpec) -> JobHandle {
        self.spawn_with(spec, ExecuteOptions::default())
    }

    pub fn spawn_with(&self, spec: JobSpec, opts: ExecuteOptions) -> JobHandle {
        JobHandle::spawn(Arc::clone(&self.coordinator), spec, opts)
    }

    /// Wrap `func` as an executable unit with the default resources and retries.
    pub fn executable<I, O, F>(
        &self,
        name: &str,
        func: F,
    ) -> Result<Box<dyn Executable<I, O>>, CoreError>
    where
        I: Serialize + Send + Sync + 'static,
        O: DeserializeOwned + Send + 'static,
        F: Fn(I) -> Result<O, String> + Send + Sync + 'static,
    {
        let resources = Resources::new(self.defaults.cpu, self.defaults.memory)?;
        Ok(self.executable_with(name, resources, self.defaults.max_retries, func))
    }

    /// Wrap `func` as an executable unit; `config.mode` decides where calls run.
    ///
    /// In remote mode `func` is not called here: workers resolve `name` to their own copy.
    pub fn executable_with<I, O, F>(
        &self,
        name: &str,
        resources: Resources,
        max_retries: u32,
        func: F,
    ) -> Box<dyn Executable<I, O>>
    where
        I: Serialize + Send + Sync + 'static,
        O: DeserializeOwned + Send + 'static,
        F: Fn(I) -> Result<O, String> + Send + Sync + 'static,
    {
        match self.config.mode {
            ExecutionMode::Local => Box::new(LocalCall::new(name, func)),
            ExecutionMode::Remote => Box::new(RemoteCall::new(
                Arc::clone(&self.coordinator),
                name,
                resources,
                max_retries,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_client::Behavior;
    use hydra_model::{MemorySize, RemoteError};

    #[tokio::test]
    async fn submit_job_applies_defaults_and_overrides() {
        let plane = InMemoryControlPlane::new();
        let config = HydraConfig {
            cpu: 2,
            memory: "1GiB".into(),
            ..Default::default()
        };
        let client = HydraClient::in_memory(config, plane).unwrap();

        let spec = client.command("echo hi").build().unwrap();
        assert_eq!(spec.resources().cpu(), 2);
        assert_eq!(spec.resources().memory(), MemorySize::parse("1GiB").unwrap());

        let outcome = client
            .submit_job(
                JobKind::Command {
                    command: "echo hi".into(),
                },
                None,
                Some(0),
            )
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 1);
    }

    #[tokio::test]
    async fn invalid_spec_surfaces_before_submission() {
        let plane = InMemoryControlPlane::new();
        let client = HydraClient::in_memory(HydraConfig::default(), plane.clone()).unwrap();

        let err = client
            .submit_job(JobKind::Command { command: " ".into() }, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSpecification(_)));
        assert!(plane.issued_ids().is_empty());
    }

    #[tokio::test]
    async fn mode_selects_the_executable() {
        let plane = InMemoryControlPlane::builder()
            .default_behavior(Behavior::Fail(RemoteError::attempt_failed("remote says no")))
            .latency(std::time::Duration::from_millis(1))
            .build();

        let local = HydraClient::in_memory(
            HydraConfig {
                mode: ExecutionMode::Local,
                ..Default::default()
            },
            plane.clone(),
        )
        .unwrap();
        let double = local.executable("double", |x: u32| Ok::<_, String>(x * 2)).unwrap();
        assert_eq!(double.call(21).await.unwrap(), 42);
        assert!(plane.submissions().is_empty());

        let remote = HydraClient::in_memory(
            HydraConfig {
                retries: 0,
                ..Default::default()
            },
            plane.clone(),
        )
        .unwrap();
        let double = remote.executable("double", |x: u32| Ok::<_, String>(x * 2)).unwrap();
        let err = double.call(21).await.unwrap_err();
        assert_eq!(err.to_string(), "remote says no");
        assert_eq!(plane.submissions().len(), 1);
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = HydraConfig {
            memory: "0MB".into(),
            ..Default::default()
        };
        let result = HydraClient::in_memory(config, InMemoryControlPlane::new());
        assert!(result.is_err());
    }
}
