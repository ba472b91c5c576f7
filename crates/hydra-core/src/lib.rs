//! Job coordination for hydra.
//!
//! A [`Coordinator`] takes a validated [`hydra_model::JobSpec`], obtains one job id,
//! and drives numbered attempts against a [`hydra_client::SubmissionClient`] until one
//! succeeds or the retry budget runs out. [`HydraClient`] wires a coordinator from a
//! [`HydraConfig`] and is the usual entry point.
//!
//! Lifecycle transitions are published as [`JobEvent`]s to every registered [`Subscribe`]r.

mod backoff;
pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff, Jitter, NoBackoff};

mod events;
pub use events::{EventBus, JobEvent, Subscribe};

mod error;
pub use error::{CoreError, JobExecutionError};

mod reporter;
pub use reporter::Reporter;

mod wait;
pub use wait::{WaitMode, WaitStrategy};

mod coordinator;
pub use coordinator::{Coordinator, ExecuteOptions};

mod handle;
pub use handle::JobHandle;

mod executable;
pub use executable::{Executable, LocalCall, RemoteCall};

mod config;
pub use config::{BackoffConfig, ExecutionMode, HydraConfig};

mod client;
pub use client::{HydraClient, HydraClientBuilder};
