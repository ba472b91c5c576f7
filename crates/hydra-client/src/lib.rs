//! Control plane access for hydra.
//!
//! [`SubmissionClient`] is the seam between the coordinator and a control plane.
//! Two implementations ship here:
//! - [`GrpcSubmissionClient`] speaks `hydra.v1.ControlPlane` over tonic (feature `grpc`);
//! - [`InMemoryControlPlane`] runs attempts in-process, for local mode and tests.
//!
//! [`ControlPlaneService`] serves any client as a gRPC control plane.

#[cfg(feature = "grpc")]
pub mod proto {
    tonic::include_proto!("hydra.v1");
}

mod error;
pub use error::ClientError;

mod submission;
pub use submission::{Ack, AttemptStream, SubmissionClient};

mod config;
pub use config::{ClientConfig, TransportRetryConfig};

mod retry;
pub use retry::{RetryingClient, TransportRetry};

mod ids;
pub use ids::{IdGenerator, UuidIdGenerator};

mod memory;
pub use memory::{AttemptExecutor, Behavior, InMemoryControlPlane, InMemoryControlPlaneBuilder};

#[cfg(feature = "grpc")]
mod convert;

#[cfg(feature = "grpc")]
mod grpc;
#[cfg(feature = "grpc")]
pub use grpc::GrpcSubmissionClient;

#[cfg(feature = "grpc")]
mod service;
#[cfg(feature = "grpc")]
pub use service::ControlPlaneService;

#[cfg(feature = "grpc")]
pub use proto::control_plane_server::ControlPlaneServer;

#[cfg(feature = "grpc")]
pub use tonic;
