//! Prometheus metrics for hydra jobs.
//!
//! [`PrometheusMetrics`] is a [`hydra_core::Subscribe`] implementation; register it on a
//! coordinator or `HydraClient` and every [`hydra_core::JobEvent`] updates the metrics below.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use hydra_client::InMemoryControlPlane;
//! use hydra_core::Coordinator;
//! use hydra_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let coordinator = Coordinator::new(InMemoryControlPlane::new())
//!     .with_subscriber(Arc::new(metrics.clone()));
//!
//! // Serve `metrics.encode_text()?` from your own `/metrics` handler.
//! # let _ = coordinator;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `hydra_attempts_submitted_total` - Counter
//! - `hydra_attempts_failed_total{kind}` - Counter
//! - `hydra_retries_scheduled_total` - Counter
//! - `hydra_jobs_finished_total{status}` - Counter
//! - `hydra_attempt_duration_seconds` - Histogram
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics` endpoint.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
