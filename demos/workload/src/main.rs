use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use anyhow::Context;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hydra_client::{ControlPlaneService, InMemoryControlPlane, tonic::transport::Server};
use hydra_core::{BackoffConfig, Executable, HydraClient, HydraConfig, Jitter};
use hydra_exec::{FnRegistry, RouterExecutor, ShellExecutor};
use hydra_model::{JobKind, Resources};
use hydra_observe::{Journal, LoggerConfig, logger_init};
use hydra_prometheus::PrometheusMetrics;

/// Fails the first two calls to show the retry loop at work.
fn analyze_data(calls: &AtomicU32, path: String) -> Result<Value, String> {
    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
        return Err(format!("IOError: could not read {path}"));
    }
    Ok(json!({ "status": "success", "path": path, "rows": 10_000 }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    logger_init(&LoggerConfig::from_env()?)?;
    info!("logger initialized");

    // 2) Local worker: shell commands + registered functions
    let calls = Arc::new(AtomicU32::new(0));
    let registry = Arc::new(FnRegistry::new());
    {
        let calls = Arc::clone(&calls);
        registry.register("analyze_data", move |path: String| analyze_data(&calls, path));
    }
    let router = RouterExecutor::new()
        .with_runner(Arc::new(ShellExecutor::new()))
        .with_runner(registry);
    let plane = InMemoryControlPlane::builder()
        .executor(Arc::new(router))
        .build();

    // 3) Serve it as a gRPC control plane on an ephemeral port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(
            Server::builder()
                .add_service(ControlPlaneService::new(plane.clone()).into_server())
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    shutdown.cancelled().await
                }),
        )
    };
    info!(%addr, "control plane listening");

    // 4) Client
    let mut config = HydraConfig::from_env()?;
    config.control_plane_address = format!("http://{addr}");
    config.backoff = BackoffConfig::Exponential {
        first_ms: 100,
        max_ms: 2_000,
        factor: 2.0,
        jitter: Jitter::Equal,
    };
    let metrics = PrometheusMetrics::new()?;
    let client = HydraClient::builder(config)
        .subscriber(Arc::new(Journal::new()))
        .subscriber(Arc::new(metrics.clone()))
        .build()?;

    // 5) Command job
    let outcome = client
        .submit_job(
            JobKind::Command {
                command: "echo hi".into(),
            },
            None,
            Some(0),
        )
        .await?;
    let stdout = outcome
        .result()
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    info!(
        job_id = %outcome.job_id(),
        status = outcome.status().as_str(),
        attempts = outcome.attempts(),
        stdout = stdout.trim_end(),
        "command job finished"
    );

    // 6) Function job
    let analyze = client.executable_with(
        "analyze_data",
        Resources::parse(4, "4GB")?,
        5,
        move |path: String| analyze_data(&calls, path),
    );
    match analyze.call("s3://bucket/input.csv".to_string()).await {
        Ok(report) => info!(%report, "function job finished"),
        Err(err) => warn!(kind = %err.kind(), error = %err, "function job failed"),
    }

    // 7) Metrics + shutdown
    println!("{}", metrics.encode_text()?);

    shutdown.cancel();
    server
        .await
        .context("control plane task panicked")?
        .context("control plane server failed")?;
    info!("done");
    Ok(())
}
