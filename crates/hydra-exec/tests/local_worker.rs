#![cfg(all(unix, feature = "shell"))]

use std::{sync::Arc, time::Duration};

use hydra_client::InMemoryControlPlane;
use hydra_core::{Coordinator, Executable, RemoteCall};
use hydra_exec::{FnRegistry, RouterExecutor, ShellExecutor};
use hydra_model::{FailureKind, JobKind, JobSpec, Resources, build_command};
use serde_json::Value;

fn worker(registry: Arc<FnRegistry>) -> InMemoryControlPlane {
    let router = RouterExecutor::new()
        .with_runner(Arc::new(ShellExecutor::new()))
        .with_runner(registry);
    InMemoryControlPlane::builder()
        .executor(Arc::new(router))
        .latency(Duration::from_millis(1))
        .build()
}

#[tokio::test]
async fn command_output_is_the_result() {
    let plane = worker(Arc::new(FnRegistry::new()));
    let coordinator = Coordinator::new(plane);

    let outcome = coordinator.execute(&build_command("echo hi").unwrap()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.result(), Some(&b"hi\n"[..]));
}

#[tokio::test]
async fn failing_command_is_retried_and_reports_its_exit_code() {
    let plane = worker(Arc::new(FnRegistry::new()));
    let coordinator = Coordinator::new(plane.clone());
    let spec = JobSpec::builder(JobKind::Command {
        command: "echo broken >&2; exit 2".into(),
    })
    .max_retries(1)
    .build()
    .unwrap();

    let outcome = coordinator.execute(&spec).await;

    assert_eq!(outcome.attempts(), 2);
    let error = outcome.error().unwrap();
    assert_eq!(error.kind, FailureKind::AttemptFailed);
    assert_eq!(error.exit_code, Some(2));
    assert_eq!(error.payload.as_deref(), Some(&b"broken\n"[..]));
    assert_eq!(plane.submissions().len(), 2);
}

#[tokio::test]
async fn remote_call_runs_the_registered_function() {
    let registry = Arc::new(FnRegistry::new());
    registry.register("word_count", |text: String| {
        Ok::<_, String>(text.split_whitespace().count())
    });
    let coordinator = Arc::new(Coordinator::new(worker(registry)));
    let count: RemoteCall<_, String, usize> =
        RemoteCall::new(coordinator, "word_count", Resources::default(), 0);

    assert_eq!(count.call("to be or not".to_string()).await.unwrap(), 4);
}

#[tokio::test]
async fn unknown_function_fails_without_retry() {
    let plane = worker(Arc::new(FnRegistry::new()));
    let coordinator = Arc::new(Coordinator::new(plane.clone()));
    let call: RemoteCall<_, Value, Value> =
        RemoteCall::new(coordinator, "missing", Resources::default(), 3);

    let err = call.call(Value::Null).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::InvalidSpecification);
    assert_eq!(plane.submissions().len(), 1);
}
