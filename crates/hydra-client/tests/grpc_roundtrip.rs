use std::{net::SocketAddr, time::Duration};

use hydra_client::{
    Behavior, ClientConfig, ClientError, ControlPlaneService, GrpcSubmissionClient,
    InMemoryControlPlane, SubmissionClient, tonic::transport::Server,
};
use hydra_model::{AttemptState, FailureKind, JobId, JobSpec, Resources, build_command};
use tokio::net::TcpListener;
use tokio_stream::{StreamExt, wrappers::TcpListenerStream};

async fn serve(plane: InMemoryControlPlane) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        Server::builder()
            .add_service(ControlPlaneService::new(plane).into_server())
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

async fn client_for(addr: SocketAddr) -> GrpcSubmissionClient {
    GrpcSubmissionClient::connect(&ClientConfig::new(format!("http://{addr}")))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submitted_attempt_streams_to_success() {
    let plane = InMemoryControlPlane::builder()
        .default_behavior(Behavior::Succeed(Some(b"\"Hello Dist Sys\"".to_vec())))
        .build();
    let client = client_for(serve(plane.clone()).await).await;

    let job_id = client.issue_id().await.unwrap();
    assert!(job_id.as_str().starts_with("job-"));

    let spec = build_command("echo 'Hello Dist Sys'").unwrap();
    let ack = client.submit(&job_id, &spec, 1).await.unwrap();
    assert!(ack.accepted && !ack.duplicate);

    let mut events = client.stream(&job_id).await.unwrap();
    let last = loop {
        let attempt = events.next().await.unwrap().unwrap();
        if attempt.is_terminal() {
            break attempt;
        }
    };

    assert_eq!(last.state, AttemptState::Succeeded);
    assert_eq!(last.result.as_deref(), Some(&b"\"Hello Dist Sys\""[..]));
    assert!(last.ended_at.unwrap() >= last.started_at.unwrap());
    assert_eq!(plane.submissions(), vec![(job_id, 1)]);

    let rest = tokio::time::timeout(Duration::from_millis(500), events.next()).await;
    assert!(matches!(rest, Ok(None)), "stream stayed open: {rest:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_attempt_is_stopped_across_the_wire() {
    let plane = InMemoryControlPlane::builder()
        .on_attempt(1, Behavior::Hang)
        .build();
    let client = client_for(serve(plane.clone()).await).await;
    let job_id = client.issue_id().await.unwrap();

    let spec = JobSpec::builder(build_command("sleep 600").unwrap().kind().clone())
        .max_retries(1)
        .build()
        .unwrap();
    client.submit(&job_id, &spec, 1).await.unwrap();

    assert!(client.cancel_attempt(&job_id, 1).await.unwrap().accepted);
    let state = client.poll(&job_id, 1).await.unwrap();
    assert_eq!(state.state, AttemptState::Failed);
    assert!(client.submit(&job_id, &spec, 2).await.unwrap().accepted);

    let err = client.cancel_attempt(&job_id, 0).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)), "unexpected error: {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_and_rejected_submissions_cross_the_wire() {
    let plane = InMemoryControlPlane::builder()
        .capacity(Resources::parse(2, "1GB").unwrap())
        .build();
    let client = client_for(serve(plane.clone()).await).await;
    let job_id = client.issue_id().await.unwrap();

    let spec = build_command("echo hi").unwrap();
    client.submit(&job_id, &spec, 1).await.unwrap();
    let ack = client.submit(&job_id, &spec, 1).await.unwrap();
    assert!(ack.duplicate);
    assert_eq!(plane.submission_count(&job_id), 1);

    let big = JobSpec::builder(spec.kind().clone()).cpu(16).build().unwrap();
    let err = client.submit(&job_id, &big, 2).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)), "unexpected error: {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_and_lookup_errors_cross_the_wire() {
    let plane = InMemoryControlPlane::builder()
        .default_behavior(Behavior::Hang)
        .build();
    let client = client_for(serve(plane.clone()).await).await;
    let job_id = client.issue_id().await.unwrap();

    let spec = build_command("sleep 600").unwrap();
    client.submit(&job_id, &spec, 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(client.cancel(&job_id).await.unwrap().accepted);
    let state = client.poll(&job_id, 1).await.unwrap();
    assert_eq!(state.state, AttemptState::Failed);
    assert_eq!(state.error.unwrap().kind, FailureKind::Cancelled);

    let err = client.poll(&JobId::from("job-unknown"), 1).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plane_outage_surfaces_as_unavailable() {
    let plane = InMemoryControlPlane::new();
    let client = client_for(serve(plane.clone()).await).await;

    plane.set_available(false);
    let err = client.issue_id().await.unwrap_err();
    assert!(err.is_transient(), "unexpected error: {err:?}");
}
