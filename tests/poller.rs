mod support;

use kubeobs::k8s::observe::conditions::field_is_true;
use kubeobs::k8s::observe::{
    ClientError, ResourceIdentity, ResourceKind, WaitError, WaitOutcome, WaitSpec, poll_until,
};
use std::sync::Arc;
use std::time::Duration;
use support::{FetchStep, ScriptedClient, connection_refused, deployment, forbidden};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

fn web() -> ResourceIdentity {
    ResourceIdentity::new(ResourceKind::deployments(), Some("default"), "web")
}

fn available_within(interval: u64, timeout: u64) -> WaitSpec {
    WaitSpec::new(web(), field_is_true("/status/available"))
        .poll_interval(Duration::from_secs(interval))
        .timeout(Duration::from_secs(timeout))
}

fn secs(offsets: &[u64]) -> Vec<Duration> {
    offsets.iter().copied().map(Duration::from_secs).collect()
}

#[tokio::test(start_paused = true)]
async fn test_ready_on_fifth_poll() {
    let client = ScriptedClient::new().with_fetches([
        FetchStep::Found(deployment("web", false)),
        FetchStep::Found(deployment("web", false)),
        FetchStep::Found(deployment("web", false)),
        FetchStep::Found(deployment("web", false)),
        FetchStep::Found(deployment("web", true)),
    ]);

    let outcome = poll_until(&client, available_within(2, 10), &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        WaitOutcome::Satisfied {
            snapshot,
            polls,
            elapsed,
        } => {
            assert_eq!(polls, 5);
            assert_eq!(elapsed, Duration::from_secs(8));
            assert_eq!(snapshot.name(), Some("web"));
        }
        other => panic!("expected Satisfied, got {other:?}"),
    }
    assert_eq!(client.fetch_calls(), secs(&[0, 2, 4, 6, 8]));
}

#[tokio::test(start_paused = true)]
async fn test_satisfied_on_first_poll_returns_without_sleeping() {
    let started = Instant::now();
    let client = ScriptedClient::new().with_fetches([FetchStep::Found(deployment("web", true))]);

    let outcome = poll_until(&client, available_within(2, 10), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, WaitOutcome::Satisfied { polls: 1, .. }));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_twice_then_ready() {
    let client = ScriptedClient::new().with_fetches([
        FetchStep::Missing,
        FetchStep::Missing,
        FetchStep::Found(deployment("web", true)),
    ]);

    let outcome = poll_until(&client, available_within(2, 10), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_satisfied());
    assert_eq!(client.fetch_calls(), secs(&[0, 2, 4]));
}

#[tokio::test(start_paused = true)]
async fn test_never_true_ends_exactly_at_timeout() {
    let started = Instant::now();
    let client = ScriptedClient::new().with_fetches([FetchStep::Found(deployment("web", false))]);

    let outcome = poll_until(&client, available_within(2, 9), &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        WaitOutcome::TimedOut { polls, elapsed } => {
            assert_eq!(polls, 5);
            assert_eq!(elapsed, Duration::from_secs(9));
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert_eq!(started.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_fetch_error_fails_immediately() {
    let started = Instant::now();
    let client = ScriptedClient::new().with_fetches([FetchStep::Fail(forbidden())]);

    let result = poll_until(&client, available_within(2, 10), &CancellationToken::new()).await;

    match result {
        Err(WaitError::Fetch { identity, source }) => {
            assert_eq!(identity, web());
            assert!(matches!(source, ClientError::Api { code: 403, .. }));
        }
        other => panic!("expected a fetch error, got {other:?}"),
    }
    assert_eq!(client.fetch_calls().len(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_connection_error_also_ends_the_wait() {
    let client = ScriptedClient::new().with_fetches([
        FetchStep::Found(deployment("web", false)),
        FetchStep::Fail(connection_refused()),
    ]);

    let result = poll_until(&client, available_within(2, 10), &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(WaitError::Fetch {
            source: ClientError::Connection(_),
            ..
        })
    ));
    assert_eq!(client.fetch_calls(), secs(&[0, 2]));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_fetch_is_bounded_by_the_deadline() {
    let started = Instant::now();
    let client = ScriptedClient::new().with_fetches([FetchStep::Hang]);

    let outcome = poll_until(&client, available_within(2, 5), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, WaitOutcome::TimedOut { polls: 1, .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_ends_the_wait() {
    let client = Arc::new(
        ScriptedClient::new().with_fetches([FetchStep::Found(deployment("web", false))]),
    );
    let cancel = CancellationToken::new();

    let wait = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            poll_until(client.as_ref(), available_within(2, 60), &cancel).await
        })
    };
    sleep(Duration::from_secs(3)).await;
    cancel.cancel();

    let outcome = wait.await.unwrap().unwrap();
    assert!(matches!(outcome, WaitOutcome::Cancelled { polls: 2 }));
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_timeout_waits_without_panicking() {
    let client = ScriptedClient::new().with_fetches([
        FetchStep::Found(deployment("web", false)),
        FetchStep::Found(deployment("web", true)),
    ]);
    let spec = WaitSpec::new(web(), field_is_true("/status/available"))
        .poll_interval(Duration::from_secs(2))
        .timeout(Duration::MAX);

    let outcome = poll_until(&client, spec, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, WaitOutcome::Satisfied { polls: 2, .. }));
    assert_eq!(client.fetch_calls(), secs(&[0, 2]));
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_interval_is_clipped_to_the_deadline() {
    let started = Instant::now();
    let client = ScriptedClient::new().with_fetches([FetchStep::Found(deployment("web", false))]);
    let spec = WaitSpec::new(web(), field_is_true("/status/available"))
        .poll_interval(Duration::MAX)
        .timeout(Duration::from_secs(10));

    let outcome = poll_until(&client, spec, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, WaitOutcome::TimedOut { polls: 1, .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}
