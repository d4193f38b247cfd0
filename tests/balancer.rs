//! Round-robin selection over health-checked backends.

use std::time::Duration;

use balancers::{Balancer, HealthState, RoundRobin};

mod common;

use common::{closed_port_url, health_check, MockBackend};

fn picks(lb: &RoundRobin, n: usize) -> Vec<String> {
    (0..n)
        .map(|_| lb.get().unwrap().target().to_string())
        .collect()
}

#[tokio::test]
async fn test_unreachable_backend_is_skipped() {
    let a = MockBackend::start(200).await;
    let b = closed_port_url();

    let lb = RoundRobin::from_urls([a.url(), b], &health_check(Duration::from_secs(30)))
        .await
        .unwrap();

    let a_target = lb.connections()[0].target().to_string();
    assert_eq!(picks(&lb, 3), vec![a_target.clone(), a_target.clone(), a_target]);

    let states: Vec<_> = lb.snapshots().into_iter().map(|s| s.state).collect();
    assert_eq!(states, vec![HealthState::Healthy, HealthState::Broken]);
}

#[tokio::test]
async fn test_healthy_backends_rotate_in_order() {
    let a = MockBackend::start(200).await;
    let b = MockBackend::start(200).await;
    let c = MockBackend::start(200).await;

    let lb = RoundRobin::from_urls(
        [a.url(), b.url(), c.url()],
        &health_check(Duration::from_secs(30)),
    )
    .await
    .unwrap();

    let targets: Vec<_> = lb
        .connections()
        .iter()
        .map(|c| c.target().to_string())
        .collect();
    assert_eq!(
        picks(&lb, 5),
        vec![
            targets[0].clone(),
            targets[1].clone(),
            targets[2].clone(),
            targets[0].clone(),
            targets[1].clone(),
        ]
    );
}

#[tokio::test]
async fn test_no_healthy_backend() {
    let lb = RoundRobin::from_urls(
        [closed_port_url(), closed_port_url()],
        &health_check(Duration::from_secs(30)),
    )
    .await
    .unwrap();

    assert_eq!(lb.len(), 2);
    assert!(lb.get().unwrap_err().is_no_connection());
}

#[tokio::test]
async fn test_selection_follows_heartbeat() {
    let a = MockBackend::start(200).await;
    let b = MockBackend::start(200).await;

    let lb = RoundRobin::from_urls([a.url(), b.url()], &health_check(Duration::from_millis(50)))
        .await
        .unwrap();
    let b_target = lb.connections()[1].target().to_string();

    a.set_status(500);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(picks(&lb, 3), vec![b_target.clone(), b_target.clone(), b_target]);

    a.set_status(200);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(lb.connections().iter().all(|c| c.is_healthy()));
}

#[tokio::test]
async fn test_invalid_backend_rejects_batch() {
    let a = MockBackend::start(200).await;

    let err = RoundRobin::from_urls([a.url().as_str(), "not a url"], &health_check(Duration::from_secs(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, balancers::Error::InvalidTarget { .. }));
    // Parsing fails before any connection probes.
    assert_eq!(a.probes(), 0);
}
