// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{collections::HashSet, num::NonZeroUsize, sync::Arc, time::Duration};

use chrono::TimeDelta;
use relaycommon::{DeliveryRequest, Environment};

use super::*;
use crate::{
    push::test_utils::TestPushNotificationProvider,
    settings::{DispatchMode, OverflowPolicy},
};

fn request(device_token: &str) -> DeliveryRequest {
    DeliveryRequest::new(
        device_token.to_owned(),
        Environment::Development,
        "payload".to_owned(),
    )
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap()
}

fn clients(
    provider: &TestPushNotificationProvider,
) -> Arc<PushClients<TestPushNotificationProvider>> {
    Arc::new(PushClients::new(provider.clone(), provider.clone()))
}

/// Wait until the provider saw `count` push attempts.
async fn wait_for_attempts(provider: &TestPushNotificationProvider, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while provider.attempt_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("push attempts did not arrive in time");
}

fn attempted_tokens(provider: &TestPushNotificationProvider) -> Vec<String> {
    provider
        .attempts()
        .into_iter()
        .map(|notification| notification.device_token)
        .collect()
}

#[tokio::test]
async fn reject_policy_fails_fast_when_full() {
    let capacity = 3;
    let (queue, pending) = queue(non_zero(capacity), OverflowPolicy::Reject);
    assert_eq!(queue.overflow_policy(), OverflowPolicy::Reject);

    for i in 0..capacity {
        queue.enqueue(request(&format!("token-{i}"))).await.unwrap();
    }
    assert_eq!(queue.len(), capacity);
    assert_eq!(
        queue.enqueue(request("one-too-many")).await,
        Err(EnqueueError::QueueFull)
    );

    // Nothing accepted gets lost once workers show up.
    let provider = TestPushNotificationProvider::new();
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(2));
    wait_for_attempts(&provider, capacity).await;
    assert!(!attempted_tokens(&provider).contains(&"one-too-many".to_owned()));
    assert!(queue.is_empty());

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reject_policy_turns_away_one_of_concurrent_producers() {
    let capacity = 4;
    let (queue, _pending) = queue(non_zero(capacity), OverflowPolicy::Reject);

    let producers: Vec<_> = (0..=capacity)
        .map(|i| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(request(&format!("token-{i}"))).await })
        })
        .collect();

    let mut results = Vec::new();
    for producer in producers {
        results.push(producer.await.unwrap());
    }
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), capacity);
    assert_eq!(
        results
            .iter()
            .filter(|result| **result == Err(EnqueueError::QueueFull))
            .count(),
        1
    );
    assert_eq!(queue.len(), capacity);
}

#[tokio::test]
async fn block_policy_waits_for_capacity() {
    let capacity = 2;
    let (queue, pending) = queue(non_zero(capacity), OverflowPolicy::Block);
    assert_eq!(queue.overflow_policy(), OverflowPolicy::Block);

    let producers: Vec<_> = (0..=capacity)
        .map(|i| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(request(&format!("token-{i}"))).await })
        })
        .collect();

    // One producer can't get a slot while nobody consumes.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(queue.len(), capacity);
    assert_eq!(
        producers.iter().filter(|handle| handle.is_finished()).count(),
        capacity
    );

    let provider = TestPushNotificationProvider::new();
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(1));
    for producer in producers {
        assert_eq!(producer.await.unwrap(), Ok(()));
    }
    wait_for_attempts(&provider, capacity + 1).await;

    let tokens: HashSet<String> = attempted_tokens(&provider).into_iter().collect();
    assert_eq!(tokens.len(), capacity + 1);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn single_worker_preserves_order() {
    let (queue, pending) = queue(non_zero(16), OverflowPolicy::Reject);
    let expected: Vec<String> = (0..10).map(|i| format!("token-{i}")).collect();
    for token in &expected {
        queue.enqueue(request(token)).await.unwrap();
    }

    let provider = TestPushNotificationProvider::new();
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(1));
    wait_for_attempts(&provider, expected.len()).await;
    assert_eq!(attempted_tokens(&provider), expected);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_request_is_delivered_exactly_once() {
    let provider = TestPushNotificationProvider::new();
    let (queue, pending) = queue(non_zero(8), OverflowPolicy::Block);
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(4));

    let requests: Vec<DeliveryRequest> = (0..200)
        .map(|i| request(&format!("token-{i}")))
        .collect();
    let expected: HashSet<_> = requests.iter().map(|r| r.message_id()).collect();
    for request in requests {
        queue.enqueue(request).await.unwrap();
    }
    wait_for_attempts(&provider, expected.len()).await;
    // Give stray duplicates a chance to show up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let attempts = provider.attempts();
    assert_eq!(attempts.len(), expected.len());
    let delivered: HashSet<_> = attempts.iter().map(|n| n.message_id).collect();
    assert_eq!(delivered, expected);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn worker_survives_failed_deliveries() {
    let provider = TestPushNotificationProvider::new();
    provider.fail_token("unreachable");
    provider.reject_token("unregistered", 410, "Unregistered");

    let (queue, pending) = queue(non_zero(4), OverflowPolicy::Reject);
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(1));

    for token in ["unreachable", "unregistered", "healthy"] {
        queue.enqueue(request(token)).await.unwrap();
    }
    wait_for_attempts(&provider, 3).await;
    assert_eq!(
        attempted_tokens(&provider),
        ["unreachable", "unregistered", "healthy"]
    );
    assert!(pool.has_active_workers());

    // The worker keeps serving after the failures.
    queue.enqueue(request("later")).await.unwrap();
    wait_for_attempts(&provider, 4).await;

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn requests_reach_the_client_of_their_environment() {
    let development = TestPushNotificationProvider::new();
    let production = TestPushNotificationProvider::new();
    let clients = Arc::new(PushClients::new(development.clone(), production.clone()));

    let (queue, pending) = queue(non_zero(4), OverflowPolicy::Reject);
    let pool = WorkerPool::spawn(pending, clients, non_zero(2));

    queue
        .enqueue(DeliveryRequest::new(
            "prod-token".to_owned(),
            Environment::Production,
            String::new(),
        ))
        .await
        .unwrap();
    queue.enqueue(request("dev-token")).await.unwrap();

    wait_for_attempts(&production, 1).await;
    wait_for_attempts(&development, 1).await;
    assert_eq!(attempted_tokens(&production), ["prod-token"]);
    assert_eq!(attempted_tokens(&development), ["dev-token"]);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn shutdown_closes_the_queue() {
    let provider = TestPushNotificationProvider::new();
    let (queue, pending) = queue(non_zero(4), OverflowPolicy::Block);
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(3));
    assert_eq!(pool.worker_count(), 3);

    pool.shutdown(Duration::from_secs(1)).await;

    assert!(queue.is_closed());
    assert_eq!(
        queue.enqueue(request("too-late")).await,
        Err(EnqueueError::Closed)
    );
}

#[tokio::test]
async fn synchronous_dispatch_returns_the_outcome() {
    let provider = TestPushNotificationProvider::new();
    provider.reject_token("unregistered", 410, "Unregistered");
    provider.fail_token("unreachable");

    let settings = DispatchSettings {
        mode: DispatchMode::Synchronous,
        ..Default::default()
    };
    let (dispatch, worker_pool) = Dispatch::start(&settings, clients(&provider));
    assert!(worker_pool.is_none());
    assert_eq!(dispatch.mode(), DispatchMode::Synchronous);

    let accepted = request("healthy");
    let message_id = accepted.message_id().to_string();
    match dispatch.submit(accepted).await.unwrap() {
        Submission::Delivered(outcome) => {
            assert!(outcome.accepted);
            assert_eq!(outcome.downstream_id, Some(message_id));
        }
        Submission::Queued => panic!("synchronous dispatch queued a request"),
    }

    match dispatch.submit(request("unregistered")).await.unwrap() {
        Submission::Delivered(outcome) => {
            assert!(!outcome.accepted);
            assert_eq!(outcome.status_code, 410);
            assert_eq!(outcome.reason.as_deref(), Some("Unregistered"));
        }
        Submission::Queued => panic!("synchronous dispatch queued a request"),
    }

    assert!(matches!(
        dispatch.submit(request("unreachable")).await,
        Err(SubmitError::Push(PushNotificationError::NetworkError(_)))
    ));
}

#[tokio::test]
async fn queued_dispatch_answers_before_delivery() {
    let provider = TestPushNotificationProvider::new();
    let settings = DispatchSettings {
        mode: DispatchMode::Queued,
        overflow: OverflowPolicy::Reject,
        workers: non_zero(2),
        queue_capacity: non_zero(4),
    };
    let (dispatch, worker_pool) = Dispatch::start(&settings, clients(&provider));
    let worker_pool = worker_pool.expect("queued dispatch spawns workers");
    assert_eq!(worker_pool.worker_count(), 2);

    assert_eq!(
        dispatch.submit(request("healthy")).await,
        Ok(Submission::Queued)
    );
    wait_for_attempts(&provider, 1).await;

    worker_pool.shutdown(Duration::from_secs(1)).await;
    assert_eq!(
        dispatch.submit(request("too-late")).await,
        Err(SubmitError::Enqueue(EnqueueError::Closed))
    );
}

#[tokio::test]
async fn expiration_counts_from_receipt_not_from_dequeue() {
    let (queue, pending) = queue(non_zero(4), OverflowPolicy::Reject);
    let request = request("waiting").with_ttl_seconds(Some(1));
    let received_at = request.received_at();
    queue.enqueue(request).await.unwrap();

    // The request sits in the backlog longer than its TTL.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let provider = TestPushNotificationProvider::new();
    let pool = WorkerPool::spawn(pending, clients(&provider), non_zero(1));
    wait_for_attempts(&provider, 1).await;

    let notification = &provider.attempts()[0];
    assert_eq!(
        notification.expiration,
        Some(received_at + TimeDelta::seconds(1))
    );

    pool.shutdown(Duration::from_secs(1)).await;
}
