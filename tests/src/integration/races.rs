//! # Concurrency and Races
//!
//! Exactly-once completion under contention:
//!
//! - many concurrent requests each get their own answer
//! - router and sweeper racing on one id produce a single transition
//! - expiry lands between the deadline and one sweep interval after it

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use qb_request_response::{
        CancellationToken, CorrelationEvent, Outcome, PendingRequestTable, RequestResponseApi,
        ResponseEnvelope, ResponseRouter, RouteOutcome, TimeoutSweeper, TracingSink,
    };
    use rand::Rng;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_each_resolve_once() {
        let mut harness = Harness::standard();
        harness.serve::<GetOrder, _>(ORDERS_TOPIC, OrderHandler);

        let mut tasks = Vec::new();
        for id in 1..=100u64 {
            let requests = Arc::clone(&harness.requests);
            tasks.push(tokio::spawn(async move {
                requests
                    .send(GetOrder { id }, CancellationToken::new())
                    .await
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            let order = task.await.unwrap().unwrap();
            assert_eq!(order.total_cents, order.id * 100);
            assert!(seen.insert(order.id));
        }

        assert_eq!(seen.len(), 100);
        assert_eq!(harness.requests.pending_count(), 0);

        let sent: HashSet<_> = harness
            .sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                CorrelationEvent::RequestSent { correlation_id, .. } => Some(correlation_id),
                _ => None,
            })
            .collect();
        assert_eq!(sent.len(), 100);
        harness.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_router_and_sweeper_race_single_transition() {
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let table = Arc::new(PendingRequestTable::new());
            let router = ResponseRouter::new(table.clone(), Arc::new(TracingSink));
            let sweeper = TimeoutSweeper::new(table.clone(), Arc::new(TracingSink), Duration::from_secs(1));

            let waiter = table.register("a", "b", Instant::now());
            let id = waiter.correlation_id;
            let stagger = rng.gen_range(0..50u64);

            let routed = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_micros(stagger)).await;
                router.on_response_received(ResponseEnvelope::payload(id, serde_json::json!(1)))
            });
            let swept = tokio::spawn(async move { sweeper.sweep_once() });

            let routed = routed.await.unwrap();
            let swept = swept.await.unwrap();
            let completion = waiter.receiver.await.unwrap();

            match completion.outcome {
                Outcome::Resolved(_) => {
                    assert!(matches!(routed, RouteOutcome::Delivered(_)));
                    assert_eq!(swept, 0);
                }
                Outcome::Expired => {
                    assert!(matches!(routed, RouteOutcome::Dropped(_)));
                    assert_eq!(swept, 1);
                }
                other => panic!("unexpected outcome {other:?}"),
            }

            let stats = table.stats();
            assert_eq!(stats.total_completed(), 1);
            assert_eq!(table.pending_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_within_one_sweep_interval() {
        let table = Arc::new(PendingRequestTable::new());
        let shutdown = CancellationToken::new();
        let handle = TimeoutSweeper::new(table.clone(), Arc::new(TracingSink), Duration::from_millis(100))
            .spawn(shutdown.clone());

        let started = Instant::now();
        let waiter = table.register("a", "b", started + Duration::from_millis(250));
        let completion = waiter.receiver.await.unwrap();

        assert_eq!(completion.outcome, Outcome::Expired);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed <= Duration::from_millis(350));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_beats_slow_sweep() {
        let mut config = standard_config();
        config.sweep_interval = Duration::from_secs(60);
        let mut harness = Harness::new(config);
        harness.serve::<SlowPing, _>(SLOW_TOPIC, SlowHandler);

        let started = Instant::now();
        let err = harness
            .requests
            .send(SlowPing { delay_ms: 5_000 }, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(harness.requests.pending_count(), 0);
        harness.shutdown().await;
    }
}
