//! # Request/Response Flows
//!
//! End-to-end outcomes of `send` over the shared bus with real responders:
//!
//! 1. **Resolved**: responder answers before the deadline
//! 2. **Faulted**: responder reports a handler error, or the wrong type
//! 3. **Timeout**: nobody answers in time; late answers become orphans
//! 4. **Cancelled**: caller withdraws; late answers become orphans
//! 5. **Publish failure / misconfiguration**: nothing is left pending

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use qb_request_response::{
        CancellationToken, ConfigurationError, FaultDetail, OrphanReason, RequestError,
        RequestMessage, RequestResponseApi, RequestResponseConfig, SendOptions, SystemTimeSource,
        TimeSource, TransportError,
    };
    use shared_bus::{BusMessage, MessageFilter, MessagePublisher};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::time::Instant;

    // =========================================================================
    // RESOLVED / FAULTED
    // =========================================================================

    #[tokio::test]
    async fn test_request_resolves_over_bus() {
        let mut harness = Harness::standard();
        harness.serve::<GetOrder, _>(ORDERS_TOPIC, OrderHandler);

        let order = harness
            .requests
            .send(GetOrder { id: 12 }, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            order,
            Order {
                id: 12,
                total_cents: 1200
            }
        );
        assert_eq!(harness.requests.pending_count(), 0);
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_fault_surfaces_as_handler_faulted() {
        let mut harness = Harness::standard();
        harness.serve::<GetOrder, _>(ORDERS_TOPIC, OrderHandler);

        let err = harness
            .requests
            .send(GetOrder { id: 0 }, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            RequestError::HandlerFaulted(fault) => {
                assert_eq!(fault.code, 404);
                assert_eq!(fault.message, "order not found");
                assert_eq!(fault.data, Some(serde_json::json!({ "id": 0 })));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(harness.requests.pending_count(), 0);
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_wrong_response_type_is_faulted() {
        let harness = Harness::standard();

        // Hand-rolled responder that answers with the wrong type tag
        let mut requests = harness.bus.subscribe(MessageFilter::requests_on(ORDERS_TOPIC));
        let bus = harness.bus.clone();
        tokio::spawn(async move {
            if let Some(BusMessage::Request {
                correlation_id,
                reply_to,
                ..
            }) = requests.recv().await
            {
                let _ = bus
                    .publish(BusMessage::Response {
                        correlation_id,
                        topic: reply_to,
                        response_type: Some("orders.Invoice".into()),
                        headers: BTreeMap::new(),
                        result: Ok(serde_json::json!({"id": 1, "total_cents": 1})),
                    })
                    .await;
            }
        });

        let err = harness
            .requests
            .send(GetOrder { id: 1 }, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::HandlerFaulted(ref fault) if fault.code == FaultDetail::RESPONSE_TYPE_MISMATCH
        ));
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_carries_reply_to_expiry_and_headers() {
        let harness = Harness::standard();
        let mut requests = harness.bus.subscribe(MessageFilter::requests_on(ORDERS_TOPIC));

        let sender = harness.requests.clone();
        let send = tokio::spawn(async move {
            sender
                .send_with(
                    GetOrder { id: 3 },
                    SendOptions::new()
                        .timeout(Duration::from_millis(300))
                        .header("tenant", "acme"),
                )
                .await
        });

        let Some(BusMessage::Request {
            reply_to,
            request_type,
            expires_at_ms,
            headers,
            payload,
            ..
        }) = requests.recv().await
        else {
            panic!("expected a request");
        };

        let now_ms = SystemTimeSource.now_millis();
        assert_eq!(reply_to, "responses");
        assert_eq!(request_type, GetOrder::request_type());
        assert!(expires_at_ms > now_ms && expires_at_ms <= now_ms + 300);
        assert_eq!(headers.get("tenant").map(String::as_str), Some("acme"));
        assert_eq!(payload, serde_json::json!({ "id": 3 }));

        // Nobody answers
        assert!(send.await.unwrap().unwrap_err().is_timeout());
        harness.shutdown().await;
    }

    // =========================================================================
    // TIMEOUT / CANCELLATION
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_slow_responder_times_out_and_late_reply_is_orphaned() {
        let mut harness = Harness::standard();
        harness.serve::<SlowPing, _>(SLOW_TOPIC, SlowHandler);

        let started = Instant::now();
        let err = harness
            .requests
            .send(SlowPing { delay_ms: 2_000 }, CancellationToken::new())
            .await
            .unwrap_err();

        // Configured type-level timeout
        let elapsed = started.elapsed();
        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed <= Duration::from_millis(600));
        assert_eq!(harness.requests.pending_count(), 0);

        // Let the handler finish and publish its late reply
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(harness.sink.orphans(OrphanReason::Unknown).len(), 1);
        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_timeout_overrides_type_default() {
        let mut harness = Harness::standard();
        harness.serve::<SlowPing, _>(SLOW_TOPIC, SlowHandler);

        // Type default is 500ms; the reply takes 800ms
        let reply = harness
            .requests
            .send_with_timeout(
                SlowPing { delay_ms: 800 },
                Duration::from_secs(1),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(reply, "pong");
        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_request() {
        let mut harness = Harness::standard();
        harness.serve::<SlowPing, _>(SLOW_TOPIC, SlowHandler);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = harness
            .requests
            .send(SlowPing { delay_ms: 300 }, token)
            .await
            .unwrap_err();

        let RequestError::Cancelled {
            correlation_id: Some(id),
        } = err
        else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(harness.requests.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.sink.orphans(OrphanReason::Unknown), vec![id.to_string()]);
        harness.shutdown().await;
    }

    // =========================================================================
    // FAILURES BEFORE WAITING
    // =========================================================================

    #[tokio::test]
    async fn test_no_responder_is_publish_failure() {
        let harness = Harness::standard();

        let err = harness
            .requests
            .send(GetOrder { id: 1 }, CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            RequestError::PublishFailed { topic, source } => {
                assert_eq!(topic, ORDERS_TOPIC);
                assert_eq!(source, TransportError::NoRoute(ORDERS_TOPIC.into()));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(harness.requests.pending_count(), 0);
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_unrouted_request_type_is_invalid_configuration() {
        let harness = Harness::new(RequestResponseConfig::default());

        let err = harness
            .requests
            .send_raw("billing.Charge", "billing.Receipt", serde_json::json!({}), SendOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::InvalidConfiguration(ConfigurationError::NoTopicConfigured { ref request_type })
                if request_type == "billing.Charge"
        ));
        assert_eq!(harness.requests.pending_count(), 0);
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_default_topic_fallback() {
        let config = RequestResponseConfig::builder()
            .default_topic(ORDERS_TOPIC)
            .build()
            .unwrap();
        let mut harness = Harness::new(config);
        harness.serve::<GetOrder, _>(ORDERS_TOPIC, OrderHandler);

        let order = harness
            .requests
            .send(GetOrder { id: 2 }, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(order.id, 2);
        harness.shutdown().await;
    }

    // =========================================================================
    // ORPHANS
    // =========================================================================

    #[tokio::test]
    async fn test_malformed_correlation_id_is_logged_not_raised() {
        let harness = Harness::standard();

        harness
            .bus
            .publish(BusMessage::Response {
                correlation_id: "XYZ".into(),
                topic: "responses".into(),
                response_type: None,
                headers: BTreeMap::new(),
                result: Ok(serde_json::Value::Null),
            })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while harness.sink.orphans(OrphanReason::MalformedId).is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(harness.sink.orphans(OrphanReason::MalformedId), vec!["XYZ".to_string()]);
        assert_eq!(harness.requests.pending_count(), 0);
        harness.shutdown().await;
    }
}
