//! Request Dispatcher.
//!
//! [`RequestResponseBus`] turns a publish plus a later correlated response
//! into one awaitable call:
//!
//! 1. Resolve topic and timeout (explicit, then per type, then global)
//! 2. Register a waiter in the pending table
//! 3. Publish the request through the transport
//! 4. Wait for the response, the caller's cancellation or the deadline
//!
//! Every path that registers also unregisters, and the caller observes
//! exactly one outcome.

use crate::adapters::bus_adapter::{ResponseListener, SharedBusTransport};
use crate::adapters::observability::FanoutSink;
use crate::adapters::pending::{PendingRequestTable, Waiter};
use crate::adapters::router::ResponseRouter;
use crate::adapters::sweeper::TimeoutSweeper;
use crate::domain::{
    Completion, ConfigError, CorrelationId, Outcome, OutcomeKind, RequestEnvelope, RequestError,
    RequestMessage, RequestResponseConfig, RequestResult,
};
use crate::ports::{
    ConfigurationProvider, CorrelationEvent, ObservabilitySink, RequestResponseApi, SendOptions,
    SystemTimeSource, TimeSource, Transport,
};
use async_trait::async_trait;
use bus_telemetry::TraceContext;
use parking_lot::Mutex;
use shared_bus::InMemoryMessageBus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Local deadline used when `now + timeout` does not fit in an `Instant`
const MAX_WAIT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

pub struct RequestResponseBus {
    table: Arc<PendingRequestTable>,
    transport: Arc<dyn Transport>,
    config: Arc<dyn ConfigurationProvider>,
    sink: Arc<dyn ObservabilitySink>,
    time: Arc<dyn TimeSource>,
    /// Bus to take the response subscription from on `start()`
    response_bus: Option<Arc<InMemoryMessageBus>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RequestResponseBus {
    /// Build over an arbitrary transport. Responses must be fed to
    /// [`RequestResponseBus::router`] by the transport's delivery path.
    ///
    /// `config` is not validated here; [`RequestResponseBus::start`] rejects
    /// a zero sweep interval.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: Arc<dyn ConfigurationProvider>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            table: Arc::new(PendingRequestTable::new()),
            transport,
            config,
            sink,
            time: Arc::new(SystemTimeSource),
            response_bus: None,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build over the in-memory shared bus, logging and counting events
    /// through the standard sinks.
    ///
    /// The reply-to subscription is only taken by [`RequestResponseBus::start`].
    /// Call it before sending: until then responders see no subscriber on the
    /// response topic and their replies are dropped.
    pub fn over_shared_bus(
        bus: Arc<InMemoryMessageBus>,
        config: RequestResponseConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut service = Self::new(
            Arc::new(SharedBusTransport::new(Arc::clone(&bus))),
            Arc::new(config),
            Arc::new(FanoutSink::standard()),
        );
        service.response_bus = Some(bus);
        Ok(service)
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Spawn the timeout sweeper and, over the shared bus, the response
    /// listener. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), ConfigError> {
        let sweep_interval = self.config.sweep_interval();
        if sweep_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "sweep_interval cannot be 0".into(),
            ));
        }

        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut tasks = Vec::with_capacity(2);

        let sweeper = TimeoutSweeper::new(
            Arc::clone(&self.table),
            Arc::clone(&self.sink),
            sweep_interval,
        );
        tasks.push(sweeper.spawn(self.shutdown.child_token()));

        if let Some(bus) = &self.response_bus {
            let listener = ResponseListener::new(bus, self.config.response_topic(), self.router());
            tasks.push(listener.spawn(self.shutdown.child_token()));
        }

        info!(
            response_topic = %self.config.response_topic(),
            background_tasks = tasks.len(),
            "Request/response bus started"
        );
        self.tasks.lock().extend(tasks);
        Ok(())
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        info!(pending = self.table.pending_count(), "Request/response bus stopped");
    }

    /// Router for responses delivered outside the shared bus.
    pub fn router(&self) -> ResponseRouter {
        ResponseRouter::new(Arc::clone(&self.table), Arc::clone(&self.sink))
    }

    pub fn pending_table(&self) -> &Arc<PendingRequestTable> {
        &self.table
    }

    /// Send a typed request to its configured topic.
    pub async fn send<R: RequestMessage>(
        &self,
        request: R,
        cancellation: CancellationToken,
    ) -> RequestResult<R::Response> {
        self.send_with(request, SendOptions::new().cancellation(cancellation))
            .await
    }

    /// Send a typed request to an explicit topic.
    pub async fn send_to_topic<R: RequestMessage>(
        &self,
        request: R,
        topic: &str,
        cancellation: CancellationToken,
    ) -> RequestResult<R::Response> {
        self.send_with(
            request,
            SendOptions::new().topic(topic).cancellation(cancellation),
        )
        .await
    }

    /// Send a typed request with an explicit timeout.
    pub async fn send_with_timeout<R: RequestMessage>(
        &self,
        request: R,
        timeout: Duration,
        cancellation: CancellationToken,
    ) -> RequestResult<R::Response> {
        self.send_with(
            request,
            SendOptions::new().timeout(timeout).cancellation(cancellation),
        )
        .await
    }

    /// Send a typed request with full per-call options.
    pub async fn send_with<R: RequestMessage>(
        &self,
        request: R,
        options: SendOptions,
    ) -> RequestResult<R::Response> {
        let payload = serde_json::to_value(&request)?;
        let response = self
            .dispatch(R::request_type(), R::response_type(), payload, options)
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    #[instrument(name = "send_request", skip_all, fields(request_type = %request_type))]
    async fn dispatch(
        &self,
        request_type: &str,
        response_type: &str,
        payload: serde_json::Value,
        options: SendOptions,
    ) -> RequestResult<serde_json::Value> {
        let SendOptions {
            topic,
            timeout,
            cancellation,
            mut headers,
        } = options;

        let topic = self.config.resolve_topic(request_type, topic.as_deref())?;
        let timeout = self.config.resolve_timeout(request_type, timeout)?;

        if cancellation.is_cancelled() {
            debug!(request_type = request_type, "Cancelled before dispatch");
            return Err(RequestError::Cancelled {
                correlation_id: None,
            });
        }

        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + MAX_WAIT);
        let Waiter {
            correlation_id,
            expires_at,
            mut receiver,
        } = self.table.register(request_type, response_type, deadline);
        let _registration = self.table.guard(correlation_id);

        TraceContext::extract_current()
            .to_propagated()
            .inject(&mut headers);

        let envelope = RequestEnvelope {
            correlation_id,
            topic: topic.clone(),
            reply_to: self.config.response_topic().to_string(),
            request_type: request_type.to_string(),
            expires_at_ms: self
                .time
                .now_millis()
                .saturating_add(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
            headers,
            payload,
        };

        if let Err(source) = self.transport.publish(&topic, envelope).await {
            warn!(
                correlation_id = %correlation_id,
                topic = %topic,
                error = %source,
                "Failed to publish request"
            );
            return Err(RequestError::PublishFailed { topic, source });
        }

        self.sink.record(&CorrelationEvent::RequestSent {
            correlation_id,
            request_type: request_type.to_string(),
            topic,
        });

        let completion = tokio::select! {
            biased;
            completion = &mut receiver => completion.ok(),
            _ = cancellation.cancelled() => {
                self.settle(correlation_id, Outcome::Cancelled, &mut receiver).await
            }
            _ = tokio::time::sleep_until(expires_at) => {
                self.settle(correlation_id, Outcome::Expired, &mut receiver).await
            }
        };

        let Some(Completion { outcome, elapsed }) = completion else {
            // Entry removed without an outcome
            warn!(correlation_id = %correlation_id, "Completion slot closed");
            return Err(RequestError::Cancelled {
                correlation_id: Some(correlation_id),
            });
        };

        self.sink.record(&CorrelationEvent::RequestCompleted {
            correlation_id,
            request_type: request_type.to_string(),
            outcome: outcome.kind(),
            elapsed,
        });

        match outcome {
            Outcome::Resolved(payload) => Ok(payload),
            Outcome::Faulted(fault) => Err(RequestError::HandlerFaulted(fault)),
            Outcome::Expired => Err(RequestError::Timeout {
                correlation_id,
                timeout,
            }),
            Outcome::Cancelled => Err(RequestError::Cancelled {
                correlation_id: Some(correlation_id),
            }),
        }
    }

    /// Try to complete with `outcome`; if someone else got there first,
    /// their outcome is the one returned.
    async fn settle(
        &self,
        correlation_id: CorrelationId,
        outcome: Outcome,
        receiver: &mut oneshot::Receiver<Completion>,
    ) -> Option<Completion> {
        let attempted: OutcomeKind = outcome.kind();
        if !self.table.try_complete(correlation_id, outcome) {
            self.sink.record(&CorrelationEvent::RaceLost {
                correlation_id,
                attempted,
            });
        }
        receiver.await.ok()
    }
}

#[async_trait]
impl RequestResponseApi for RequestResponseBus {
    async fn send_raw(
        &self,
        request_type: &str,
        response_type: &str,
        payload: serde_json::Value,
        options: SendOptions,
    ) -> RequestResult<serde_json::Value> {
        self.dispatch(request_type, response_type, payload, options)
            .await
    }

    fn pending_count(&self) -> usize {
        self.table.pending_count()
    }
}

impl Drop for RequestResponseBus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
