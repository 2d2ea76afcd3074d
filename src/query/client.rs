//! Streaming query client
//!
//! Owns the lifecycle of one in-flight documentation query at a time, in
//! either buffered or streaming mode, and publishes every change as a
//! [`QuerySnapshot`].
//!
//! Each submission runs on its own spawned task (the connection handle).
//! Shared state is fenced by a generation counter: a task only publishes
//! while its generation is current, so a cancelled or superseded request can
//! never leak an update, even if it was mid-event when aborted.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::{QueryError, Result, CONNECTION_ERROR_MESSAGE, GENERIC_ERROR_MESSAGE};
use crate::query::events::{ClientEvent, EventBus};
use crate::query::snapshot::QuerySnapshot;
use crate::query::state::StateEvent;
use crate::streaming::{QueryTransport, StreamEvent};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::types::{QueryRequest, QueryResponse, Turn};

/// Client tuning
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Longest wait for the buffered answer or for the next stream event.
    /// `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
}

struct Inner {
    generation: u64,
    snapshot: QuerySnapshot,
    connection: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<QuerySnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot.clone());
    }
}

/// Documentation query client with buffered and streaming modes
pub struct StreamingQueryClient {
    transport: Arc<dyn QueryTransport>,
    shared: Arc<Shared>,
    options: ClientOptions,
    events: Option<EventBus>,
    telemetry: TelemetryCollector,
}

impl StreamingQueryClient {
    /// Create client over a transport
    pub fn new<T: QueryTransport + 'static>(transport: T) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    /// Create client over a shared transport
    pub fn with_transport(transport: Arc<dyn QueryTransport>) -> Self {
        let (snapshot_tx, _) = watch::channel(QuerySnapshot::default());

        Self {
            transport,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    generation: 0,
                    snapshot: QuerySnapshot::default(),
                    connection: None,
                }),
                snapshot_tx,
            }),
            options: ClientOptions::default(),
            events: None,
            telemetry: TelemetryCollector::new(),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Publish deltas on an event bus in addition to snapshots
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    /// Current observable state
    pub fn snapshot(&self) -> QuerySnapshot {
        self.shared.lock().snapshot.clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<QuerySnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().snapshot.loading
    }

    /// Submit a query, replacing any request in flight.
    ///
    /// A blank query is rejected with [`QueryError::Validation`]: the message
    /// is surfaced in the snapshot's `error`, nothing is sent, and an
    /// in-flight request is left alone.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, text: &str, streaming: bool, history: Vec<Turn>) -> Result<Uuid> {
        let request = match QueryRequest::new(text, streaming, history) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "query rejected");
                let mut inner = self.shared.lock();
                inner.snapshot.error = Some(err.user_message());
                self.shared.publish(&inner);
                return Err(err);
            }
        };

        let request_id = Uuid::new_v4();
        let mut inner = self.shared.lock();

        if let Some(previous) = inner.connection.take() {
            previous.abort();
            if let Some(previous_id) = inner.snapshot.request_id {
                tracing::debug!(request_id = %previous_id, "request superseded");
                self.telemetry.record(TelemetryEvent::QueryCancelled {
                    request_id: previous_id,
                    timestamp: Instant::now(),
                });
            }
        }

        let state = inner.snapshot.state.transition(StateEvent::Submit)?;
        inner.generation += 1;
        inner.snapshot = QuerySnapshot::loading(request_id, streaming);
        inner.snapshot.state = state;
        self.shared.publish(&inner);

        tracing::info!(%request_id, streaming, "query submitted");
        self.telemetry.record(TelemetryEvent::QuerySubmitted {
            request_id,
            streaming,
            timestamp: Instant::now(),
        });
        if let Some(events) = &self.events {
            events.emit(ClientEvent::Submitted {
                request_id,
                streaming,
            });
        }

        let task = RequestTask {
            shared: Arc::clone(&self.shared),
            generation: inner.generation,
            request_id,
            transport: Arc::clone(&self.transport),
            idle_timeout: self.options.idle_timeout,
            events: self.events.clone(),
            telemetry: self.telemetry.clone(),
            started: Instant::now(),
        };
        inner.connection = Some(tokio::spawn(task.run(request)));

        Ok(request_id)
    }

    /// Abandon the request in flight, if any.
    ///
    /// The connection is closed, the state returns to idle, and no terminal
    /// event is emitted. A no-op when nothing is active.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        let Some(connection) = inner.connection.take() else {
            return;
        };

        connection.abort();
        inner.generation += 1;
        match inner.snapshot.state.transition(StateEvent::Cancel) {
            Ok(state) => inner.snapshot.state = state,
            Err(err) => tracing::warn!(error = %err, "unexpected state on cancel"),
        }
        inner.snapshot.loading = false;
        inner.snapshot.status = None;
        self.shared.publish(&inner);

        if let Some(request_id) = inner.snapshot.request_id {
            tracing::info!(%request_id, "query cancelled");
            self.telemetry.record(TelemetryEvent::QueryCancelled {
                request_id,
                timestamp: Instant::now(),
            });
            if let Some(events) = &self.events {
                events.emit(ClientEvent::Cancelled { request_id });
            }
        }
    }

    /// Wait until the current request leaves the loading state
    pub async fn wait_for_terminal(&self) -> QuerySnapshot {
        let mut receiver = self.subscribe();
        loop {
            {
                let snapshot = receiver.borrow_and_update();
                if !snapshot.loading {
                    return snapshot.clone();
                }
            }
            if receiver.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

impl Drop for StreamingQueryClient {
    fn drop(&mut self) {
        if let Some(connection) = self.shared.lock().connection.take() {
            connection.abort();
        }
    }
}

/// How a request ended
enum Outcome {
    /// Buffered answer, or `None` when the stream already accumulated it
    Completed(Option<QueryResponse>),
    Failed(String),
    /// A newer request took over; publish nothing
    Superseded,
}

enum Step {
    Continue,
    Stop(Outcome),
}

/// One submission, driven on its own task
struct RequestTask {
    shared: Arc<Shared>,
    generation: u64,
    request_id: Uuid,
    transport: Arc<dyn QueryTransport>,
    idle_timeout: Option<Duration>,
    events: Option<EventBus>,
    telemetry: TelemetryCollector,
    started: Instant,
}

impl RequestTask {
    async fn run(self, request: QueryRequest) {
        let outcome = if request.is_streaming() {
            self.run_streaming(&request).await
        } else {
            self.run_buffered(&request).await
        };
        self.finish(outcome);
    }

    async fn run_buffered(&self, request: &QueryRequest) -> Outcome {
        match with_idle_timeout(self.idle_timeout, self.transport.query(request)).await {
            Ok(response) => Outcome::Completed(Some(response)),
            Err(err) => {
                tracing::warn!(request_id = %self.request_id, error = %err, "buffered query failed");
                Outcome::Failed(err.user_message())
            }
        }
    }

    async fn run_streaming(&self, request: &QueryRequest) -> Outcome {
        let open = self.transport.open_stream(request);
        let mut frames = match with_idle_timeout(self.idle_timeout, open).await {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!(request_id = %self.request_id, error = %err, "failed to open event stream");
                return Outcome::Failed(CONNECTION_ERROR_MESSAGE.to_string());
            }
        };

        let outcome = loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            request_id = %self.request_id,
                            timeout_ms = limit.as_millis() as u64,
                            "event stream idle timeout"
                        );
                        break Outcome::Failed(CONNECTION_ERROR_MESSAGE.to_string());
                    }
                },
                None => frames.next().await,
            };

            let payload = match next {
                Some(Ok(payload)) => payload,
                Some(Err(QueryError::MalformedEvent(reason))) => {
                    if !self.record_malformed(reason) {
                        break Outcome::Superseded;
                    }
                    continue;
                }
                Some(Err(err)) => {
                    tracing::warn!(request_id = %self.request_id, error = %err, "event stream failed");
                    break Outcome::Failed(CONNECTION_ERROR_MESSAGE.to_string());
                }
                None => {
                    tracing::warn!(request_id = %self.request_id, "event stream closed before done");
                    break Outcome::Failed(CONNECTION_ERROR_MESSAGE.to_string());
                }
            };

            let event = match StreamEvent::parse(&payload) {
                Ok(event) => event,
                Err(err) => {
                    if !self.record_malformed(err.to_string()) {
                        break Outcome::Superseded;
                    }
                    continue;
                }
            };

            match self.apply_event(event) {
                Step::Continue => {}
                Step::Stop(outcome) => break outcome,
            }
        };

        // Connection is closed before the terminal state becomes visible
        drop(frames);
        outcome
    }

    fn apply_event(&self, event: StreamEvent) -> Step {
        tracing::trace!(request_id = %self.request_id, kind = event.kind(), "stream event");

        match event {
            StreamEvent::Status(status) => {
                let published = status.clone();
                if !self.update(move |snapshot| snapshot.status = Some(status)) {
                    return Step::Stop(Outcome::Superseded);
                }
                self.telemetry.record(TelemetryEvent::StatusReceived {
                    request_id: self.request_id,
                    timestamp: Instant::now(),
                });
                self.emit(ClientEvent::Status {
                    request_id: self.request_id,
                    status: published,
                });
            }
            StreamEvent::Token(token) => {
                let bytes = token.len();
                let published = token.clone();
                let applied = self.update(move |snapshot| {
                    snapshot
                        .response
                        .get_or_insert_with(QueryResponse::empty)
                        .response_text
                        .push_str(&token);
                });
                if !applied {
                    return Step::Stop(Outcome::Superseded);
                }
                self.telemetry.record(TelemetryEvent::TokenReceived {
                    request_id: self.request_id,
                    bytes,
                    timestamp: Instant::now(),
                });
                self.emit(ClientEvent::Token {
                    request_id: self.request_id,
                    token: published,
                });
            }
            StreamEvent::ResponseComplete { sources, metrics } => {
                let published = sources.clone();
                let applied = self.update(move |snapshot| {
                    let response = snapshot.response.get_or_insert_with(QueryResponse::empty);
                    response.sources = sources;
                    response.metrics = metrics;
                });
                if !applied {
                    return Step::Stop(Outcome::Superseded);
                }
                self.emit(ClientEvent::ResponseComplete {
                    request_id: self.request_id,
                    sources: published,
                });
            }
            StreamEvent::QueryAnalysis { enhanced_query } => {
                if !self.update(move |snapshot| snapshot.enhanced_query = enhanced_query) {
                    return Step::Stop(Outcome::Superseded);
                }
            }
            StreamEvent::Error { message } => {
                let message = message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
                tracing::warn!(request_id = %self.request_id, error = %message, "backend reported error");
                return Step::Stop(Outcome::Failed(message));
            }
            StreamEvent::Done => return Step::Stop(Outcome::Completed(None)),
            StreamEvent::Unknown { event, .. } => {
                tracing::debug!(request_id = %self.request_id, %event, "ignoring stream event");
            }
        }

        Step::Continue
    }

    /// Log and count a dropped frame. Returns false once superseded.
    fn record_malformed(&self, reason: String) -> bool {
        tracing::warn!(request_id = %self.request_id, %reason, "dropping malformed stream event");

        if !self.update(|snapshot| snapshot.malformed_events += 1) {
            return false;
        }
        self.telemetry.record(TelemetryEvent::MalformedEvent {
            request_id: self.request_id,
            timestamp: Instant::now(),
        });
        self.emit(ClientEvent::MalformedEvent {
            request_id: self.request_id,
            reason,
        });
        true
    }

    /// Mutate and publish the snapshot if this request is still current
    fn update(&self, apply: impl FnOnce(&mut QuerySnapshot)) -> bool {
        let mut inner = self.shared.lock();
        if inner.generation != self.generation {
            return false;
        }
        apply(&mut inner.snapshot);
        self.shared.publish(&inner);
        true
    }

    fn finish(&self, outcome: Outcome) {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let mut inner = self.shared.lock();
        if inner.generation != self.generation {
            tracing::debug!(request_id = %self.request_id, "outcome of superseded request dropped");
            return;
        }

        let (event, terminal) = match outcome {
            Outcome::Superseded => return,
            Outcome::Completed(response) => (StateEvent::Complete, Ok(response)),
            Outcome::Failed(message) => (StateEvent::Fail, Err(message)),
        };

        match inner.snapshot.state.transition(event) {
            Ok(state) => inner.snapshot.state = state,
            Err(err) => {
                tracing::warn!(request_id = %self.request_id, error = %err, "terminal event ignored");
                return;
            }
        }

        match &terminal {
            Ok(response) => {
                if let Some(response) = response {
                    inner.snapshot.response = Some(response.clone());
                }
                // A blank submit during this request may have left a message behind
                inner.snapshot.error = None;
            }
            Err(message) => inner.snapshot.error = Some(message.clone()),
        }
        inner.snapshot.loading = false;
        inner.snapshot.status = None;
        inner.connection = None;
        self.shared.publish(&inner);

        match terminal {
            Ok(_) => {
                tracing::info!(request_id = %self.request_id, duration_ms, "query completed");
                self.telemetry.record(TelemetryEvent::QueryCompleted {
                    request_id: self.request_id,
                    duration_ms,
                    timestamp: Instant::now(),
                });
                self.emit(ClientEvent::Completed {
                    request_id: self.request_id,
                    response: inner.snapshot.response.clone().unwrap_or_default(),
                    duration_ms,
                });
            }
            Err(error) => {
                tracing::info!(request_id = %self.request_id, duration_ms, %error, "query failed");
                self.telemetry.record(TelemetryEvent::QueryFailed {
                    request_id: self.request_id,
                    duration_ms,
                    timestamp: Instant::now(),
                });
                self.emit(ClientEvent::Failed {
                    request_id: self.request_id,
                    error,
                });
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

async fn with_idle_timeout<T>(
    limit: Option<Duration>,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout {
                duration_ms: limit.as_millis() as u64,
            }),
        },
        None => operation.await,
    }
}
