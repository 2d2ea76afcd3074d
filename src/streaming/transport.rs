//! Query transports
//!
//! [`QueryTransport`] is the seam between the query client and the network.
//! [`HttpTransport`] talks to the documentation backend over HTTP:
//! - Buffered: `POST {base}/api/query` with a JSON body
//! - Streaming: `GET {base}/api/query?query=..&stream=true` as `text/event-stream`

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{QueryError, Result};
use crate::streaming::parser::{SseDecoder, MAX_BUFFER_SIZE};
use crate::types::{QueryRequest, QueryResponse};

/// Default backend endpoint
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default query path
pub const DEFAULT_QUERY_PATH: &str = "/api/query";

/// Connect timeout (10 seconds)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw `data` payloads of an event stream, in arrival order.
///
/// `Err(MalformedEvent)` items report a dropped frame and the stream goes on;
/// any other error is the last item.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Network access used by the query client
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Single request/response exchange
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    /// Open a server-push connection for a streaming query
    async fn open_stream(&self, request: &QueryRequest) -> Result<FrameStream>;
}

/// Health endpoint answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// HTTP transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    query_path: String,
    request_timeout: Option<Duration>,
    max_frame_bytes: usize,
}

impl HttpTransport {
    /// Create transport with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_API_URL, DEFAULT_QUERY_PATH)
    }

    /// Create transport for a specific backend
    pub fn with_config(base_url: &str, query_path: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(QueryError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            query_path: query_path.to_string(),
            request_timeout: None,
            max_frame_bytes: MAX_BUFFER_SIZE,
        })
    }

    /// Bound the total time of a buffered request
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Maximum size of a single stream event
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Full URL of the query endpoint
    pub fn query_url(&self) -> String {
        format!("{}{}", self.base_url, self.query_path)
    }

    /// URL of the event stream for one query
    pub fn stream_url(&self, text: &str) -> String {
        format!(
            "{}?query={}&stream=true",
            self.query_url(),
            urlencoding::encode(text)
        )
    }

    /// Ask the backend whether it is up
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let url = format!("{}/", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(CONNECT_TIMEOUT)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response.json().await?)
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let url = self.query_url();
        tracing::debug!(%url, "sending buffered query");

        let mut builder = self.client.post(&url).json(&request.to_body());
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                QueryError::Timeout {
                    duration_ms: self.request_timeout.map_or(0, |t| t.as_millis() as u64),
                }
            } else {
                QueryError::Transport(format!("Failed to send request: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response.json().await?)
    }

    async fn open_stream(&self, request: &QueryRequest) -> Result<FrameStream> {
        let url = self.stream_url(request.text());
        tracing::debug!(%url, "opening event stream");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("Failed to open stream: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(frame_stream(
            Box::pin(response.bytes_stream()),
            SseDecoder::with_capacity(self.max_frame_bytes),
        ))
    }
}

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct FrameState {
    body: BodyStream,
    decoder: SseDecoder,
    ready: VecDeque<Result<String>>,
    finished: bool,
}

/// Decode a response body into frame payloads
fn frame_stream(body: BodyStream, decoder: SseDecoder) -> FrameStream {
    let state = FrameState {
        body,
        decoder,
        ready: VecDeque::new(),
        finished: false,
    };

    let frames = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.add_bytes(&chunk);
                    state.ready.extend(frames);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .ready
                        .push_back(Err(QueryError::Transport(format!("Stream error: {}", e))));
                }
                None => {
                    state.finished = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.ready.push_back(frame);
                    }
                }
            }
        }
    });

    Box::pin(frames)
}

/// Build a server error from a non-success response.
///
/// Prefers the `detail` field of a JSON body, then the raw body text, then
/// the status line.
async fn error_from_response(response: Response) -> QueryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    QueryError::Server {
        status: Some(status.as_u16()),
        message: detail_message(&body).unwrap_or_else(|| fallback_message(status, &body)),
    }
}

fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Null => None,
        // Validation errors arrive as structured lists
        other => Some(other.to_string()),
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() || body.starts_with('{') {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    }
}
