//! Tagged stream events
//!
//! Every pushed message is a JSON envelope `{"event": <tag>, "data": <payload>}`.
//! Known tags decode into their own variant; unrecognised tags are kept as
//! [`StreamEvent::Unknown`] so callers can match exhaustively.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{QueryError, Result};
use crate::types::{Metrics, StatusEvent};

/// One decoded event from the query stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Progress update; replaces the previous status
    Status(StatusEvent),

    /// Next slice of the answer text
    Token(String),

    /// Final metadata. Does not end the stream.
    ResponseComplete { sources: Vec<String>, metrics: Metrics },

    /// Backend-reported failure (terminal)
    Error { message: Option<String> },

    /// End of stream (terminal)
    Done,

    /// Rewritten query the backend searched with
    QueryAnalysis { enhanced_query: Option<String> },

    /// Any tag this client does not interpret
    Unknown { event: String, data: Value },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CompletePayload {
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    metrics: Metrics,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    enhanced_query: Option<String>,
}

impl StreamEvent {
    /// Decode one frame payload.
    ///
    /// Returns [`QueryError::MalformedEvent`] when the payload is not JSON,
    /// has no `event` tag, or a known tag carries a payload of the wrong shape.
    pub fn parse(payload: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(payload.trim())
            .map_err(|e| QueryError::MalformedEvent(format!("{}: {}", e, preview(payload))))?;

        let Envelope { event, data } = envelope;

        let parsed = match event.as_str() {
            "status" => StreamEvent::Status(
                serde_json::from_value(data).map_err(|e| malformed("status", e))?,
            ),
            "token" => {
                let payload: TokenPayload =
                    serde_json::from_value(data).map_err(|e| malformed("token", e))?;
                StreamEvent::Token(payload.token)
            }
            "response_complete" => {
                let payload: CompletePayload =
                    serde_json::from_value(data).map_err(|e| malformed("response_complete", e))?;
                StreamEvent::ResponseComplete {
                    sources: payload.sources,
                    metrics: payload.metrics,
                }
            }
            "error" => {
                // A missing or non-object payload still terminates the stream
                let message = serde_json::from_value::<ErrorPayload>(data)
                    .ok()
                    .and_then(|p| p.error)
                    .filter(|m| !m.trim().is_empty());
                StreamEvent::Error { message }
            }
            "done" => StreamEvent::Done,
            "query_analysis" => {
                let payload: AnalysisPayload =
                    serde_json::from_value(data).map_err(|e| malformed("query_analysis", e))?;
                StreamEvent::QueryAnalysis {
                    enhanced_query: payload.enhanced_query,
                }
            }
            _ => StreamEvent::Unknown { event, data },
        };

        Ok(parsed)
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error { .. } | StreamEvent::Done)
    }

    /// Wire tag of this event
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::Status(_) => "status",
            StreamEvent::Token(_) => "token",
            StreamEvent::ResponseComplete { .. } => "response_complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done => "done",
            StreamEvent::QueryAnalysis { .. } => "query_analysis",
            StreamEvent::Unknown { event, .. } => event.as_str(),
        }
    }
}

fn malformed(event: &str, err: serde_json::Error) -> QueryError {
    QueryError::MalformedEvent(format!("{} payload: {}", event, err))
}

fn preview(payload: &str) -> String {
    payload.chars().take(100).collect()
}
