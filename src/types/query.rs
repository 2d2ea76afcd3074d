//! Query request and response types
//!
//! Defines the values exchanged with the documentation backend and the
//! client-side shapes handed to the rendering layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{QueryError, Result};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Conversation history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One submission. Immutable once sent.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    text: String,
    streaming: bool,
    history: Vec<Turn>,
}

impl QueryRequest {
    /// Build a request, trimming the text.
    ///
    /// Fails with [`QueryError::Validation`] when nothing is left after
    /// trimming.
    pub fn new(text: &str, streaming: bool, history: Vec<Turn>) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Validation(
                "Please enter a query to search the documentation".to_string(),
            ));
        }

        Ok(Self {
            text: trimmed.to_string(),
            streaming,
            history,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// JSON body for the buffered endpoint
    pub fn to_body(&self) -> BufferedQueryBody<'_> {
        BufferedQueryBody {
            query: &self.text,
            stream: false,
            conversation_history: &self.history,
        }
    }
}

/// Wire body of a buffered submission
#[derive(Debug, Serialize)]
pub struct BufferedQueryBody<'a> {
    pub query: &'a str,
    pub stream: bool,
    pub conversation_history: &'a [Turn],
}

/// Timing information reported with a completed answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "total_time", default)]
    pub total_time_seconds: f64,

    /// Any other metric the backend reports (per-step timings and the like)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Answer to a query, complete or still accumulating
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "response", default)]
    pub response_text: String,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub metrics: Metrics,
}

impl QueryResponse {
    /// Empty-but-present response shown while a stream warms up
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Progress message pushed by the backend while it works
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message: String,

    /// Machine-readable stage code, e.g. `retrieving_context`
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}
