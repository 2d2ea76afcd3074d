//! Observable query state handed to the rendering layer

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::query::state::QueryState;
use crate::types::{QueryResponse, StatusEvent};

/// Everything a renderer needs to draw the current query.
///
/// Published by value on every change; renderers never mutate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    /// Request the snapshot describes, if any was submitted
    pub request_id: Option<Uuid>,

    pub state: QueryState,

    /// Accumulated answer; present from the start of a stream
    pub response: Option<QueryResponse>,

    /// Latest progress message, cleared on terminal transitions
    pub status: Option<StatusEvent>,

    pub loading: bool,

    /// One human-readable failure message
    pub error: Option<String>,

    /// Rewritten query reported by the backend
    pub enhanced_query: Option<String>,

    /// Stream frames dropped because they could not be decoded
    pub malformed_events: usize,

    pub submitted_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
    pub fn is_completed(&self) -> bool {
        self.state == QueryState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.state == QueryState::Failed
    }

    /// Stream went on despite dropped frames
    pub fn is_degraded(&self) -> bool {
        self.malformed_events > 0
    }

    /// Current answer text, empty when there is none
    pub fn response_text(&self) -> &str {
        self.response
            .as_ref()
            .map(|r| r.response_text.as_str())
            .unwrap_or("")
    }

    /// Fresh loading snapshot for a new request
    pub(crate) fn loading(request_id: Uuid, streaming: bool) -> Self {
        Self {
            request_id: Some(request_id),
            state: QueryState::Loading,
            response: streaming.then(QueryResponse::empty),
            status: None,
            loading: true,
            error: None,
            enhanced_query: None,
            malformed_events: 0,
            submitted_at: Some(Utc::now()),
        }
    }
}
