//! Event bus for query lifecycle updates
//!
//! Publisher-subscriber channel of typed client events. The snapshot watch
//! channel is the authoritative state; this bus is for renderers that want
//! deltas (e.g. printing tokens as they arrive).

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{QueryResponse, StatusEvent};

/// Default channel capacity
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Query lifecycle and progress events
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Request accepted and dispatched
    Submitted { request_id: Uuid, streaming: bool },

    /// Backend progress message
    Status { request_id: Uuid, status: StatusEvent },

    /// Answer text appended
    Token { request_id: Uuid, token: String },

    /// Sources and metrics arrived
    ResponseComplete { request_id: Uuid, sources: Vec<String> },

    /// Terminal: answer available
    Completed {
        request_id: Uuid,
        response: QueryResponse,
        duration_ms: u64,
    },

    /// Terminal: request failed
    Failed { request_id: Uuid, error: String },

    /// Request abandoned by the caller
    Cancelled { request_id: Uuid },

    /// A stream frame was dropped
    MalformedEvent { request_id: Uuid, reason: String },
}

impl ClientEvent {
    /// Request this event belongs to
    pub fn request_id(&self) -> Uuid {
        match self {
            ClientEvent::Submitted { request_id, .. }
            | ClientEvent::Status { request_id, .. }
            | ClientEvent::Token { request_id, .. }
            | ClientEvent::ResponseComplete { request_id, .. }
            | ClientEvent::Completed { request_id, .. }
            | ClientEvent::Failed { request_id, .. }
            | ClientEvent::Cancelled { request_id }
            | ClientEvent::MalformedEvent { request_id, .. } => *request_id,
        }
    }

    /// Whether this event ends its request
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClientEvent::Completed { .. } | ClientEvent::Failed { .. } | ClientEvent::Cancelled { .. }
        )
    }
}

/// Event bus for publishing client events
pub struct EventBus {
    sender: mpsc::Sender<ClientEvent>,
}

impl EventBus {
    /// Create new event bus with bounded channel
    pub fn new() -> (Self, mpsc::Receiver<ClientEvent>) {
        Self::with_capacity(DEFAULT_EVENT_BUFFER)
    }

    /// Create event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (EventBus { sender }, receiver)
    }

    /// Emit an event without waiting.
    ///
    /// A full or closed channel drops the event; subscribers that need the
    /// whole picture read the snapshot instead.
    pub fn emit(&self, event: ClientEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::debug!(error = %err, "client event dropped");
        }
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        EventBus {
            sender: self.sender.clone(),
        }
    }
}
