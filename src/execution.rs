//! Shared query execution for one-shot and interactive modes
//!
//! Submits a question, renders progress from the client's event bus, and
//! cancels on Ctrl-C. The bus may drop events under load, so streamed text is
//! always printed from the snapshot; token events only say when to look.

use std::time::Instant;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::errors::QueryError;
use crate::query::{ClientEvent, QuerySnapshot, StreamingQueryClient};
use crate::repl::display::DisplayManager;
use crate::types::Turn;

/// Result of one rendered query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub snapshot: QuerySnapshot,
    pub duration_ms: u64,
    pub cancelled: bool,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        self.snapshot.is_completed()
    }
}

/// Run one query to its end and render it.
///
/// Validation failures are shown and reported as an unsuccessful outcome;
/// only unexpected client errors are returned as `Err`.
pub async fn execute_query(
    client: &StreamingQueryClient,
    events: &mut mpsc::Receiver<ClientEvent>,
    display: &mut DisplayManager,
    text: &str,
    streaming: bool,
    history: Vec<Turn>,
) -> Result<QueryOutcome> {
    let start_time = Instant::now();

    let request_id = match client.submit(text, streaming, history) {
        Ok(id) => id,
        Err(err @ QueryError::Validation(_)) => {
            display.show_error(&err.user_message());
            return Ok(QueryOutcome {
                snapshot: client.snapshot(),
                duration_ms: 0,
                cancelled: false,
            });
        }
        Err(err) => return Err(err.into()),
    };

    display.start_status("Processing...");
    let snapshots = client.subscribe();
    let mut renderer = LiveRenderer::new(request_id);
    let mut cancelled = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if renderer.apply(&event, &snapshots, display) {
                        break;
                    }
                }
                // Bus gone; the snapshot still tells us when we are done
                None => {
                    client.wait_for_terminal().await;
                    break;
                }
            },
            _ = client.wait_for_terminal() => {
                // Terminal state reached; catch up on events still queued
                while let Ok(event) = events.try_recv() {
                    renderer.apply(&event, &snapshots, display);
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                client.cancel();
                cancelled = true;
                break;
            }
        }
    }

    display.finish_current();
    let snapshot = client.snapshot();
    let duration_ms = start_time.elapsed().as_millis() as u64;

    if renderer.printed_tokens() {
        if snapshot.is_completed() {
            renderer.catch_up(&snapshots, display);
        }
        println!();
    }

    if cancelled {
        display.show_warning("Query cancelled");
    } else if snapshot.is_completed() {
        if !renderer.printed_tokens() {
            display.show_answer(snapshot.response_text());
        }
        if let Some(response) = &snapshot.response {
            display.show_sources(&response.sources);
            display.show_response_time(response.metrics.total_time_seconds);
        }
        if snapshot.is_degraded() {
            display.show_warning(&format!(
                "{} stream event(s) could not be read",
                snapshot.malformed_events
            ));
        }
    } else if let Some(error) = &snapshot.error {
        display.show_error(error);
    }

    Ok(QueryOutcome {
        snapshot,
        duration_ms,
        cancelled,
    })
}

/// Applies bus events for one request to the display
struct LiveRenderer {
    request_id: Uuid,
    /// Bytes of the answer already written to stdout
    printed_len: usize,
}

impl LiveRenderer {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            printed_len: 0,
        }
    }

    fn printed_tokens(&self) -> bool {
        self.printed_len > 0
    }

    /// Print whatever the snapshot holds beyond what is already on screen
    fn catch_up(
        &mut self,
        snapshots: &watch::Receiver<QuerySnapshot>,
        display: &mut DisplayManager,
    ) {
        let pending = {
            let snapshot = snapshots.borrow();
            if snapshot.request_id != Some(self.request_id) {
                return;
            }
            snapshot
                .response_text()
                .get(self.printed_len..)
                .unwrap_or_default()
                .to_string()
        };
        if pending.is_empty() {
            return;
        }

        if !self.printed_tokens() {
            display.finish_current();
        }
        self.printed_len += pending.len();
        display.stream_token(&pending);
    }

    /// Returns true once the request has ended
    fn apply(
        &mut self,
        event: &ClientEvent,
        snapshots: &watch::Receiver<QuerySnapshot>,
        display: &mut DisplayManager,
    ) -> bool {
        if event.request_id() != self.request_id {
            return false;
        }

        match event {
            ClientEvent::Status { status, .. } => {
                if !self.printed_tokens() {
                    display.update_status(&status.message);
                }
            }
            ClientEvent::Token { .. } => self.catch_up(snapshots, display),
            ClientEvent::MalformedEvent { reason, .. } => {
                tracing::debug!(%reason, "malformed event skipped by renderer");
            }
            ClientEvent::Submitted { .. } | ClientEvent::ResponseComplete { .. } => {}
            ClientEvent::Completed { .. }
            | ClientEvent::Failed { .. }
            | ClientEvent::Cancelled { .. } => return true,
        }

        false
    }
}
