//! Query lifecycle state machine
//!
//! One request at a time moves through:
//! - `Idle → Loading` on submit
//! - `Loading → Completed | Failed` on its terminal event
//! - `Loading → Idle` on cancel
//! - `Completed | Failed | Idle → Loading` on the next submit

use crate::errors::{QueryError, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle states of the query client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueryState {
    /// Nothing submitted, or the last request was cancelled
    #[default]
    Idle,

    /// A request is in flight
    Loading,

    /// Last request finished with an answer (terminal)
    Completed,

    /// Last request failed (terminal)
    Failed,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// New query accepted
    Submit,

    /// Buffered response received or stream reported `done`
    Complete,

    /// Transport failure or backend-reported error
    Fail,

    /// Caller abandoned the request
    Cancel,
}

impl QueryState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Completed | QueryState::Failed)
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    ///
    /// ```text
    /// any      -> Loading    (on: Submit)
    /// Loading  -> Completed  (on: Complete)
    /// Loading  -> Failed     (on: Fail)
    /// Loading  -> Idle       (on: Cancel)
    /// other    -> other      (on: Cancel, no-op)
    /// ```
    pub fn transition(&self, event: StateEvent) -> Result<QueryState> {
        use QueryState::*;
        use StateEvent::*;

        let next_state = match (self, event) {
            (_, Submit) => Loading,

            (Loading, Complete) => Completed,
            (Loading, Fail) => Failed,
            (Loading, Cancel) => Idle,

            // Nothing in flight
            (state, Cancel) => *state,

            (from, event) => {
                return Err(QueryError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("No request in flight in state {:?}", from),
                });
            }
        };

        Ok(next_state)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            QueryState::Idle => "Idle",
            QueryState::Loading => "Processing",
            QueryState::Completed => "Completed",
            QueryState::Failed => "Failed",
        }
    }
}
