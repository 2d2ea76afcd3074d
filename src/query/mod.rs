//! Query client module
//!
//! Lifecycle state machine, observable snapshot, event bus, and the
//! [`StreamingQueryClient`] that drives them.

pub mod client;
pub mod events;
pub mod snapshot;
pub mod state;

// Re-export commonly used types
pub use client::{ClientOptions, StreamingQueryClient};
pub use events::{ClientEvent, EventBus, DEFAULT_EVENT_BUFFER};
pub use snapshot::QuerySnapshot;
pub use state::{QueryState, StateEvent};
