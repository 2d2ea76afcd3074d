//! Type definitions module
//!
//! Request and response shapes exchanged with the documentation backend.

pub mod query;

// Re-export commonly used types
pub use query::{Metrics, QueryRequest, QueryResponse, Role, StatusEvent, Turn};
