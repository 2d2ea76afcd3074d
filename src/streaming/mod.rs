//! Streaming module
//!
//! HTTP transport for the documentation backend, the incremental
//! server-sent-events decoder, and the tagged stream event model.

pub mod events;
pub mod parser;
pub mod transport;

// Re-export commonly used types
pub use events::StreamEvent;
pub use parser::{SseDecoder, MAX_BUFFER_SIZE};
pub use transport::{
    FrameStream, HealthStatus, HttpTransport, QueryTransport, DEFAULT_API_URL, DEFAULT_QUERY_PATH,
};
