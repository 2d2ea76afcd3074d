//! docquery - Documentation Query Client
//!
//! Terminal client for a retrieval-augmented documentation backend. A query
//! is answered either in one buffered response or as a stream of
//! server-sent events carrying progress, answer tokens, and sources.
//!
//! # Architecture
//!
//! - **streaming**: HTTP transport, SSE decoding, stream event model
//! - **query**: state machine, snapshots, and the [`StreamingQueryClient`]
//! - **cli / repl**: configuration, argument parsing, interactive shell
//! - **telemetry**: per-session query statistics

pub mod errors;
pub mod types;
pub mod streaming;
pub mod query;

// Re-export commonly used types
pub use errors::{QueryError, Result};
pub use query::{ClientOptions, QuerySnapshot, QueryState, StreamingQueryClient};

// Interface layer
pub mod cli;
pub mod repl;
pub mod telemetry;

// Shared query execution for one-shot and interactive modes
pub mod execution;
