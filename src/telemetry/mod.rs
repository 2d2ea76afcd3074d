//! Telemetry system for docquery
//!
//! Collects per-query events and aggregate statistics for the session
//! summary.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use colored::*;
use uuid::Uuid;

/// Maximum number of events kept for inspection; stats cover everything
pub const MAX_EVENTS: usize = 1000;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    QuerySubmitted {
        request_id: Uuid,
        streaming: bool,
        timestamp: Instant,
    },
    StatusReceived {
        request_id: Uuid,
        timestamp: Instant,
    },
    TokenReceived {
        request_id: Uuid,
        bytes: usize,
        timestamp: Instant,
    },
    MalformedEvent {
        request_id: Uuid,
        timestamp: Instant,
    },
    QueryCompleted {
        request_id: Uuid,
        duration_ms: u64,
        timestamp: Instant,
    },
    QueryFailed {
        request_id: Uuid,
        duration_ms: u64,
        timestamp: Instant,
    },
    QueryCancelled {
        request_id: Uuid,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub queries_submitted: usize,
    pub streaming_queries: usize,
    pub status_updates: usize,
    pub tokens_received: usize,
    pub bytes_received: usize,
    pub malformed_events: usize,
    pub queries_completed: usize,
    pub queries_failed: usize,
    pub queries_cancelled: usize,
    pub total_completion_ms: u64,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::QuerySubmitted { streaming, .. } => {
                    stats.queries_submitted += 1;
                    if *streaming {
                        stats.streaming_queries += 1;
                    }
                }
                TelemetryEvent::StatusReceived { .. } => {
                    stats.status_updates += 1;
                }
                TelemetryEvent::TokenReceived { bytes, .. } => {
                    stats.tokens_received += 1;
                    stats.bytes_received += bytes;
                }
                TelemetryEvent::MalformedEvent { .. } => {
                    stats.malformed_events += 1;
                }
                TelemetryEvent::QueryCompleted { duration_ms, .. } => {
                    stats.queries_completed += 1;
                    stats.total_completion_ms += duration_ms;
                }
                TelemetryEvent::QueryFailed { .. } => {
                    stats.queries_failed += 1;
                }
                TelemetryEvent::QueryCancelled { .. } => {
                    stats.queries_cancelled += 1;
                }
            }
        }

        let mut events = lock(&self.events);
        if events.len() >= MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events.iter().skip(start).cloned().collect()
    }

    /// Share of finished queries that completed
    pub fn success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        let total = stats.queries_completed + stats.queries_failed;
        if total == 0 {
            1.0
        } else {
            stats.queries_completed as f64 / total as f64
        }
    }

    /// Mean time to completion of successful queries
    pub fn average_completion_ms(&self) -> Option<u64> {
        let stats = lock(&self.stats);
        if stats.queries_completed == 0 {
            None
        } else {
            Some(stats.total_completion_ms / stats.queries_completed as u64)
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple telemetry display
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: crate::cli::Verbosity,
}

impl TelemetryDisplay {
    /// Create a new display
    pub fn new(collector: TelemetryCollector, verbosity: crate::cli::Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    /// Display summary statistics
    pub fn display_summary(&self) {
        let stats = self.collector.get_stats();
        let elapsed = self.collector.elapsed();

        eprintln!("\n{}", "Session Summary".bold().cyan());
        eprintln!("{}", "─".repeat(37).cyan());
        eprintln!("Duration:          {:?}", elapsed);
        eprintln!("Queries:           {}", stats.queries_submitted);
        eprintln!("Streaming:         {}", stats.streaming_queries);
        eprintln!("Tokens received:   {}", stats.tokens_received);
        eprintln!("Success rate:      {:.1}%", self.collector.success_rate() * 100.0);
        eprintln!("Cancelled:         {}", stats.queries_cancelled);
        if stats.malformed_events > 0 {
            eprintln!("Malformed events:  {}", stats.malformed_events.to_string().yellow());
        }
        if let Some(avg) = self.collector.average_completion_ms() {
            eprintln!("Avg completion:    {}ms", avg);
        }
        eprintln!();
    }

    /// Check if the summary should be shown
    pub fn should_show_summary(&self) -> bool {
        self.verbosity.show_events()
    }
}
