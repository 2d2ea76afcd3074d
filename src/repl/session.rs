//! Conversation session for the interactive prompt
//!
//! Keeps the turns sent as conversation history with buffered queries, a
//! log of answered questions, and the current streaming preference.

use std::collections::VecDeque;
use std::time::Instant;

use crate::query::QuerySnapshot;
use crate::types::Turn;

/// Maximum number of query records to keep
const MAX_RECORDS: usize = 1000;

/// Maximum number of turns carried as conversation history
pub const MAX_HISTORY_TURNS: usize = 20;

/// Record of one question asked in the session
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub query: String,
    pub success: bool,
    pub streaming: bool,
    pub duration_ms: u64,
    pub sources: Vec<String>,
}

/// Interactive session state
pub struct ConversationSession {
    turns: VecDeque<Turn>,
    records: VecDeque<QueryRecord>,
    streaming: bool,
    started: Instant,
}

impl ConversationSession {
    pub fn new(streaming: bool) -> Self {
        ConversationSession {
            turns: VecDeque::with_capacity(MAX_HISTORY_TURNS),
            records: VecDeque::new(),
            streaming,
            started: Instant::now(),
        }
    }

    /// Record the outcome of a query.
    ///
    /// Only completed answers join the conversation history; failed and
    /// cancelled queries are logged but not replayed to the backend.
    pub fn record(&mut self, query: &str, snapshot: &QuerySnapshot, duration_ms: u64) {
        let success = snapshot.is_completed();

        if success {
            self.push_turn(Turn::user(query));
            self.push_turn(Turn::assistant(snapshot.response_text()));
        }

        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(QueryRecord {
            query: query.to_string(),
            success,
            streaming: self.streaming,
            duration_ms,
            sources: snapshot
                .response
                .as_ref()
                .map(|r| r.sources.clone())
                .unwrap_or_default(),
        });
    }

    fn push_turn(&mut self, turn: Turn) {
        if self.turns.len() >= MAX_HISTORY_TURNS {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Conversation history to send with the next query
    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Most recent records, newest first
    pub fn get_records(&self, limit: usize) -> Vec<&QueryRecord> {
        self.records.iter().rev().take(limit).collect()
    }

    pub fn query_count(&self) -> usize {
        self.records.len()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Seconds since the session started or was reset
    pub fn session_duration(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Forget the conversation and the query log
    pub fn reset(&mut self) {
        self.turns.clear();
        self.records.clear();
        self.started = Instant::now();
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(false)
    }
}
