//! Scripted in-memory transport shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docquery::errors::{QueryError, Result};
use docquery::streaming::{FrameStream, QueryTransport};
use docquery::types::{QueryRequest, QueryResponse};
use futures_util::stream;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

/// What the transport does for one call
pub enum Script {
    /// Buffered call resolves immediately
    Answer(Result<QueryResponse>),
    /// Buffered call resolves when the sender fires
    Deferred(oneshot::Receiver<Result<QueryResponse>>),
    /// Stream yields these frames, then ends
    Frames(Vec<Result<String>>),
    /// Stream yields whatever the test pushes; ends when the sender drops
    Live(mpsc::UnboundedReceiver<Result<String>>),
    /// Opening the stream fails
    RefuseStream(QueryError),
}

/// Transport answering calls from a queue of scripts
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<QueryRequest>>>,
    query_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            ..Self::default()
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.query_calls() + self.stream_calls()
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_script(&self, request: &QueryRequest) -> Script {
        self.requests.lock().unwrap().push(request.clone());
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no script left for this call")
    }
}

#[async_trait]
impl QueryTransport for ScriptedTransport {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_script(request) {
            Script::Answer(result) => result,
            Script::Deferred(receiver) => receiver
                .await
                .unwrap_or_else(|_| Err(QueryError::Transport("dropped".to_string()))),
            _ => panic!("stream script used for a buffered query"),
        }
    }

    async fn open_stream(&self, request: &QueryRequest) -> Result<FrameStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_script(request) {
            Script::Frames(frames) => Ok(Box::pin(stream::iter(frames))),
            Script::Live(receiver) => Ok(Box::pin(stream::unfold(receiver, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Script::RefuseStream(err) => Err(err),
            _ => panic!("buffered script used for a streaming query"),
        }
    }
}

/// Serialized stream envelope
pub fn frame(event: &str, data: Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

pub fn status(message: &str) -> Result<String> {
    Ok(frame("status", json!({ "message": message, "status": "searching" })))
}

pub fn token(text: &str) -> Result<String> {
    Ok(frame("token", json!({ "token": text })))
}

pub fn complete(sources: &[&str], total_time: f64) -> Result<String> {
    Ok(frame(
        "response_complete",
        json!({ "sources": sources, "metrics": { "total_time": total_time } }),
    ))
}

pub fn done() -> Result<String> {
    Ok(frame("done", json!({})))
}

pub fn answer(text: &str, sources: &[&str], total_time: f64) -> QueryResponse {
    serde_json::from_value(json!({
        "response": text,
        "sources": sources,
        "metrics": { "total_time": total_time }
    }))
    .unwrap()
}
