//! HTTP transport tests against a mock backend

use docquery::errors::{QueryError, CONNECTION_ERROR_MESSAGE};
use docquery::query::{QueryState, StreamingQueryClient};
use docquery::streaming::{HttpTransport, QueryTransport, StreamEvent};
use docquery::types::{QueryRequest, Turn};
use futures_util::StreamExt;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(frames: &[serde_json::Value]) -> String {
    frames
        .iter()
        .map(|f| format!("data: {} \n\n", f))
        .collect()
}

fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::with_config(&server.uri(), "/api/query").unwrap()
}

#[tokio::test]
async fn test_buffered_query_posts_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/query"))
        .and(body_json(json!({
            "query": "How do I install it?",
            "stream": false,
            "conversation_history": [
                { "role": "user", "content": "What is the Chat SDK?" },
                { "role": "assistant", "content": "A toolkit." }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Install with npm.",
            "sources": ["install.md"],
            "metrics": { "total_time": 0.8, "steps": { "retrieval": 0.2 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = QueryRequest::new(
        "How do I install it?",
        false,
        vec![Turn::user("What is the Chat SDK?"), Turn::assistant("A toolkit.")],
    )
    .unwrap();
    let response = assert_ok!(transport(&server).query(&request).await);

    assert_eq!(response.response_text, "Install with npm.");
    assert_eq!(response.sources, vec!["install.md".to_string()]);
    assert_eq!(response.metrics.total_time_seconds, 0.8);
    assert!(response.metrics.extra.contains_key("steps"));
}

#[tokio::test]
async fn test_buffered_error_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "detail": "rate limited" })))
        .mount(&server)
        .await;

    let client = StreamingQueryClient::new(transport(&server));
    client.submit("hello", false, Vec::new()).unwrap();
    let snapshot = client.wait_for_terminal().await;

    assert_eq!(snapshot.state, QueryState::Failed);
    assert_eq!(snapshot.error.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn test_buffered_error_without_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let request = QueryRequest::new("hello", false, Vec::new()).unwrap();
    let err = assert_err!(transport(&server).query(&request).await);

    match err {
        QueryError::Server { status, message } => {
            assert_eq!(status, Some(502));
            assert!(message.contains("502"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_frames_decoded() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({ "event": "status", "data": { "message": "Searching", "status": "searching" } }),
        json!({ "event": "token", "data": { "token": "The" } }),
        json!({ "event": "token", "data": { "token": " Chat SDK" } }),
        json!({ "event": "done", "data": {} }),
    ]);
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("query", "What is the Chat SDK?"))
        .and(query_param("stream", "true"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let request = QueryRequest::new("What is the Chat SDK?", true, Vec::new()).unwrap();
    let frames: Vec<_> = transport(&server)
        .open_stream(&request)
        .await
        .unwrap()
        .collect()
        .await;

    let events: Vec<StreamEvent> = frames
        .into_iter()
        .map(|f| StreamEvent::parse(&f.unwrap()).unwrap())
        .collect();
    assert_eq!(events.len(), 4);
    assert_eq!(events[1], StreamEvent::Token("The".to_string()));
    assert_eq!(events[3], StreamEvent::Done);
}

#[tokio::test]
async fn test_streaming_client_end_to_end() {
    let server = MockServer::start().await;
    let mut body = sse(&[
        json!({ "event": "query_analysis", "data": { "enhanced_query": "chat sdk" } }),
        json!({ "event": "token", "data": { "token": "The Chat SDK" } }),
    ]);
    body.push_str(": keep-alive\n\n");
    body.push_str("data: {broken\n\n");
    body.push_str(&sse(&[
        json!({ "event": "token", "data": { "token": " is..." } }),
        json!({ "event": "response_complete", "data": {
            "sources": ["doc1.md"],
            "metrics": { "total_time": 1.2 }
        } }),
        json!({ "event": "done", "data": {} }),
    ]));
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = StreamingQueryClient::new(transport(&server));
    client.submit("What is the Chat SDK?", true, Vec::new()).unwrap();
    let snapshot = client.wait_for_terminal().await;

    assert_eq!(snapshot.state, QueryState::Completed);
    assert_eq!(snapshot.response_text(), "The Chat SDK is...");
    assert_eq!(snapshot.malformed_events, 1);
    assert_eq!(snapshot.enhanced_query.as_deref(), Some("chat sdk"));
    let response = snapshot.response.unwrap();
    assert_eq!(response.sources, vec!["doc1.md".to_string()]);
    assert_eq!(response.metrics.total_time_seconds, 1.2);
}

#[tokio::test]
async fn test_oversized_frame_counted_with_neighbours() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({ "event": "token", "data": { "token": "kept" } }),
        json!({ "event": "token", "data": { "token": "x".repeat(256) } }),
        json!({ "event": "done", "data": {} }),
    ]);
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = StreamingQueryClient::new(transport(&server).with_max_frame_bytes(128));
    client.submit("hello", true, Vec::new()).unwrap();
    let snapshot = client.wait_for_terminal().await;

    assert_eq!(snapshot.state, QueryState::Completed);
    assert_eq!(snapshot.response_text(), "kept");
    assert_eq!(snapshot.malformed_events, 1);
}

#[tokio::test]
async fn test_stream_without_done_is_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&[
            json!({ "event": "token", "data": { "token": "partial" } }),
        ])))
        .mount(&server)
        .await;

    let client = StreamingQueryClient::new(transport(&server));
    client.submit("hello", true, Vec::new()).unwrap();
    let snapshot = client.wait_for_terminal().await;

    assert_eq!(snapshot.state, QueryState::Failed);
    assert_eq!(snapshot.error.as_deref(), Some(CONNECTION_ERROR_MESSAGE));
}

#[tokio::test]
async fn test_stream_open_rejected_is_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "boom" })))
        .mount(&server)
        .await;

    let client = StreamingQueryClient::new(transport(&server));
    client.submit("hello", true, Vec::new()).unwrap();
    let snapshot = client.wait_for_terminal().await;

    assert_eq!(snapshot.error.as_deref(), Some(CONNECTION_ERROR_MESSAGE));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let transport = HttpTransport::with_config("http://127.0.0.1:9", "/api/query").unwrap();
    let client = StreamingQueryClient::new(transport);

    client.submit("hello", false, Vec::new()).unwrap();
    let snapshot = client.wait_for_terminal().await;
    assert_eq!(snapshot.state, QueryState::Failed);
    assert!(snapshot.error.is_some());
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "service": "LikeMinds RAG API"
        })))
        .mount(&server)
        .await;

    let health = assert_ok!(transport(&server).health_check().await);
    assert!(health.is_healthy());
    assert_eq!(health.service.as_deref(), Some("LikeMinds RAG API"));
}
