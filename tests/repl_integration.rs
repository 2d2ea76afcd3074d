//! Interactive prompt and shared execution tests

mod common;

use common::*;
use docquery::cli::{Config, Verbosity};
use docquery::execution::execute_query;
use docquery::query::{EventBus, QueryState, StreamingQueryClient};
use docquery::repl::{
    commands::{is_command, Command, CommandHandler},
    ConversationSession, DisplayManager, ReplSession,
};
use docquery::types::Role;
use tempfile::TempDir;

fn quiet_display() -> DisplayManager {
    DisplayManager::new(Verbosity::Quiet)
}

#[tokio::test]
async fn test_execute_streaming_query() {
    let transport = ScriptedTransport::new(vec![Script::Frames(vec![
        status("Searching"),
        token("The Chat SDK"),
        token(" is..."),
        complete(&["doc1.md"], 1.2),
        done(),
    ])]);
    let (bus, mut events) = EventBus::new();
    let client = StreamingQueryClient::new(transport).with_event_bus(bus);
    let mut display = quiet_display();

    let outcome = execute_query(
        &client,
        &mut events,
        &mut display,
        "What is the Chat SDK?",
        true,
        Vec::new(),
    )
    .await
    .unwrap();

    assert!(outcome.is_success());
    assert!(!outcome.cancelled);
    assert_eq!(outcome.snapshot.response_text(), "The Chat SDK is...");
}

#[tokio::test]
async fn test_execute_streaming_query_with_saturated_bus() {
    let mut frames: Vec<_> = (0..500).map(|i| token(&format!("{} ", i))).collect();
    frames.push(done());
    let expected: String = (0..500).map(|i| format!("{} ", i)).collect();

    let (bus, mut events) = EventBus::with_capacity(4);
    let client = StreamingQueryClient::new(ScriptedTransport::new(vec![Script::Frames(frames)]))
        .with_event_bus(bus);
    let mut display = quiet_display();

    let outcome = execute_query(&client, &mut events, &mut display, "count", true, Vec::new())
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.snapshot.response_text(), expected);
}

#[tokio::test]
async fn test_execute_empty_query_reports_validation() {
    let transport = ScriptedTransport::default();
    let (bus, mut events) = EventBus::new();
    let client = StreamingQueryClient::new(transport.clone()).with_event_bus(bus);
    let mut display = quiet_display();

    let outcome = execute_query(&client, &mut events, &mut display, "  ", false, Vec::new())
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.snapshot.state, QueryState::Idle);
    assert!(outcome.snapshot.error.is_some());
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_execute_without_event_bus() {
    let transport = ScriptedTransport::new(vec![Script::Answer(Ok(answer("ok", &[], 0.1)))]);
    let client = StreamingQueryClient::new(transport);
    let (_unused, mut events) = EventBus::new();
    let mut display = quiet_display();

    let outcome = execute_query(&client, &mut events, &mut display, "hi", false, Vec::new())
        .await
        .unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_repl_buffered_conversation() {
    let transport = ScriptedTransport::new(vec![
        Script::Answer(Ok(answer("A toolkit.", &["intro.md"], 0.3))),
        Script::Answer(Ok(answer("Use npm.", &["install.md"], 0.2))),
    ]);
    let (bus, mut events) = EventBus::new();
    let client = StreamingQueryClient::new(transport.clone()).with_event_bus(bus);
    let mut repl = ReplSession::new(quiet_display(), false).unwrap();

    repl.handle_input("What is the Chat SDK?", &client, &mut events)
        .await
        .unwrap();
    repl.handle_input("How do I install it?", &client, &mut events)
        .await
        .unwrap();

    let requests = transport.requests();
    assert!(requests[0].history().is_empty());
    assert_eq!(requests[1].history().len(), 2);
    assert_eq!(requests[1].history()[0].role, Role::User);
    assert_eq!(requests[1].history()[1].content, "A toolkit.");
}

#[tokio::test]
async fn test_repl_stream_toggle_switches_protocol() {
    let transport = ScriptedTransport::new(vec![Script::Frames(vec![token("hi"), done()])]);
    let (bus, mut events) = EventBus::new();
    let client = StreamingQueryClient::new(transport.clone()).with_event_bus(bus);
    let mut repl = ReplSession::new(quiet_display(), false).unwrap();

    assert!(repl.handle_input("/stream on", &client, &mut events).await.unwrap());
    repl.handle_input("hello", &client, &mut events).await.unwrap();

    assert_eq!(transport.stream_calls(), 1);
    assert_eq!(transport.query_calls(), 0);
    assert_eq!(repl.session().query_count(), 1);
}

#[test]
fn test_command_parsing() {
    let handler = CommandHandler::new();
    assert!(is_command("/history 3"));
    assert_eq!(handler.parse("/history 3"), Command::History { limit: Some(3) });
    assert_eq!(handler.parse("/stream off"), Command::Stream { enable: Some(false) });
}

#[test]
fn test_session_reset_clears_history() {
    let mut session = ConversationSession::new(false);
    let handler = CommandHandler::new();
    let display = quiet_display();

    handler.execute(Command::Reset, &mut session, &display).unwrap();
    assert!(session.history().is_empty());
}

#[test]
fn test_config_history_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let history = temp_dir.path().join("history");
    std::fs::write(
        &config_path,
        format!("[display]\nhistory_file = {:?}\n", history.to_string_lossy()),
    )
    .unwrap();

    let config = Config::load(Some(config_path)).unwrap();
    assert_eq!(config.history_path(), history);
}
