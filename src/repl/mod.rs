//! Interactive prompt for asking follow-up questions
//!
//! Reads questions with rustyline, runs them through the shared
//! [`execute_query`](crate::execution::execute_query) path, and keeps the
//! conversation history sent with buffered queries.

pub mod commands;
pub mod display;
pub mod input;
pub mod session;

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::execution::execute_query;
use crate::query::{ClientEvent, StreamingQueryClient};
use crate::repl::commands::{is_command, CommandHandler};
pub use crate::repl::display::DisplayManager;
use crate::repl::input::InputHandler;
pub use crate::repl::session::{ConversationSession, QueryRecord};

/// Interactive session coordinator
pub struct ReplSession {
    input_handler: InputHandler,
    command_handler: CommandHandler,
    session: ConversationSession,
    display: DisplayManager,
}

impl ReplSession {
    pub fn new(display: DisplayManager, streaming: bool) -> Result<Self> {
        Ok(ReplSession {
            input_handler: InputHandler::new()?,
            command_handler: CommandHandler::new(),
            session: ConversationSession::new(streaming),
            display,
        })
    }

    /// Create session with persistent prompt history
    pub fn with_history(
        history_path: PathBuf,
        display: DisplayManager,
        streaming: bool,
    ) -> Result<Self> {
        Ok(ReplSession {
            input_handler: InputHandler::with_history(history_path)?,
            command_handler: CommandHandler::new(),
            session: ConversationSession::new(streaming),
            display,
        })
    }

    pub fn show_welcome(&self, version: &str, api_url: &str) {
        self.display
            .show_banner(version, api_url, self.session.is_streaming());
    }

    /// Run until `/exit` or end of input
    pub async fn run(
        &mut self,
        client: &StreamingQueryClient,
        events: &mut mpsc::Receiver<ClientEvent>,
    ) -> Result<()> {
        while let Some(input) = self.input_handler.read_line()? {
            if !self.handle_input(&input, client, events).await? {
                break;
            }
        }

        self.save()
    }

    /// Handle one line. Returns false to exit.
    pub async fn handle_input(
        &mut self,
        input: &str,
        client: &StreamingQueryClient,
        events: &mut mpsc::Receiver<ClientEvent>,
    ) -> Result<bool> {
        if input.trim().is_empty() {
            return Ok(true);
        }

        if is_command(input) {
            let command = self.command_handler.parse(input);
            return self
                .command_handler
                .execute(command, &mut self.session, &self.display);
        }

        let streaming = self.session.is_streaming();
        let outcome = execute_query(
            client,
            events,
            &mut self.display,
            input,
            streaming,
            self.session.history(),
        )
        .await?;

        if !outcome.cancelled {
            self.session
                .record(input, &outcome.snapshot, outcome.duration_ms);
        }
        println!();
        Ok(true)
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ConversationSession {
        &mut self.session
    }

    /// Save prompt history
    pub fn save(&mut self) -> Result<()> {
        self.input_handler.save_history()
    }
}
