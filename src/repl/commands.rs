//! Command handler for interactive prompt built-ins
//!
//! Lines starting with `/` are commands; anything else is a question.

use anyhow::Result;
use colored::*;

use crate::repl::display::DisplayManager;
use crate::repl::session::ConversationSession;

/// Prompt command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History { limit: Option<usize> },
    Status,
    /// `None` toggles
    Stream { enable: Option<bool> },
    Reset,
    Exit,
    Clear,
    Unknown { input: String },
}

/// Command handler for parsing and executing prompt commands
#[derive(Debug, Default)]
pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        CommandHandler
    }

    /// Parse input string into a command
    pub fn parse(&self, input: &str) -> Command {
        let trimmed = input.trim();

        let Some(body) = trimmed.strip_prefix('/') else {
            return Command::Unknown {
                input: input.to_string(),
            };
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        let Some(name) = parts.first() else {
            return Command::Unknown {
                input: input.to_string(),
            };
        };

        match name.to_lowercase().as_str() {
            "help" | "h" => Command::Help,
            "exit" | "quit" | "q" => Command::Exit,
            "history" => {
                let limit = parts.get(1).and_then(|s| s.parse().ok());
                Command::History { limit }
            }
            "status" => Command::Status,
            "stream" => match parts.get(1).map(|s| s.to_lowercase()) {
                None => Command::Stream { enable: None },
                Some(arg) => match arg.as_str() {
                    "on" | "1" | "true" => Command::Stream { enable: Some(true) },
                    "off" | "0" | "false" => Command::Stream { enable: Some(false) },
                    _ => Command::Unknown {
                        input: input.to_string(),
                    },
                },
            },
            "reset" => Command::Reset,
            "clear" | "cls" => Command::Clear,
            _ => Command::Unknown {
                input: input.to_string(),
            },
        }
    }

    /// Execute a command
    ///
    /// Returns true if the prompt should continue, false if it should exit
    pub fn execute(
        &self,
        command: Command,
        session: &mut ConversationSession,
        display: &DisplayManager,
    ) -> Result<bool> {
        match command {
            Command::Help => self.show_help(),
            Command::Exit => {
                println!("{}", "Goodbye!".green());
                return Ok(false);
            }
            Command::History { limit } => self.show_history(session, limit.unwrap_or(10)),
            Command::Status => self.show_status(session),
            Command::Stream { enable } => {
                let streaming = enable.unwrap_or(!session.is_streaming());
                session.set_streaming(streaming);
                let mode = if streaming { "enabled" } else { "disabled" };
                println!("{}", format!("Streaming {}", mode).cyan());
            }
            Command::Reset => {
                session.reset();
                println!("{}", "Session reset. Conversation cleared.".yellow());
            }
            Command::Clear => display.clear_screen()?,
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
            }
        }
        Ok(true)
    }

    fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let commands = [
            ("/help, /h", "Show this help message"),
            ("/history [n]", "Show last n questions (default: 10)"),
            ("/status", "Show session status"),
            ("/stream [on|off]", "Toggle streaming answers"),
            ("/reset", "Clear conversation history"),
            ("/clear, /cls", "Clear screen"),
            ("/exit, /quit, /q", "Exit"),
        ];

        for (cmd, desc) in commands {
            println!("  {:<20} {}", cmd.green(), desc);
        }

        println!("\n{}", "Usage:".bold());
        println!("  - Type your question directly (no / prefix)");
        println!("  - Press {} during an answer to cancel it", "Ctrl-C".cyan());
        println!("  - Press {} or {} to exit", "Ctrl-D".cyan(), "/exit".cyan());
        println!();
    }

    fn show_history(&self, session: &ConversationSession, limit: usize) {
        let records = session.get_records(limit);

        if records.is_empty() {
            println!("{}", "No questions in history yet.".yellow());
            return;
        }

        println!(
            "\n{}",
            format!("Query History (last {}):", records.len()).bold().cyan()
        );
        println!("{}", "=".repeat(60).cyan());

        for (i, record) in records.iter().enumerate() {
            let index = records.len() - i;
            let status_icon = if record.success { "✓".green() } else { "✗".red() };
            let duration = format!("({}ms)", record.duration_ms).dimmed();

            println!(
                "  {}. {} {} {}",
                index.to_string().cyan(),
                status_icon,
                record.query,
                duration
            );
            if !record.sources.is_empty() {
                println!("     {}", record.sources.join(", ").dimmed());
            }
        }
        println!();
    }

    fn show_status(&self, session: &ConversationSession) {
        println!("\n{}", "Session Status:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let duration = session.session_duration();
        let minutes = duration / 60;
        let seconds = duration % 60;
        let duration_str = if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        };

        println!("  Questions:        {}", session.query_count().to_string().green());
        println!("  History Turns:    {}", session.turn_count().to_string().green());
        println!("  Session Duration: {}", duration_str.green());
        println!(
            "  Streaming:        {}",
            if session.is_streaming() { "On".green() } else { "Off".red() }
        );
        println!();
    }
}

/// Check if input is a command (starts with /)
pub fn is_command(input: &str) -> bool {
    input.trim().starts_with('/')
}
