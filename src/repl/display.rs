//! Display manager for terminal output
//!
//! Status spinner, live answer tokens, sources, and timing. The answer goes
//! to stdout; decorations are skipped in quiet mode.

use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

use crate::cli::Verbosity;

/// Display manager for query output
pub struct DisplayManager {
    current_bar: Option<ProgressBar>,
    update_interval: Duration,
    verbosity: Verbosity,
    show_spinner: bool,
}

impl DisplayManager {
    pub fn new(verbosity: Verbosity) -> Self {
        DisplayManager {
            current_bar: None,
            update_interval: Duration::from_millis(100),
            verbosity,
            show_spinner: verbosity.show_progress(),
        }
    }

    /// Disable or re-enable the status spinner
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.show_spinner = enabled && self.verbosity.show_progress();
        self
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, api_url: &str, streaming: bool) {
        let width = 64;
        let mode = if streaming { "Streaming" } else { "Buffered" };

        println!("\n{}", "=".repeat(width).cyan());
        println!(
            "{}",
            format!("  docquery {} - Documentation Assistant", version)
                .bold()
                .cyan()
        );
        println!("{}", format!("  Backend: {} | Mode: {}", api_url, mode).dimmed());
        println!("{}\n", "=".repeat(width).cyan());
        println!(
            "Ask a question (or {} for commands, {} to quit)\n",
            "/help".green(),
            "/exit".green()
        );
    }

    /// Start the status spinner
    pub fn start_status(&mut self, message: &str) {
        self.finish_current();
        if !self.show_spinner {
            return;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(self.update_interval);
        self.current_bar = Some(pb);
    }

    /// Replace the spinner message
    pub fn update_status(&self, message: &str) {
        if let Some(pb) = &self.current_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish current spinner
    pub fn finish_current(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }

    pub fn has_spinner(&self) -> bool {
        self.current_bar.is_some()
    }

    /// Print a chunk of the answer as it arrives
    pub fn stream_token(&self, token: &str) {
        print!("{}", token);
        let _ = io::stdout().flush();
    }

    /// Print a complete answer
    pub fn show_answer(&self, text: &str) {
        println!("{}", text);
    }

    /// Show the rewritten query reported by the backend
    pub fn show_enhanced_query(&self, query: &str) {
        if self.verbosity.show_events() {
            eprintln!("{} {}", "Searching for:".dimmed(), query.dimmed());
        }
    }

    /// Show documents the answer was drawn from
    pub fn show_sources(&self, sources: &[String]) {
        if sources.is_empty() || self.verbosity == Verbosity::Quiet {
            return;
        }

        self.show_section("Sources");
        for (i, source) in sources.iter().enumerate() {
            self.show_numbered(i + 1, source);
        }
    }

    /// Show backend-reported response time
    pub fn show_response_time(&self, seconds: f64) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        println!(
            "\n{} {}",
            "Response time:".dimmed(),
            format_seconds(seconds).dimmed()
        );
    }

    /// Display error message
    pub fn show_error(&mut self, error: &str) {
        self.finish_current();
        eprintln!("{} {}", "Error:".red().bold(), error.red());
    }

    /// Display warning message
    pub fn show_warning(&self, warning: &str) {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    /// Display info message
    pub fn show_info(&self, info: &str) {
        if self.verbosity.show_progress() {
            println!("{} {}", "Info:".cyan(), info);
        }
    }

    /// Clear screen
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }

    /// Show section header
    pub fn show_section(&self, title: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "-".repeat(60).cyan());
    }

    /// Show numbered item
    pub fn show_numbered(&self, index: usize, text: &str) {
        println!("  {}. {}", index.to_string().cyan(), text);
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new(Verbosity::Normal)
    }
}

/// Render seconds the way the response footer shows them
pub fn format_seconds(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{}ms", (seconds * 1000.0).round() as u64)
    } else {
        format!("{:.2}s", seconds)
    }
}
