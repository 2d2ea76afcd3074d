//! docquery - Main CLI Entry Point

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use docquery::{
    cli::{Args, Commands, Config, Verbosity, API_URL_ENV},
    execution::execute_query,
    query::{ClientEvent, EventBus, StreamingQueryClient},
    repl::{DisplayManager, ReplSession},
    streaming::HttpTransport,
    telemetry::{TelemetryCollector, TelemetryDisplay},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.clone())?;
    config.apply_overrides(std::env::var(API_URL_ENV).ok(), args.api_url.as_deref())?;

    let default_verbosity =
        Verbosity::from_name(&config.display.default_verbosity).unwrap_or(Verbosity::Normal);
    let verbosity = args.verbosity_or(default_verbosity);
    init_tracing(verbosity);

    if !config.display.color_output {
        colored::control::set_override(false);
    }

    if let Err(message) = args.validate() {
        eprintln!("{} {}", "Error:".red().bold(), message);
        eprintln!("\nUsage:");
        eprintln!("  docquery <QUERY> [--stream]   Ask one question");
        eprintln!("  docquery start [--stream]     Interactive prompt");
        eprintln!("  docquery health               Check the backend");
        eprintln!("  docquery config               Show configuration");
        std::process::exit(2);
    }

    match &args.command {
        Some(Commands::Start { stream }) => {
            run_repl(&config, verbosity, *stream || args.stream).await
        }
        Some(Commands::Health) => run_health(&config).await,
        Some(Commands::Config) => {
            let path = args.config.clone().or_else(Config::default_path);
            show_config(&config, path, verbosity)
        }
        None => {
            let query = args.query.as_deref().unwrap_or_default();
            let success = run_query(&config, verbosity, query, args.stream).await?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Log to stderr; RUST_LOG takes precedence over -v/-q
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.tracing_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_transport(config: &Config) -> Result<HttpTransport> {
    Ok(
        HttpTransport::with_config(&config.api.base_url, &config.api.query_path)?
            .with_request_timeout(config.request_timeout())
            .with_max_frame_bytes(config.client.max_frame_bytes),
    )
}

fn build_client(
    config: &Config,
    telemetry: &TelemetryCollector,
) -> Result<(StreamingQueryClient, mpsc::Receiver<ClientEvent>)> {
    let (bus, events) = EventBus::with_capacity(config.client.event_buffer);
    let client = StreamingQueryClient::new(build_transport(config)?)
        .with_options(config.client_options())
        .with_event_bus(bus)
        .with_telemetry(telemetry.clone());
    Ok((client, events))
}

/// Ask a single question. Returns whether it was answered.
async fn run_query(
    config: &Config,
    verbosity: Verbosity,
    query: &str,
    stream: bool,
) -> Result<bool> {
    let telemetry = TelemetryCollector::new();
    let (client, mut events) = build_client(config, &telemetry)?;
    let mut display = DisplayManager::new(verbosity).with_spinner(config.display.show_spinner);

    let outcome =
        execute_query(&client, &mut events, &mut display, query, stream, Vec::new()).await?;

    let summary = TelemetryDisplay::new(telemetry, verbosity);
    if summary.should_show_summary() {
        summary.display_summary();
    }

    Ok(outcome.is_success())
}

/// Run the interactive prompt
async fn run_repl(config: &Config, verbosity: Verbosity, stream: bool) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let (client, mut events) = build_client(config, &telemetry)?;
    let display = DisplayManager::new(verbosity).with_spinner(config.display.show_spinner);

    let mut repl = ReplSession::with_history(config.history_path(), display, stream)?;
    repl.show_welcome(env!("CARGO_PKG_VERSION"), &config.api.base_url);
    repl.run(&client, &mut events).await?;

    let summary = TelemetryDisplay::new(telemetry, verbosity);
    if summary.should_show_summary() {
        summary.display_summary();
    }

    Ok(())
}

/// Check that the backend answers its health endpoint
async fn run_health(config: &Config) -> Result<()> {
    let transport = build_transport(config)?;
    println!("Checking {} ...", config.api.base_url.cyan());

    match transport.health_check().await {
        Ok(health) if health.is_healthy() => {
            let service = health.service.as_deref().unwrap_or("unknown service");
            println!("{} {} is {}", "✓".green(), service, health.status.green());
            Ok(())
        }
        Ok(health) => {
            println!("{} Backend reported status: {}", "✗".red(), health.status.yellow());
            std::process::exit(1);
        }
        Err(err) => {
            println!("{} {}", "✗".red(), err.to_string().red());
            std::process::exit(1);
        }
    }
}

fn show_config(config: &Config, path: Option<PathBuf>, verbosity: Verbosity) -> Result<()> {
    println!("\n{}", "docquery Configuration".bold().cyan());
    println!("{}", "=".repeat(60).cyan());

    match path.filter(|p| p.exists()) {
        Some(path) => println!("File: {}", path.display()),
        None => println!("File: (built-in defaults)"),
    }
    println!("Verbosity: {}\n", verbosity.as_str());

    let rendered = toml::to_string_pretty(config)?;
    println!("{}", rendered);
    Ok(())
}
