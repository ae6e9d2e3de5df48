//! Tutor Bridge command line front-end.
//!
//! Stands in for an editor panel: each subcommand maps to one user action.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::unused_async)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::info;

use tutor_bridge::config::{AppConfig, Cli, Command};
use tutor_bridge::events::{EventSink, UiEvent, event_line};
use tutor_bridge::telemetry::{self, LogFormat};
use tutor_bridge::types::Severity;
use tutor_bridge::{Message, Mode, Role, TutorSession};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Prints every UI event as a JSON line on stdout.
#[derive(Debug, Default)]
struct JsonLineSink {
    error_emitted: AtomicBool,
}

impl JsonLineSink {
    /// Whether an error event went out since the last call.
    fn take_error_emitted(&self) -> bool {
        self.error_emitted.swap(false, Ordering::SeqCst)
    }
}

impl EventSink for JsonLineSink {
    fn emit(&self, event: UiEvent) {
        if matches!(event, UiEvent::Error { .. }) {
            self.error_emitted.store(true, Ordering::SeqCst);
        }
        println!("{}", event_line(&event));
    }
}

fn user_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<tutor_bridge::Error>() {
        Some(err) => err.user_message(),
        None => format!("{e:#}"),
    }
}

/// JSON line to print for a failed command, unless the sink already
/// reported the failure.
fn json_error_line(e: &anyhow::Error, sink: &JsonLineSink) -> Option<String> {
    if sink.take_error_emitted() {
        return None;
    }
    Some(event_line(&UiEvent::Error {
        message: user_message(e),
    }))
}

fn surface_error(e: &anyhow::Error, sink: Option<&JsonLineSink>) {
    match sink {
        Some(sink) => {
            if let Some(line) = json_error_line(e, sink) {
                println!("{line}");
            }
        }
        None => eprintln!("{}", user_message(e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    telemetry::init(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    let config = match AppConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", tutor_bridge::Error::from(e).user_message());
            std::process::exit(2);
        }
    };
    info!(
        name: "app.start",
        base_url = %config.backend.base_url,
        state_file = %config.session.state_file,
        "Tutor bridge starting"
    );

    let json_sink = cli.json.then(|| Arc::new(JsonLineSink::default()));
    let mut session = config.tutor_session()?;
    if let Some(sink) = &json_sink {
        session = session.with_sink(Arc::clone(sink) as Arc<dyn EventSink>);
    }

    let outcome = run(&session, cli.command.clone(), json_sink.as_deref()).await;

    // Queued history writes are attempted before the process exits.
    session.flush_history().await;

    if cli.verbose {
        for entry in session.request_log().entries() {
            eprintln!(
                "{} {} {:?} {}ms {}",
                entry.started_at.format("%H:%M:%S"),
                entry.endpoint,
                entry.status,
                entry.duration_ms,
                entry.error.as_deref().unwrap_or("")
            );
        }
    }

    if let Err(e) = outcome {
        surface_error(&e, json_sink.as_deref());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    session: &TutorSession,
    command: Option<Command>,
    sink: Option<&JsonLineSink>,
) -> Result<()> {
    match command {
        None => repl(session, sink).await,
        Some(command) => execute(session, command, sink.is_some()).await,
    }
}

async fn execute(session: &TutorSession, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Ask { mode, text } => {
            let text = if text.is_empty() {
                let mut buf = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut buf)
                    .await
                    .context("failed to read question from stdin")?;
                buf
            } else {
                text.join(" ")
            };
            ask(session, &text, mode, json).await
        }
        Command::History => {
            let messages = session.load_history().await;
            if !json {
                print_messages(&messages);
            }
            Ok(())
        }
        Command::Clear => {
            let next = session.clear_history().await?;
            if !json {
                println!("History cleared. Session: {}", next.id);
            }
            Ok(())
        }
        Command::Session => {
            let current = session.ensure_session().await?;
            println!("{}", serde_json::to_string_pretty(&current)?);
            Ok(())
        }
        Command::Sessions => {
            let sessions = session.client().list_sessions().await?;
            if json {
                println!("{}", serde_json::to_string(&sessions)?);
            } else {
                for s in sessions {
                    println!(
                        "{}  {} messages  {}",
                        s.session_id,
                        s.message_count,
                        s.updated_at.as_deref().unwrap_or("-")
                    );
                }
            }
            Ok(())
        }
        Command::Mode { mode } => {
            let current = session.set_mode(mode).await?;
            if !json {
                println!("Mode set to {}", current.mode);
            }
            Ok(())
        }
        Command::Report {
            file,
            line,
            severity,
            message,
        } => report(session, file, line, severity, message.join(" ")).await,
        Command::Health => {
            let health = session.client().health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
    }
}

async fn ask(session: &TutorSession, text: &str, mode: Option<Mode>, json: bool) -> Result<()> {
    let reply = match mode {
        Some(mode) => session.ask_with_mode(text, mode).await?,
        None => session.ask(text).await?,
    };
    if !json {
        println!("{}", reply.render());
    }
    Ok(())
}

async fn report(
    session: &TutorSession,
    file: String,
    line: u32,
    severity: Severity,
    message: String,
) -> Result<()> {
    let handle = session
        .report_diagnostic(file, line, message, severity)
        .await?;
    handle.await.context("diagnostic task panicked")?;
    Ok(())
}

/// Line-oriented loop: plain lines are questions, `/`-commands manage the session.
async fn repl(session: &TutorSession, sink: Option<&JsonLineSink>) -> Result<()> {
    let json = sink.is_some();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(sink) = sink {
            sink.take_error_emitted();
        }

        let outcome = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/clear", _) => execute(session, Command::Clear, json).await,
            ("/history", _) => execute(session, Command::History, json).await,
            ("/session", _) => execute(session, Command::Session, json).await,
            ("/mode", arg) => match arg.parse::<Mode>() {
                Ok(mode) => execute(session, Command::Mode { mode }, json).await,
                Err(e) => Err(anyhow::anyhow!(e)),
            },
            _ => ask(session, line, None, json).await,
        };

        if let Err(e) = outcome {
            surface_error(&e, sink);
        }
    }
    Ok(())
}

fn print_messages(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages yet.");
        return;
    }
    for m in messages {
        let who = match m.role {
            Role::User => "you",
            Role::Assistant => "tutor",
            Role::System => "system",
        };
        println!("[{}] {who}: {}", m.timestamp.format("%Y-%m-%d %H:%M"), m.content);
    }
}
