use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::client::{BackendClient, ClearRoute, HistorySync, RequestLog, RouteTable};
use crate::session::{FileStateStore, SessionOptions, TutorSession};
use crate::types::{Mode, Severity};

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "tutor.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "TUTOR_CONFIG_FILE")]
    pub config: Option<String>,

    /// Backend base URL
    #[arg(long, env = "TUTOR_BACKEND_URL")]
    pub base_url: Option<String>,

    /// File holding the persisted session
    #[arg(long, env = "TUTOR_STATE_FILE")]
    pub state_file: Option<String>,

    /// Disable mirroring messages to the backend history
    #[arg(long)]
    pub no_history: bool,

    /// Print UI events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Emit logs as JSON
    #[arg(long, env = "TUTOR_LOG_JSON")]
    pub log_json: bool,

    /// Print the request log after the command
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask a question; reads stdin when no text is given
    Ask {
        /// Override the session mode for this question
        #[arg(long)]
        mode: Option<Mode>,
        /// Question or code
        text: Vec<String>,
    },
    /// Show the session history stored by the backend
    History,
    /// Delete the session history on the backend
    Clear,
    /// Print the current session
    Session,
    /// List sessions known to the backend
    Sessions,
    /// Switch the session mode
    Mode {
        /// `tutor` or `debugger`
        mode: Mode,
    },
    /// Forward an editor diagnostic
    Report {
        /// File the diagnostic belongs to
        #[arg(long)]
        file: String,
        /// One-based line number
        #[arg(long)]
        line: u32,
        /// Severity label
        #[arg(long, default_value = "critical")]
        severity: Severity,
        /// Diagnostic message
        message: Vec<String>,
    },
    /// Check backend health
    Health,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub routes: RouteTable,
    pub session: SessionConfig,
    pub history: HistoryConfig,
    pub request_log: RequestLogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Namespace inside the state file.
    pub scope: String,
    pub state_file: String,
    pub default_mode: Mode,
    pub rotate_on_clear: bool,
    pub server_assigned: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub clear_route: ClearRoute,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RequestLogConfig {
    pub capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layer defaults, config file, environment and CLI flags.
    ///
    /// Priority: CLI flag > `TUTOR_` environment > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("backend.base_url", "http://127.0.0.1:8000")?
            .set_default("backend.timeout_secs", 60)?
            .set_default("backend.connect_timeout_secs", 5)?
            .set_default("routes.tutor.primary", "query")?
            .set_default("routes.tutor.fallback", "tutor_chat")?
            .set_default("routes.debugger.primary", "debugger_chat")?
            .set_default("routes.debugger.fallback", "query")?
            .set_default("session.scope", "default")?
            .set_default("session.state_file", default_state_file())?
            .set_default("session.default_mode", "tutor")?
            .set_default("session.rotate_on_clear", false)?
            .set_default("session.server_assigned", false)?
            .set_default("history.enabled", true)?
            .set_default("history.clear_route", "delete")?
            .set_default("request_log.capacity", 50)?;

        // 2. Config file: explicit path, else ./tutor.yaml when present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            builder = builder.add_source(File::from(PathBuf::from(DEFAULT_CONFIG_FILE)));
        }

        // 3. Environment variables, e.g. TUTOR_BACKEND__BASE_URL=http://host:8000
        builder = builder.add_source(
            Environment::with_prefix("TUTOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides (clap also resolves their own env vars)
        if let Some(url) = &cli.base_url {
            builder = builder.set_override("backend.base_url", url.as_str())?;
        }
        if let Some(path) = &cli.state_file {
            builder = builder.set_override("session.state_file", path.as_str())?;
        }
        if cli.no_history {
            builder = builder.set_override("history.enabled", false)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    /// HTTP client configured from the `backend`, `routes` and `history` sections.
    pub fn backend_client(&self) -> crate::Result<BackendClient> {
        let client = BackendClient::with_timeouts(
            &self.backend.base_url,
            Duration::from_secs(self.backend.timeout_secs),
            Duration::from_secs(self.backend.connect_timeout_secs),
        )?;
        Ok(client
            .with_routes(self.routes)
            .with_clear_route(self.history.clear_route)
            .with_request_log(RequestLog::new(self.request_log.capacity)))
    }

    /// Session client persisting its id in the configured state file.
    ///
    /// Must be called inside a tokio runtime.
    pub fn tutor_session(&self) -> crate::Result<TutorSession> {
        let client = self.backend_client()?;
        let store = Arc::new(FileStateStore::new(
            &self.session.state_file,
            &self.session.scope,
        ));
        let history = if self.history.enabled {
            HistorySync::spawn(client.clone())
        } else {
            HistorySync::disabled()
        };

        Ok(
            TutorSession::with_parts(client, store, self.session.default_mode, history)
                .with_options(SessionOptions {
                    rotate_on_clear: self.session.rotate_on_clear,
                    server_assigned: self.session.server_assigned,
                }),
        )
    }
}

fn default_state_file() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutor-bridge")
        .join("state.json")
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::EndpointKind;

    #[test]
    fn cli_parses_ask_with_mode() {
        let cli = Cli::try_parse_from(["tutor-bridge", "ask", "--mode", "debugger", "why", "?"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Ask {
                mode: Some(Mode::Debugger),
                text: vec!["why".into(), "?".into()],
            })
        );
    }

    #[test]
    fn cli_parses_report() {
        let cli = Cli::try_parse_from([
            "tutor-bridge",
            "report",
            "--file",
            "a.py",
            "--line",
            "4",
            "bad",
            "indent",
        ])
        .unwrap();
        let Some(Command::Report {
            file,
            line,
            severity,
            message,
        }) = cli.command
        else {
            panic!("expected report command");
        };
        assert_eq!(file, "a.py");
        assert_eq!(line, 4);
        assert_eq!(severity, Severity::Critical);
        assert_eq!(message.join(" "), "bad indent");
    }

    #[test]
    fn route_names_deserialize() {
        let table: RouteTable = serde_json::from_str(
            r#"{"tutor":{"primary":"tutor_legacy"},"debugger":{"primary":"debugger_chat","fallback":"query"}}"#,
        )
        .unwrap();
        assert_eq!(table.tutor.primary, EndpointKind::TutorLegacy);
        assert_eq!(table.tutor.fallback, None);
        assert_eq!(table.debugger.fallback, Some(EndpointKind::Query));
    }
}
