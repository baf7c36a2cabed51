//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    default_store_dir, DEFAULT_ENGINE_TIMEOUT_MS, DEFAULT_QUEUE_CAPACITY, MAX_ENGINE_TIMEOUT_MS,
    MAX_QUEUE_CAPACITY, MIN_ENGINE_TIMEOUT_MS,
};

/// What to do with a submission while an earlier one is still being answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum BusyPolicy {
    /// Refuse new input until the assistant is idle again.
    #[default]
    Reject,
    /// Accept input and answer it in order, up to `--queue-capacity` pending requests.
    Queue,
}

/// CLI options for the Aurora chat window.
#[derive(Debug, Parser, Clone)]
#[command(about = "Aurora voice/text assistant chat", author, version)]
pub struct AppConfig {
    /// Directory holding one history file per day
    #[arg(long = "store-dir", env = "AURORA_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Keep history in memory only (nothing written to disk)
    #[arg(long = "ephemeral", default_value_t = false)]
    pub ephemeral: bool,

    /// Command that answers one request (input on stdin, reply on stdout)
    #[arg(long = "engine-cmd", env = "AURORA_ENGINE_CMD")]
    pub engine_cmd: Option<String>,

    /// Extra arguments for the engine command (repeatable)
    #[arg(long = "engine-arg", action = ArgAction::Append, value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Use the built-in scripted engine instead of an external command
    #[arg(long = "mock-engine", default_value_t = false)]
    pub mock_engine: bool,

    /// Reply for the scripted engine (repeatable, cycled; echoes input when omitted)
    #[arg(long = "mock-reply", action = ArgAction::Append, value_name = "TEXT")]
    pub mock_replies: Vec<String>,

    /// Maximum time to wait for one engine reply (milliseconds)
    #[arg(
        long = "engine-timeout-ms",
        env = "AURORA_ENGINE_TIMEOUT_MS",
        default_value_t = DEFAULT_ENGINE_TIMEOUT_MS
    )]
    pub engine_timeout_ms: u64,

    /// Engine reply that means "say nothing"
    #[arg(long = "terminate-sentinel", default_value = "END")]
    pub terminate_sentinel: String,

    /// Behaviour when input arrives while a request is still running
    #[arg(long = "busy-policy", value_enum, default_value_t = BusyPolicy::Reject)]
    pub busy_policy: BusyPolicy,

    /// Pending request limit for --busy-policy queue
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Speech process emitting JSON-lines transcripts and lifecycle events
    #[arg(long = "speech-cmd", env = "AURORA_SPEECH_CMD")]
    pub speech_cmd: Option<String>,

    /// Start with the dark colour scheme
    #[arg(long = "dark-mode", env = "AURORA_DARK_MODE", default_value_t = false)]
    pub dark_mode: bool,

    /// Log every speech/voice callback (needs --logs)
    #[arg(long = "debug", env = "AURORA_DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "AURORA_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "AURORA_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging message snippets (debug log only)
    #[arg(long = "log-content", env = "AURORA_LOG_CONTENT", default_value_t = false)]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,

    /// Run in JSON IPC mode for external frontends (no TUI)
    #[arg(long = "json-ipc", default_value_t = false)]
    pub json_ipc: bool,
}

impl AppConfig {
    /// History directory, falling back to the per-user default.
    pub fn resolved_store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(default_store_dir)
    }

    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }
}
