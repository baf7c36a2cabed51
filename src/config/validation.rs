use super::defaults::{MAX_ENGINE_ARGS, MAX_ENGINE_ARG_BYTES};
use super::{
    AppConfig, MAX_ENGINE_TIMEOUT_MS, MAX_QUEUE_CAPACITY, MIN_ENGINE_TIMEOUT_MS,
};
use anyhow::{bail, Context, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize command strings.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_ENGINE_TIMEOUT_MS..=MAX_ENGINE_TIMEOUT_MS).contains(&self.engine_timeout_ms) {
            bail!(
                "--engine-timeout-ms must be between {MIN_ENGINE_TIMEOUT_MS} and {MAX_ENGINE_TIMEOUT_MS}, got {}",
                self.engine_timeout_ms
            );
        }
        if !(1..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            bail!(
                "--queue-capacity must be between 1 and {MAX_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            );
        }

        let sentinel = self.terminate_sentinel.trim();
        if sentinel.is_empty() || sentinel.chars().any(char::is_whitespace) {
            bail!("--terminate-sentinel must be a single non-empty word");
        }
        self.terminate_sentinel = sentinel.to_string();

        if let Some(cmd) = self.engine_cmd.take() {
            self.engine_cmd = Some(sanitize_command(&cmd, "--engine-cmd")?);
        }
        if let Some(cmd) = self.speech_cmd.take() {
            self.speech_cmd = Some(sanitize_command(&cmd, "--speech-cmd")?);
        }

        if self.engine_args.len() > MAX_ENGINE_ARGS {
            bail!(
                "--engine-arg repeated too many times (max {MAX_ENGINE_ARGS}, got {})",
                self.engine_args.len()
            );
        }
        let total_arg_bytes: usize = self.engine_args.iter().map(|arg| arg.len()).sum();
        if total_arg_bytes > MAX_ENGINE_ARG_BYTES {
            bail!("combined --engine-arg length exceeds {MAX_ENGINE_ARG_BYTES} bytes");
        }

        if self.engine_cmd.is_some() && self.mock_engine {
            bail!("--engine-cmd and --mock-engine cannot be combined");
        }
        if !self.mock_replies.is_empty() && !self.mock_engine {
            bail!("--mock-reply requires --mock-engine");
        }
        if self.ephemeral && self.store_dir.is_some() {
            bail!("--ephemeral and --store-dir cannot be combined");
        }

        Ok(())
    }

    /// Startup check kept out of `validate` so `--help`/`--version` work without an engine.
    pub fn require_engine(&self) -> Result<()> {
        if self.engine_cmd.is_none() && !self.mock_engine {
            bail!("no response engine configured; pass --engine-cmd or --mock-engine");
        }
        Ok(())
    }
}

/// Trim a command line and make sure it splits into at least a program name.
pub(super) fn sanitize_command(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if trimmed.chars().any(|ch| matches!(ch, '\n' | '\r' | '\0')) {
        bail!("{flag} cannot contain control characters");
    }
    let parts = shell_words::split(trimmed)
        .with_context(|| format!("{flag} '{trimmed}' has unbalanced quotes"))?;
    if parts.first().map_or(true, |program| program.is_empty()) {
        bail!("{flag} must start with a program name");
    }
    Ok(trimmed.to_string())
}
