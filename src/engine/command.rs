use super::{InputObserver, ResponseEngine};
use crate::config::AppConfig;
use crate::message::{Origin, Utterance};
use crate::utf8_safe::ellipsize;
use crate::{log_debug, log_debug_content};
use anyhow::{anyhow, bail, Context, Result};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strip_ansi_escapes::strip;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Which entry point launched the command, exported as `AURORA_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Text,
    Voice,
}

impl EngineMode {
    fn as_env(self) -> &'static str {
        match self {
            EngineMode::Text => "text",
            EngineMode::Voice => "voice",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandEngineSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandEngineSettings {
    /// Split `--engine-cmd` with shell rules and append `--engine-arg` values.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let raw = config
            .engine_cmd
            .as_deref()
            .ok_or_else(|| anyhow!("no --engine-cmd configured"))?;
        let mut parts = shell_words::split(raw.trim())
            .with_context(|| format!("failed to parse --engine-cmd '{raw}'"))?;
        if parts.is_empty() {
            bail!("--engine-cmd is empty");
        }
        let program = parts.remove(0);
        parts.extend(config.engine_args.iter().cloned());
        Ok(Self {
            program,
            args: parts,
            timeout: Duration::from_millis(config.engine_timeout_ms),
        })
    }
}

/// Runs one external process per request: input on stdin, reply on stdout.
pub struct CommandEngine {
    settings: CommandEngineSettings,
    observer: Arc<dyn InputObserver>,
}

impl CommandEngine {
    #[must_use]
    pub fn new(settings: CommandEngineSettings, observer: Arc<dyn InputObserver>) -> Self {
        Self { settings, observer }
    }

    fn run(&self, text: &str, mode: EngineMode, origin: Origin) -> Result<String> {
        log_debug_content(&format!(
            "engine command input ({}): {}",
            mode.as_env(),
            ellipsize(text, 30)
        ));
        let started = Instant::now();
        let mut child = Command::new(&self.settings.program)
            .args(&self.settings.args)
            .env("AURORA_MODE", mode.as_env())
            .env("AURORA_ORIGIN", origin.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start engine '{}'", self.settings.program))?;

        // Written off-thread so a child that never reads stdin cannot hold
        // off the deadline. A child that exits without reading is not an error.
        let _stdin_writer = child.stdin.take().map(|mut stdin| {
            let input = text.as_bytes().to_vec();
            thread::spawn(move || {
                let _ = stdin.write_all(&input);
            })
        });
        let mut stdout_pipe = child
            .stdout
            .take()
            .context("failed to capture engine stdout")?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .context("failed to capture engine stderr")?;
        let stdout_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf);
            buf
        });
        let stderr_handle = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf);
            buf
        });

        let deadline = started + self.settings.timeout;
        let status = loop {
            match child.try_wait().context("polling engine process")? {
                Some(status) => break status,
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        bail!(
                            "engine '{}' timed out after {} ms",
                            self.settings.program,
                            self.settings.timeout.as_millis()
                        );
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = stdout_handle
            .join()
            .map_err(|_| anyhow!("engine stdout reader panicked"))?;
        let stderr = stderr_handle
            .join()
            .map_err(|_| anyhow!("engine stderr reader panicked"))?;
        if !status.success() {
            bail!("engine exited with {status}: {}", stderr.trim());
        }

        let reply = String::from_utf8_lossy(&strip(&stdout)).trim().to_string();
        log_debug(&format!(
            "engine command finished in {} ms ({} bytes)",
            started.elapsed().as_millis(),
            reply.len()
        ));
        Ok(reply)
    }
}

impl ResponseEngine for CommandEngine {
    fn process_text_input(&self, text: &str) -> Result<String> {
        self.observer.on_input_observed(&Utterance::typed(text));
        self.run(text, EngineMode::Text, Origin::Text)
    }

    fn stream_graph_updates(&self, utterance: &Utterance) -> Result<String> {
        self.observer.on_input_observed(utterance);
        self.run(utterance.text(), EngineMode::Voice, utterance.origin())
    }
}
