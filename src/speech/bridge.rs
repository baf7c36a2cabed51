use super::{SpeechSignal, VoiceOutput};
use crate::lock_or_recover;
use crate::{log_debug, log_debug_content};
use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// External speech process speaking newline-delimited JSON.
///
/// stdout carries `SpeechSignal` lines; stdin accepts `{"cmd":"stop"}` to cut
/// voice output short.
pub struct SpeechBridge {
    child: Child,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    signals: Receiver<SpeechSignal>,
    reader: Option<thread::JoinHandle<()>>,
}

impl SpeechBridge {
    /// Start `command_line` (shell-words syntax).
    pub fn spawn(command_line: &str) -> Result<Self> {
        let mut parts = shell_words::split(command_line.trim())
            .with_context(|| format!("failed to parse --speech-cmd '{command_line}'"))?;
        if parts.is_empty() {
            bail!("--speech-cmd is empty");
        }
        let program = parts.remove(0);
        let mut child = Command::new(&program)
            .args(&parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start speech process '{program}'"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture speech process stdout"))?;
        let stdin = child.stdin.take();

        let (tx, rx) = unbounded();
        let reader = thread::Builder::new()
            .name("aurora-speech-reader".into())
            .spawn(move || read_signals(stdout, &tx))
            .context("failed to spawn speech reader thread")?;
        log_debug(&format!("speech bridge started: {program}"));

        Ok(Self {
            child,
            stdin: Arc::new(Mutex::new(stdin)),
            signals: rx,
            reader: Some(reader),
        })
    }

    pub fn signals(&self) -> &Receiver<SpeechSignal> {
        &self.signals
    }

    /// Handle the router uses to interrupt speech.
    pub fn voice_output(&self) -> Arc<dyn VoiceOutput> {
        Arc::new(BridgeVoiceOutput {
            stdin: Arc::clone(&self.stdin),
        })
    }
}

impl Drop for SpeechBridge {
    fn drop(&mut self) {
        lock_or_recover(&self.stdin, "SpeechBridge::drop").take();
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

/// Parse signal lines until EOF. Malformed lines are logged and skipped.
pub(crate) fn read_signals(source: impl Read, tx: &Sender<SpeechSignal>) {
    for line in BufReader::new(source).lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<SpeechSignal>(trimmed) {
            Ok(signal) => {
                if tx.send(signal).is_err() {
                    break;
                }
            }
            Err(err) => {
                log_debug(&format!("ignoring malformed speech signal: {err}"));
                log_debug_content(&format!("malformed speech line: {trimmed}"));
            }
        }
    }
    log_debug("speech reader reached end of stream");
}

/// `VoiceOutput` that asks the speech process to stop talking.
pub struct BridgeVoiceOutput {
    stdin: Arc<Mutex<Option<ChildStdin>>>,
}

impl VoiceOutput for BridgeVoiceOutput {
    fn stop(&self) -> Result<()> {
        let mut guard = lock_or_recover(&self.stdin, "BridgeVoiceOutput::stop");
        let stdin = guard
            .as_mut()
            .ok_or_else(|| anyhow!("speech process stdin is closed"))?;
        stdin
            .write_all(b"{\"cmd\":\"stop\"}\n")
            .and_then(|()| stdin.flush())
            .context("failed to send stop to speech process")
    }
}
