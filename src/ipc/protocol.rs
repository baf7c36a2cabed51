//! Newline-delimited JSON messages exchanged with an external frontend.

use crate::message::{Status, UiEvent};
use crate::speech::SpeechSignal;
use serde::{Deserialize, Serialize};

// ============================================================================
// IPC Events (Rust → client)
// ============================================================================

/// Events written to stdout, tagged by `"event"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IpcEvent {
    /// A message to show, already persisted if it needed to be.
    Message {
        content: String,
        is_user: bool,
        /// "Text", "STT", or null.
        source: Option<String>,
        /// RFC 3339 local time.
        timestamp: String,
    },

    Status { status: Status, text: String },

    /// Transient line for the status area.
    Notice { message: String },

    Error { message: String, recoverable: bool },
}

impl IpcEvent {
    pub fn status(status: Status) -> Self {
        IpcEvent::Status {
            status,
            text: status.display_text().to_string(),
        }
    }
}

impl From<UiEvent> for IpcEvent {
    fn from(event: UiEvent) -> Self {
        match event {
            UiEvent::DisplayMessage(message) => IpcEvent::Message {
                source: message.ui_source_type().map(str::to_string),
                timestamp: message.timestamp.to_rfc3339(),
                is_user: message.is_user,
                content: message.content,
            },
            UiEvent::StatusChanged(status) => IpcEvent::status(status),
            UiEvent::Notice(message) => IpcEvent::Notice { message },
        }
    }
}

// ============================================================================
// IPC Commands (client → Rust)
// ============================================================================

/// Commands read from stdin, tagged by `"cmd"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Typed text for the text-only entry point.
    SendText { text: String },
    /// Final transcript from a speech recognizer.
    Transcript { text: String },
    RecordingStart,
    RecordingStop,
    WakewordDetected,
    WakewordDetectionStart,
    AudioStreamStart,
    AudioStreamStop,
    StopVoice,
    /// Re-emit the current status.
    GetStatus,
}

impl IpcCommand {
    /// Lifecycle commands map one-to-one onto speech signals. Transcripts
    /// are submitted directly so their errors can be reported.
    pub(crate) fn speech_signal(&self) -> Option<SpeechSignal> {
        let signal = match self {
            IpcCommand::RecordingStart => SpeechSignal::RecordingStart,
            IpcCommand::RecordingStop => SpeechSignal::RecordingStop,
            IpcCommand::WakewordDetected => SpeechSignal::WakewordDetected,
            IpcCommand::WakewordDetectionStart => SpeechSignal::WakewordDetectionStart,
            IpcCommand::AudioStreamStart => SpeechSignal::AudioStreamStart,
            IpcCommand::AudioStreamStop => SpeechSignal::AudioStreamStop,
            IpcCommand::SendText { .. }
            | IpcCommand::Transcript { .. }
            | IpcCommand::StopVoice
            | IpcCommand::GetStatus => return None,
        };
        Some(signal)
    }
}
