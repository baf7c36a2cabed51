//! Speech-side collaborators.
//!
//! The speech engine reports recording and wake-word lifecycle events, the
//! voice-output engine reports audio stream start/stop. Listeners are
//! injected at construction time; a `StatusRelay` updates the assistant status
//! and then forwards each callback to whatever listener was registered before
//! it.

mod bridge;

pub use bridge::{BridgeVoiceOutput, SpeechBridge};

use crate::log_debug;
use crate::message::Status;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle callbacks from the speech recognizer.
pub trait SpeechListener: Send + Sync {
    fn on_recording_start(&self) {}
    fn on_recording_stop(&self) {}
    fn on_wakeword_detected(&self) {}
    fn on_wakeword_detection_start(&self) {}
}

/// Lifecycle callbacks from the voice-output engine.
pub trait VoiceOutputListener: Send + Sync {
    fn on_audio_stream_start(&self) {}
    fn on_audio_stream_stop(&self) {}
}

/// Control surface of the voice-output engine.
pub trait VoiceOutput: Send + Sync {
    /// Stop any speech in progress. Fire-and-forget.
    fn stop(&self) -> Result<()>;
}

/// Voice output used when nothing can speak.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentVoiceOutput;

impl VoiceOutput for SilentVoiceOutput {
    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Receives status transitions derived from speech callbacks.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: Status);
}

/// Updates status on every speech/voice callback, then delegates to the
/// previously registered listeners.
pub struct StatusRelay {
    sink: Arc<dyn StatusSink>,
    next_speech: Option<Arc<dyn SpeechListener>>,
    next_voice: Option<Arc<dyn VoiceOutputListener>>,
}

impl StatusRelay {
    #[must_use]
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            next_speech: None,
            next_voice: None,
        }
    }

    #[must_use]
    pub fn chain_speech(mut self, previous: Arc<dyn SpeechListener>) -> Self {
        self.next_speech = Some(previous);
        self
    }

    #[must_use]
    pub fn chain_voice(mut self, previous: Arc<dyn VoiceOutputListener>) -> Self {
        self.next_voice = Some(previous);
        self
    }

    /// Route one bridged signal to the matching callback. Transcripts are
    /// not status events and are ignored here.
    pub fn apply(&self, signal: &SpeechSignal) {
        match signal {
            SpeechSignal::Transcript { .. } => {}
            SpeechSignal::RecordingStart => self.on_recording_start(),
            SpeechSignal::RecordingStop => self.on_recording_stop(),
            SpeechSignal::WakewordDetected => self.on_wakeword_detected(),
            SpeechSignal::WakewordDetectionStart => self.on_wakeword_detection_start(),
            SpeechSignal::AudioStreamStart => self.on_audio_stream_start(),
            SpeechSignal::AudioStreamStop => self.on_audio_stream_stop(),
        }
    }

    fn relay_speech(&self, status: Status, forward: impl FnOnce(&dyn SpeechListener)) {
        self.sink.set_status(status);
        if let Some(next) = self.next_speech.as_deref() {
            forward(next);
        }
    }

    fn relay_voice(&self, status: Status, forward: impl FnOnce(&dyn VoiceOutputListener)) {
        self.sink.set_status(status);
        if let Some(next) = self.next_voice.as_deref() {
            forward(next);
        }
    }
}

impl SpeechListener for StatusRelay {
    fn on_recording_start(&self) {
        self.relay_speech(Status::Listening, |next| next.on_recording_start());
    }

    fn on_recording_stop(&self) {
        self.relay_speech(Status::Processing, |next| next.on_recording_stop());
    }

    fn on_wakeword_detected(&self) {
        self.relay_speech(Status::Listening, |next| next.on_wakeword_detected());
    }

    fn on_wakeword_detection_start(&self) {
        self.relay_speech(Status::Idle, |next| next.on_wakeword_detection_start());
    }
}

impl VoiceOutputListener for StatusRelay {
    fn on_audio_stream_start(&self) {
        self.relay_voice(Status::Speaking, |next| next.on_audio_stream_start());
    }

    fn on_audio_stream_stop(&self) {
        self.relay_voice(Status::Idle, |next| next.on_audio_stream_stop());
    }
}

/// Writes every callback to the debug log. Installed first so the relay
/// chains to it when `--debug` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeechLogListener;

impl SpeechListener for SpeechLogListener {
    fn on_recording_start(&self) {
        log_debug("speech: recording started");
    }

    fn on_recording_stop(&self) {
        log_debug("speech: recording stopped");
    }

    fn on_wakeword_detected(&self) {
        log_debug("speech: wake word detected");
    }

    fn on_wakeword_detection_start(&self) {
        log_debug("speech: waiting for wake word");
    }
}

impl VoiceOutputListener for SpeechLogListener {
    fn on_audio_stream_start(&self) {
        log_debug("voice: audio stream started");
    }

    fn on_audio_stream_stop(&self) {
        log_debug("voice: audio stream stopped");
    }
}

/// Newline-delimited JSON emitted by an external speech process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpeechSignal {
    /// Final recognized text for one utterance.
    Transcript { text: String },
    RecordingStart,
    RecordingStop,
    WakewordDetected,
    WakewordDetectionStart,
    AudioStreamStart,
    AudioStreamStop,
}
