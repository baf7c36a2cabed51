//! Routing and de-duplication between input sources, the response engine,
//! the message store, and the display.
//!
//! Every user-visible message goes through here exactly once:
//! - typed text is shown immediately and its engine echo is suppressed
//! - spoken text is shown immediately and its hook report is suppressed
//! - anything else the engine reports is shown without a source tag
//!
//! Display updates are delivered in order over a single `UiEvent` channel; the
//! caller that owns the receiver is the only consumer.

mod dispatch;
mod pending;
#[cfg(test)]
mod tests;
mod worker;

use crate::config::{AppConfig, BusyPolicy};
use crate::engine::{InputObserver, ResponseEngine, TERMINATE_SENTINEL};
use crate::error::{ChatError, ChatResult};
use crate::message::{Message, SourceTag, Status, UiEvent, Utterance, UtteranceId};
use crate::speech::{SpeechSignal, StatusRelay, StatusSink, VoiceOutput};
use crate::store::MessageStore;
use crate::utf8_safe::ellipsize;
use crate::{log_debug, log_debug_content};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver};
use dispatch::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use worker::{EntryPoint, Job, Worker, WorkerSettings};

/// Tunables for a router instance.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub busy_policy: BusyPolicy,
    /// Maximum queued plus running jobs under `BusyPolicy::Queue`.
    pub queue_capacity: usize,
    pub engine_timeout: Duration,
    pub terminate_sentinel: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::Reject,
            queue_capacity: 4,
            engine_timeout: Duration::from_secs(60),
            terminate_sentinel: TERMINATE_SENTINEL.to_string(),
        }
    }
}

impl RouterSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            busy_policy: config.busy_policy,
            queue_capacity: config.queue_capacity,
            engine_timeout: Duration::from_millis(config.engine_timeout_ms),
            terminate_sentinel: config.terminate_sentinel.clone(),
        }
    }

    fn max_pending(&self) -> usize {
        match self.busy_policy {
            BusyPolicy::Reject => 1,
            BusyPolicy::Queue => self.queue_capacity.max(1),
        }
    }
}

/// Outcome of a submit call that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted(UtteranceId),
    /// Blank input; nothing happened.
    Ignored,
}

/// What startup showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoad {
    Replayed(usize),
    Welcome,
}

/// The half of the router that exists before the engine does.
///
/// Engines take the input observer at construction, and the router needs the
/// engine, so the shared core is created first.
pub struct RoutingCore {
    dispatcher: Arc<Dispatcher>,
}

impl RoutingCore {
    /// Create the core and the display-side receiver.
    pub fn new(store: Arc<dyn MessageStore>) -> (Self, Receiver<UiEvent>) {
        let (tx, rx) = unbounded();
        let core = Self {
            dispatcher: Arc::new(Dispatcher::new(tx, store)),
        };
        (core, rx)
    }

    /// Hook to hand to the response engine.
    pub fn input_observer(&self) -> Arc<dyn InputObserver> {
        self.dispatcher.clone()
    }

    /// Status sink for speech callbacks; wrap it in a `StatusRelay` to chain
    /// further listeners.
    pub fn status_sink(&self) -> Arc<dyn StatusSink> {
        self.dispatcher.clone()
    }
}

pub struct Router {
    dispatcher: Arc<Dispatcher>,
    worker: Worker,
    voice: Arc<dyn VoiceOutput>,
    relay: StatusRelay,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        core: RoutingCore,
        engine: Arc<dyn ResponseEngine>,
        voice: Arc<dyn VoiceOutput>,
        relay: StatusRelay,
        settings: RouterSettings,
    ) -> Result<Self> {
        let worker = Worker::spawn(
            Arc::clone(&core.dispatcher),
            engine,
            WorkerSettings {
                engine_timeout: settings.engine_timeout,
                terminate_sentinel: settings.terminate_sentinel.clone(),
                capacity: settings.max_pending(),
            },
        )?;
        Ok(Self {
            dispatcher: core.dispatcher,
            worker,
            voice,
            relay,
            settings,
        })
    }

    pub fn status(&self) -> Status {
        self.dispatcher.status()
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Jobs admitted and not yet completed, queued ones included.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.with_state(|state| state.pending_jobs)
    }

    /// Show a typed message, then ask the engine for a reply on the text-only
    /// entry point.
    pub fn submit_typed_text(&self, text: &str) -> ChatResult<Submission> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            log_debug("ignoring empty typed input");
            return Ok(Submission::Ignored);
        }
        self.admit()?;
        log_debug_content(&format!("typed input: {}", ellipsize(trimmed, 30)));

        let utterance = Utterance::typed(trimmed);
        self.dispatcher
            .emit_message(Message::user(trimmed, Some(SourceTag::Text)));
        // A running job still owns the echo slot; the worker arms it for
        // queued jobs when they start.
        self.dispatcher.with_state(|state| {
            if state.pending_jobs == 1 {
                state.pending_echo.arm(trimmed);
            }
        });
        self.dispatcher.update_status(Status::Processing);
        self.enqueue(utterance, EntryPoint::TextOnly)
    }

    /// Show a transcript, then run it through the full pipeline, which may
    /// speak the reply.
    pub fn submit_spoken_text(&self, text: &str) -> ChatResult<Submission> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            log_debug("ignoring empty transcript");
            return Ok(Submission::Ignored);
        }
        self.admit()?;
        log_debug_content(&format!("spoken input: {}", ellipsize(trimmed, 30)));

        let utterance = Utterance::spoken(trimmed);
        self.dispatcher.announce_speech(utterance.id());
        self.dispatcher
            .emit_message(Message::user(trimmed, Some(SourceTag::Stt)));
        self.dispatcher.update_status(Status::Processing);
        self.enqueue(utterance, EntryPoint::Full)
    }

    /// Same routing the engine's hook performs; exposed for inputs that reach
    /// the router from outside an engine call.
    pub fn on_generic_input_observed(&self, utterance: &Utterance) {
        self.dispatcher.on_input_observed(utterance);
    }

    /// Interrupt voice output and go idle. An engine call in flight keeps
    /// running.
    pub fn stop_voice(&self) {
        if let Err(err) = self.voice.stop() {
            log_debug(&format!("voice stop failed: {err:#}"));
        }
        self.dispatcher.update_status(Status::Idle);
    }

    /// Route one signal from the speech process.
    pub fn apply_speech_signal(&self, signal: SpeechSignal) {
        match signal {
            SpeechSignal::Transcript { text } => {
                if let Err(err) = self.submit_spoken_text(&text) {
                    log_debug(&format!("transcript dropped: {err}"));
                }
            }
            other => self.relay.apply(&other),
        }
    }

    pub fn status_relay(&self) -> &StatusRelay {
        &self.relay
    }

    /// Replay today's history without writing it back, or show the welcome
    /// message when there is nothing to replay.
    pub fn load_history(&self) -> HistoryLoad {
        match self.dispatcher.store().today_messages() {
            Ok(messages) if !messages.is_empty() => {
                let count = messages.len();
                for message in messages {
                    self.dispatcher.replay(message);
                }
                log_debug(&format!("replayed {count} messages from today's history"));
                HistoryLoad::Replayed(count)
            }
            Ok(_) => {
                self.dispatcher.replay(welcome_message());
                HistoryLoad::Welcome
            }
            Err(err) => {
                let err = ChatError::LoadFailure(format!("{err:#}"));
                log_debug(&format!("{err}"));
                tracing::warn!(error = %err, "falling back to welcome message");
                self.dispatcher.replay(welcome_message());
                HistoryLoad::Welcome
            }
        }
    }

    fn admit(&self) -> ChatResult<()> {
        let max_pending = self.settings.max_pending();
        let admitted = self.dispatcher.with_state(|state| {
            if state.pending_jobs >= max_pending {
                false
            } else {
                state.pending_jobs += 1;
                true
            }
        });
        if admitted {
            Ok(())
        } else {
            log_debug("submission rejected: assistant busy");
            self.dispatcher
                .notice("Still working on the previous request; please wait.");
            Err(ChatError::Busy)
        }
    }

    fn enqueue(&self, utterance: Utterance, entry: EntryPoint) -> ChatResult<Submission> {
        let id = utterance.id();
        match self.worker.submit(Job::new(utterance, entry)) {
            Ok(()) => Ok(Submission::Accepted(id)),
            Err(err) => {
                log_debug(&format!("failed to queue job: {err}"));
                self.dispatcher.with_state(|state| {
                    state.pending_jobs = state.pending_jobs.saturating_sub(1);
                    if state.pending_jobs == 0 {
                        self.dispatcher.apply_status(state, Status::Idle);
                    }
                });
                Err(err)
            }
        }
    }
}

/// Shown when there is no history for today. Display-only.
pub fn welcome_message() -> Message {
    Message::assistant(format!(
        "# Welcome to Aurora AI Assistant v{}\n\n\
         You can talk to me in two ways:\n\
         - Say **\"Jarvis\"** and speak your question\n\
         - Type a message below and press **Enter**\n\n\
         ## Features\n\
         - Answers in text and speech\n\
         - Today's conversation is saved and restored on restart\n\
         - Markdown replies with code, lists, and tables\n\n\
         **Start by asking a question!**",
        env!("CARGO_PKG_VERSION")
    ))
}
