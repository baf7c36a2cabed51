use super::pending::{AnnouncedSpeech, PendingEcho};
use crate::engine::InputObserver;
use crate::error::ChatError;
use crate::lock_or_recover;
use crate::message::{Message, SourceTag, Status, UiEvent, Utterance, UtteranceId};
use crate::speech::StatusSink;
use crate::store::{persist, MessageStore};
use crate::utf8_safe::ellipsize;
use crate::{log_debug, log_debug_content};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct RoutingState {
    pub(crate) pending_echo: PendingEcho,
    pub(crate) announced: AnnouncedSpeech,
    pub(crate) status: Status,
    /// Jobs queued or running on the worker.
    pub(crate) pending_jobs: usize,
}

/// Shared half of the router: everything the worker, the engine's input hook,
/// and the speech relay need to reach the display and the store.
pub(crate) struct Dispatcher {
    events: Sender<UiEvent>,
    store: Arc<dyn MessageStore>,
    state: Mutex<RoutingState>,
}

impl Dispatcher {
    pub(crate) fn new(events: Sender<UiEvent>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            events,
            store,
            state: Mutex::new(RoutingState::default()),
        }
    }

    pub(crate) fn store(&self) -> &dyn MessageStore {
        self.store.as_ref()
    }

    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut RoutingState) -> T) -> T {
        let mut state = lock_or_recover(&self.state, "Dispatcher::with_state");
        f(&mut state)
    }

    /// Persist `message` and show it. A failed write is logged; the message
    /// is shown regardless.
    pub(crate) fn emit_message(&self, message: Message) {
        if let Err(err) = persist(self.store.as_ref(), &message) {
            let err = ChatError::StoreFailure(format!("{err:#}"));
            log_debug(&format!("{err}"));
            tracing::warn!(error = %err, is_user = message.is_user, "message not persisted");
        }
        self.send(UiEvent::DisplayMessage(message));
    }

    /// Show `message` without writing it to the store.
    pub(crate) fn replay(&self, message: Message) {
        self.send(UiEvent::DisplayMessage(message));
    }

    pub(crate) fn notice(&self, text: impl Into<String>) {
        self.send(UiEvent::Notice(text.into()));
    }

    pub(crate) fn status(&self) -> Status {
        self.with_state(|state| state.status)
    }

    /// Set the status and emit a change event unless the value is unchanged.
    pub(crate) fn update_status(&self, status: Status) {
        let mut state = lock_or_recover(&self.state, "Dispatcher::update_status");
        self.apply_status(&mut state, status);
    }

    /// Sets status while the caller already holds the state lock, so the
    /// event order matches the order of state changes.
    pub(crate) fn apply_status(&self, state: &mut RoutingState, status: Status) {
        if state.status == status {
            return;
        }
        log_debug(&format!("status {} -> {}", state.status, status));
        state.status = status;
        self.send(UiEvent::StatusChanged(status));
    }

    pub(crate) fn arm_echo(&self, text: &str) {
        self.with_state(|state| state.pending_echo.arm(text));
    }

    pub(crate) fn announce_speech(&self, id: UtteranceId) {
        self.with_state(|state| state.announced.remember(id));
    }

    fn send(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            log_debug("display channel closed; dropping event");
        }
    }
}

impl StatusSink for Dispatcher {
    fn set_status(&self, status: Status) {
        self.update_status(status);
    }
}

impl InputObserver for Dispatcher {
    fn on_input_observed(&self, utterance: &Utterance) {
        enum Route {
            Speech,
            Echo,
            Unattributed,
            AlreadyShown,
        }

        let route = self.with_state(|state| {
            if utterance.is_spoken() {
                if state.announced.consume(utterance.id()) {
                    Route::AlreadyShown
                } else {
                    Route::Speech
                }
            } else if state.pending_echo.take_if_matches(utterance.text()) {
                Route::Echo
            } else {
                Route::Unattributed
            }
        });

        match route {
            Route::Speech => {
                log_debug_content(&format!(
                    "displaying observed speech: {}",
                    ellipsize(utterance.text(), 30)
                ));
                self.emit_message(Message::user(utterance.text(), Some(SourceTag::Stt)));
            }
            Route::Unattributed => {
                log_debug_content(&format!(
                    "displaying unattributed input: {}",
                    ellipsize(utterance.text(), 30)
                ));
                self.emit_message(Message::user(utterance.text(), None));
            }
            Route::Echo => log_debug("suppressed echo of typed input"),
            Route::AlreadyShown => log_debug("spoken input already displayed"),
        }
    }
}
