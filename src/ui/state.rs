use crate::error::ChatError;
use crate::layout::BubbleBody;
use crate::log_debug;
use crate::message::{Message, Status, UiEvent};
use crate::router::{Router, Submission};
use crate::speech::SpeechSignal;
use crossbeam_channel::{Receiver, TryRecvError};

/// Maximum characters retained in the input buffer.
pub(super) const INPUT_MAX_CHARS: usize = 8_000;
/// Rows moved by PageUp/PageDown.
pub(super) const PAGE_ROWS: u16 = 10;
/// Events applied per tick so a burst cannot starve key handling.
const MAX_EVENTS_PER_TICK: usize = 256;

macro_rules! state_change {
    ($self:expr, $field:ident, $value:expr) => {{
        $self.$field = $value;
        $self.request_redraw();
    }};
    ($self:expr, $body:block) => {{
        $body
        $self.request_redraw();
    }};
}

/// A displayed message with its parsed body cached.
pub(crate) struct ChatEntry {
    pub(crate) message: Message,
    pub(crate) body: BubbleBody,
}

impl ChatEntry {
    fn new(message: Message) -> Self {
        let body = BubbleBody::for_message(&message);
        Self { message, body }
    }
}

/// UI-thread state for the chat window. Owns the display-side receiver.
pub struct ChatApp {
    router: Router,
    events: Receiver<UiEvent>,
    speech: Option<Receiver<SpeechSignal>>,
    entries: Vec<ChatEntry>,
    status: Status,
    notice: Option<String>,
    input: String,
    /// Rows scrolled up from the newest message; zero follows new messages.
    scroll_from_bottom: u16,
    dark_mode: bool,
    needs_redraw: bool,
}

impl ChatApp {
    pub fn new(router: Router, events: Receiver<UiEvent>, dark_mode: bool) -> Self {
        let status = router.status();
        Self {
            router,
            events,
            speech: None,
            entries: Vec::new(),
            status,
            notice: None,
            input: String::new(),
            scroll_from_bottom: 0,
            dark_mode,
            needs_redraw: true,
        }
    }

    /// Feed signals from a speech process through the router each tick.
    #[must_use]
    pub fn with_speech_signals(mut self, signals: Receiver<SpeechSignal>) -> Self {
        self.speech = Some(signals);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Apply queued display events. Returns how many were applied.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while applied < MAX_EVENTS_PER_TICK {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply_event(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log_debug("display event channel closed");
                    break;
                }
            }
        }
        applied
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::DisplayMessage(message) => {
                state_change!(self, {
                    self.entries.push(ChatEntry::new(message));
                    self.scroll_from_bottom = 0;
                });
            }
            UiEvent::StatusChanged(status) => state_change!(self, status, status),
            UiEvent::Notice(text) => state_change!(self, notice, Some(text)),
        }
    }

    /// Forward pending speech-process signals to the router.
    pub fn poll_speech_signals(&mut self) {
        let Some(signals) = self.speech.as_ref() else {
            return;
        };
        let mut pending = Vec::new();
        loop {
            match signals.try_recv() {
                Ok(signal) => pending.push(signal),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log_debug("speech process closed its signal stream");
                    self.speech = None;
                    state_change!(self, notice, Some("Speech input stopped.".into()));
                    break;
                }
            }
        }
        for signal in pending {
            self.router.apply_speech_signal(signal);
        }
    }

    pub(crate) fn send_current_input(&mut self) {
        match self.router.submit_typed_text(&self.input) {
            Ok(Submission::Accepted(_)) | Ok(Submission::Ignored) => {
                state_change!(self, {
                    self.input.clear();
                    self.notice = None;
                });
            }
            // The router already queued a notice; keep the text for a retry.
            Err(ChatError::Busy) => self.request_redraw(),
            Err(err) => state_change!(self, notice, Some(err.to_string())),
        }
    }

    pub(crate) fn stop_voice(&mut self) {
        self.router.stop_voice();
        self.request_redraw();
    }

    pub(crate) fn toggle_dark_mode(&mut self) {
        state_change!(self, dark_mode, !self.dark_mode);
    }

    pub(crate) fn push_input_char(&mut self, ch: char) {
        if ch.is_control() || self.input.chars().count() >= INPUT_MAX_CHARS {
            return;
        }
        state_change!(self, {
            self.input.push(ch);
        });
    }

    pub(crate) fn backspace_input(&mut self) {
        state_change!(self, {
            self.input.pop();
        });
    }

    pub(crate) fn clear_input(&mut self) {
        state_change!(self, {
            self.input.clear();
        });
    }

    pub(crate) fn scroll_up(&mut self) {
        state_change!(
            self,
            scroll_from_bottom,
            self.scroll_from_bottom.saturating_add(1)
        );
    }

    pub(crate) fn scroll_down(&mut self) {
        if self.scroll_from_bottom > 0 {
            state_change!(
                self,
                scroll_from_bottom,
                self.scroll_from_bottom.saturating_sub(1)
            );
        }
    }

    pub(crate) fn page_up(&mut self) {
        state_change!(
            self,
            scroll_from_bottom,
            self.scroll_from_bottom.saturating_add(PAGE_ROWS)
        );
    }

    pub(crate) fn page_down(&mut self) {
        state_change!(
            self,
            scroll_from_bottom,
            self.scroll_from_bottom.saturating_sub(PAGE_ROWS)
        );
    }

    pub(crate) fn scroll_to_top(&mut self) {
        state_change!(self, scroll_from_bottom, u16::MAX);
    }

    pub(crate) fn scroll_to_bottom(&mut self) {
        state_change!(self, scroll_from_bottom, 0);
    }

    /// Clamp the scroll position once the drawn content height is known.
    pub(crate) fn clamp_scroll(&mut self, max_rows: u16) {
        if self.scroll_from_bottom > max_rows {
            self.scroll_from_bottom = max_rows;
        }
    }

    pub(crate) fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn input_text(&self) -> &str {
        &self.input
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub(crate) fn scroll_from_bottom(&self) -> u16 {
        self.scroll_from_bottom
    }

    pub(crate) fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    pub(crate) fn take_redraw_request(&mut self) -> bool {
        let needs = self.needs_redraw;
        self.needs_redraw = false;
        needs
    }
}
