use super::{InputObserver, ResponseEngine};
use crate::message::Utterance;
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Engine that cycles through canned replies. With no replies configured it
/// echoes the input back.
pub struct ScriptedEngine {
    replies: Vec<String>,
    next: AtomicUsize,
    observer: Arc<dyn InputObserver>,
    delay: Duration,
    failing: AtomicBool,
    text_calls: AtomicUsize,
    full_calls: AtomicUsize,
}

impl ScriptedEngine {
    #[must_use]
    pub fn new(replies: Vec<String>, observer: Arc<dyn InputObserver>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
            observer,
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            text_calls: AtomicUsize::new(0),
            full_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn full_calls(&self) -> usize {
        self.full_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, input: &str) -> Result<String> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("scripted engine failure");
        }
        if self.replies.is_empty() {
            return Ok(input.to_string());
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst) % self.replies.len();
        Ok(self.replies[index].clone())
    }
}

impl ResponseEngine for ScriptedEngine {
    fn process_text_input(&self, text: &str) -> Result<String> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.observer.on_input_observed(&Utterance::typed(text));
        self.answer(text)
    }

    fn stream_graph_updates(&self, utterance: &Utterance) -> Result<String> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        self.observer.on_input_observed(utterance);
        self.answer(utterance.text())
    }
}
