use crate::message::UtteranceId;
use std::collections::VecDeque;

const ANNOUNCED_SPEECH_CAPACITY: usize = 16;

/// Text of the most recent typed submission, waiting to be recognized when
/// the engine reports it back. Single slot: a new submission replaces it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct PendingEcho(Option<String>);

impl PendingEcho {
    pub(crate) fn arm(&mut self, text: &str) {
        self.0 = Some(text.to_string());
    }

    /// Exact comparison; clears the slot on a match.
    pub(crate) fn take_if_matches(&mut self, text: &str) -> bool {
        if self.0.as_deref() == Some(text) {
            self.0 = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn peek(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Spoken utterances already shown by the router, so the input hook does not
/// show them a second time.
#[derive(Debug, Default)]
pub(crate) struct AnnouncedSpeech(VecDeque<UtteranceId>);

impl AnnouncedSpeech {
    pub(crate) fn remember(&mut self, id: UtteranceId) {
        if self.0.len() >= ANNOUNCED_SPEECH_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(id);
    }

    pub(crate) fn consume(&mut self, id: UtteranceId) -> bool {
        match self.0.iter().position(|known| *known == id) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }
}
