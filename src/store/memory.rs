use super::{MessageStore, WriteKind};
use crate::lock_or_recover;
use crate::message::{Message, SourceTag};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Process-local store used for `--ephemeral` sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    writes: Mutex<Vec<(WriteKind, String)>>,
    seeded: Mutex<Vec<Message>>,
    fail_writes: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing history for today.
    #[must_use]
    pub fn with_history(messages: Vec<Message>) -> Self {
        let store = Self::default();
        *lock_or_recover(&store.seeded, "MemoryStore::with_history") = messages;
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<(WriteKind, String)> {
        lock_or_recover(&self.writes, "MemoryStore::writes").clone()
    }

    fn record(&self, kind: WriteKind, content: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store rejected {kind:?} write");
        }
        lock_or_recover(&self.writes, "MemoryStore::record").push((kind, content.to_string()));
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    fn today_messages(&self) -> Result<Vec<Message>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            bail!("memory store load failure");
        }
        let mut messages = lock_or_recover(&self.seeded, "MemoryStore::today_messages").clone();
        let writes = lock_or_recover(&self.writes, "MemoryStore::today_messages");
        messages.extend(writes.iter().map(|(kind, content)| match kind {
            WriteKind::UserText => Message::user(content.clone(), Some(SourceTag::Text)),
            WriteKind::UserVoice => Message::user(content.clone(), Some(SourceTag::Stt)),
            WriteKind::Assistant => Message::assistant(content.clone()),
        }));
        Ok(messages)
    }

    fn store_user_text_message(&self, content: &str) -> Result<()> {
        self.record(WriteKind::UserText, content)
    }

    fn store_user_voice_message(&self, content: &str) -> Result<()> {
        self.record(WriteKind::UserVoice, content)
    }

    fn store_assistant_message(&self, content: &str) -> Result<()> {
        self.record(WriteKind::Assistant, content)
    }
}
