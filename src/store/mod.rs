//! Conversation persistence.
//!
//! History is partitioned by local calendar day. The router only needs today's
//! partition at startup and one write per displayed message afterwards.

mod jsonl;
mod memory;

pub use jsonl::{JsonlStore, StoredRecord, StoredRole, StoredSource};
pub use memory::MemoryStore;

use crate::message::{Message, SourceTag};
use anyhow::Result;

/// Which store entry point a message is written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    UserText,
    UserVoice,
    Assistant,
}

impl WriteKind {
    /// Voice-tagged user messages go to the voice writer; untagged user messages
    /// are recorded as text.
    pub fn for_message(message: &Message) -> Self {
        match (message.is_user, message.source) {
            (false, _) => WriteKind::Assistant,
            (true, Some(SourceTag::Stt)) => WriteKind::UserVoice,
            (true, Some(SourceTag::Text) | None) => WriteKind::UserText,
        }
    }
}

/// Persistence collaborator used by the router.
pub trait MessageStore: Send + Sync {
    /// Messages of the current calendar day, oldest first.
    fn today_messages(&self) -> Result<Vec<Message>>;
    fn store_user_text_message(&self, content: &str) -> Result<()>;
    fn store_user_voice_message(&self, content: &str) -> Result<()>;
    fn store_assistant_message(&self, content: &str) -> Result<()>;
}

/// Write `message` through the entry point matching its role and source.
pub fn persist(store: &dyn MessageStore, message: &Message) -> Result<()> {
    match WriteKind::for_message(message) {
        WriteKind::UserText => store.store_user_text_message(&message.content),
        WriteKind::UserVoice => store.store_user_voice_message(&message.content),
        WriteKind::Assistant => store.store_assistant_message(&message.content),
    }
}
