//! Conversation data model shared by the router, store, and display layer.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UTTERANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(u64);

impl UtteranceId {
    fn next() -> Self {
        Self(NEXT_UTTERANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// How an utterance entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Text,
    Speech,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Text => "text",
            Origin::Speech => "speech",
        }
    }
}

/// One piece of user input, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    id: UtteranceId,
    text: String,
    origin: Origin,
    received_at: DateTime<Local>,
}

impl Utterance {
    #[must_use]
    pub fn new(text: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: UtteranceId::next(),
            text: text.into(),
            origin,
            received_at: Local::now(),
        }
    }

    #[must_use]
    pub fn typed(text: impl Into<String>) -> Self {
        Self::new(text, Origin::Text)
    }

    #[must_use]
    pub fn spoken(text: impl Into<String>) -> Self {
        Self::new(text, Origin::Speech)
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    pub fn is_spoken(&self) -> bool {
        self.origin == Origin::Speech
    }
}

/// Source label attached to user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Text,
    Stt,
}

impl SourceTag {
    /// Label shown next to the bubble.
    pub fn label(self) -> &'static str {
        match self {
            SourceTag::Text => "Text",
            SourceTag::Stt => "STT",
        }
    }
}

/// A rendered chat entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub is_user: bool,
    pub source: Option<SourceTag>,
    pub timestamp: DateTime<Local>,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>, source: Option<SourceTag>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            source,
            timestamp: Local::now(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            source: None,
            timestamp: Local::now(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_user_message(&self) -> bool {
        self.is_user
    }

    pub fn ui_source_type(&self) -> Option<&'static str> {
        self.source.map(SourceTag::label)
    }
}

/// Assistant activity indicator. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Listening => "listening",
            Status::Processing => "processing",
            Status::Speaking => "speaking",
        }
    }

    /// Text shown by the status indicator.
    pub fn display_text(self) -> &'static str {
        match self {
            Status::Idle => "Idle - Say 'Jarvis' to activate",
            Status::Listening => "Listening...",
            Status::Processing => "Processing...",
            Status::Speaking => "Speaking...",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(Status::Idle),
            "listening" => Ok(Status::Listening),
            "processing" => Ok(Status::Processing),
            "speaking" => Ok(Status::Speaking),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Events delivered, in order, to the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    DisplayMessage(Message),
    StatusChanged(Status),
    /// Transient line for the status bar; never persisted.
    Notice(String),
}
