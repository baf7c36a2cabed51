use super::MessageStore;
use crate::lock_or_recover;
use crate::log_debug;
use crate::message::{Message, SourceTag};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredSource {
    Text,
    Voice,
}

/// One line of a day partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub role: StoredRole,
    #[serde(default)]
    pub source: Option<StoredSource>,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl StoredRecord {
    fn into_message(self) -> Message {
        let message = match self.role {
            StoredRole::Assistant => Message::assistant(self.content),
            StoredRole::User => {
                let source = match self.source {
                    Some(StoredSource::Voice) => Some(SourceTag::Stt),
                    Some(StoredSource::Text) => Some(SourceTag::Text),
                    None => None,
                };
                Message::user(self.content, source)
            }
        };
        message.with_timestamp(self.timestamp)
    }
}

/// Append-only history with one `YYYY-MM-DD.jsonl` file per local day.
#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create history dir {}", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Messages recorded on `date`, oldest first. A missing partition is empty.
    pub fn messages_for(&self, date: NaiveDate) -> Result<Vec<Message>> {
        let path = self.partition_path(date);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open {}", path.display()))
            }
        };
        let mut messages = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredRecord>(&line) {
                Ok(record) => messages.push(record.into_message()),
                Err(err) => log_debug(&format!(
                    "skipping malformed history line {} in {}: {err}",
                    index + 1,
                    path.display()
                )),
            }
        }
        Ok(messages)
    }

    fn append(&self, role: StoredRole, source: Option<StoredSource>, content: &str) -> Result<()> {
        let record = StoredRecord {
            role,
            source,
            content: content.to_string(),
            timestamp: Local::now(),
        };
        let mut line = serde_json::to_string(&record).context("failed to encode history record")?;
        line.push('\n');

        let path = self.partition_path(record.timestamp.date_naive());
        let _guard = lock_or_recover(&self.write_lock, "JsonlStore::append");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        file.flush()?;
        Ok(())
    }
}

impl MessageStore for JsonlStore {
    fn today_messages(&self) -> Result<Vec<Message>> {
        self.messages_for(Local::now().date_naive())
    }

    fn store_user_text_message(&self, content: &str) -> Result<()> {
        self.append(StoredRole::User, Some(StoredSource::Text), content)
    }

    fn store_user_voice_message(&self, content: &str) -> Result<()> {
        self.append(StoredRole::User, Some(StoredSource::Voice), content)
    }

    fn store_assistant_message(&self, content: &str) -> Result<()> {
        self.append(StoredRole::Assistant, None, content)
    }
}
