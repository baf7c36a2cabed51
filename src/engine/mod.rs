//! Response engine seam.
//!
//! The router never generates replies itself. It hands utterances to a
//! `ResponseEngine` through one of two entry points:
//! - `process_text_input`: text in, text out, never speaks
//! - `stream_graph_updates`: full pipeline, may drive voice output as a side effect
//!
//! Engines are built with an `InputObserver` and must report every input they
//! process through it, whichever entry point was used.

mod command;
mod scripted;

pub use command::{CommandEngine, CommandEngineSettings, EngineMode};
pub use scripted::ScriptedEngine;

use crate::message::Utterance;
use anyhow::Result;
use std::sync::Arc;

/// Reply value that means "nothing to show".
pub const TERMINATE_SENTINEL: &str = "END";

/// Hook the engine calls for every input it processes.
pub trait InputObserver: Send + Sync {
    fn on_input_observed(&self, utterance: &Utterance);
}

/// Observer that ignores everything; used when an engine runs standalone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl InputObserver for NoopObserver {
    fn on_input_observed(&self, _utterance: &Utterance) {}
}

pub fn noop_observer() -> Arc<dyn InputObserver> {
    Arc::new(NoopObserver)
}

pub trait ResponseEngine: Send + Sync {
    /// Text-only entry point used for typed input.
    fn process_text_input(&self, text: &str) -> Result<String>;

    /// Full pipeline entry point used for spoken input.
    fn stream_graph_updates(&self, utterance: &Utterance) -> Result<String>;
}

/// True when `reply` should not become an assistant message.
pub fn is_silent_reply(reply: &str, sentinel: &str) -> bool {
    let trimmed = reply.trim();
    trimmed.is_empty() || trimmed == sentinel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_and_blank_replies_are_silent() {
        assert!(is_silent_reply("END", TERMINATE_SENTINEL));
        assert!(is_silent_reply("  END\n", TERMINATE_SENTINEL));
        assert!(is_silent_reply("   ", TERMINATE_SENTINEL));
        assert!(!is_silent_reply("END of story", TERMINATE_SENTINEL));
        assert!(!is_silent_reply("end", TERMINATE_SENTINEL));
    }
}
