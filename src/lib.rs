//! Aurora: a chat window for a voice/text assistant.
//!
//! Typed and spoken input share one routing core that shows every message
//! exactly once, persists it to today's history, and asks a response engine
//! for the reply. The terminal UI and the JSON IPC mode are two front ends
//! over the same `Router`.

mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod layout;
mod lock;
pub mod markdown;
pub mod message;
pub mod router;
pub mod speech;
pub mod store;
mod telemetry;
pub mod terminal_restore;
pub mod ui;
pub mod utf8_safe;

pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
pub(crate) use lock::lock_or_recover;
pub use telemetry::init_tracing;

pub use error::{ChatError, ChatResult};
pub use message::{Message, SourceTag, Status, UiEvent, Utterance};
pub use router::{Router, RouterSettings, RoutingCore};
