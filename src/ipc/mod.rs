//! JSON-lines mode for driving the chat core from another process.
//!
//! Architecture:
//! - Stdin reader thread: parses JSON commands and sends them to the loop
//! - Main loop: applies one command per tick and mirrors display events
//! - Exit: once stdin closes and no job is in flight
//!
//! Protocol:
//! - Each line is a JSON object
//! - Events (Rust → client): {"event": "...", ...}
//! - Commands (client → Rust): {"cmd": "...", ...}

mod protocol;
mod session;

#[cfg(test)]
mod tests;

pub use protocol::{IpcCommand, IpcEvent};
pub use session::run_ipc_mode;
