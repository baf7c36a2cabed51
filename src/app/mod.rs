//! Process-wide logging for the chat window and IPC mode.
//!
//! Logs go to files in the temp dir so they never corrupt the terminal UI.

mod logging;

#[cfg(test)]
pub(crate) use logging::set_logging_for_tests;
pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
