use std::env;
use std::path::PathBuf;

pub const DEFAULT_ENGINE_TIMEOUT_MS: u64 = 60_000;
pub const MIN_ENGINE_TIMEOUT_MS: u64 = 1_000;
pub const MAX_ENGINE_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;
pub const MAX_QUEUE_CAPACITY: usize = 64;
pub(super) const MAX_ENGINE_ARGS: usize = 64;
pub(super) const MAX_ENGINE_ARG_BYTES: usize = 8 * 1024;

/// `$HOME/.aurora/history`, or a temp-dir fallback when HOME is unset.
pub fn default_store_dir() -> PathBuf {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join(".aurora")
        .join("history")
}
