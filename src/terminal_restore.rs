use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::{
    io::{self, Write},
    panic,
    sync::{
        atomic::{AtomicU8, Ordering},
        OnceLock,
    },
};

const RAW_MODE: u8 = 0b01;
const ALT_SCREEN: u8 = 0b10;

/// Terminal modes currently switched on, so a panic can undo exactly those.
static ACTIVE_MODES: AtomicU8 = AtomicU8::new(0);
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Restores the terminal when dropped, and on panic via a shared hook.
pub struct TerminalRestoreGuard;

impl TerminalRestoreGuard {
    pub fn new() -> Self {
        install_terminal_panic_hook();
        TerminalRestoreGuard
    }

    pub fn enable_raw_mode(&self) -> io::Result<()> {
        enable_raw_mode()?;
        ACTIVE_MODES.fetch_or(RAW_MODE, Ordering::SeqCst);
        Ok(())
    }

    pub fn enter_alt_screen(&self, out: &mut impl Write) -> io::Result<()> {
        execute!(out, EnterAlternateScreen)?;
        ACTIVE_MODES.fetch_or(ALT_SCREEN, Ordering::SeqCst);
        Ok(())
    }

    pub fn restore(&self) {
        restore_terminal();
    }
}

impl Default for TerminalRestoreGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalRestoreGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Leave raw mode and the alternate screen if we entered them. Idempotent.
pub fn restore_terminal() {
    let modes = ACTIVE_MODES.swap(0, Ordering::SeqCst);
    if modes == 0 {
        return;
    }
    if modes & RAW_MODE != 0 {
        let _ = disable_raw_mode();
    }
    let mut stdout = io::stdout();
    if modes & ALT_SCREEN != 0 {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = execute!(stdout, Show);
    let _ = stdout.flush();
}

/// Chain a panic hook that restores the terminal and records the crash
/// before the default report is printed.
pub fn install_terminal_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            crate::log_panic(info);
            crate::log_debug_content(&format!("panic: {info}"));
            previous(info);
        }));
    });
}
