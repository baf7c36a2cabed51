//! Full-screen chat window driven by `ratatui`.
//!
//! The loop drains display events and speech signals each tick, handles one
//! key at a time, and redraws only when something changed.

mod draw;
mod state;
mod theme;

pub use state::ChatApp;

use crate::log_debug;
use crate::message::Status;
use crate::terminal_restore::TerminalRestoreGuard;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

const BUSY_POLL: Duration = Duration::from_millis(50);
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Configure the terminal, run the drawing loop, and tear everything down.
pub fn run_app(app: &mut ChatApp) -> Result<()> {
    let terminal_guard = TerminalRestoreGuard::new();
    terminal_guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    terminal_guard.enter_alt_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app_loop(&mut terminal, app);

    drop(terminal);
    terminal_guard.restore();

    result
}

fn app_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut ChatApp,
) -> Result<()> {
    app.drain_events();
    terminal.draw(|frame| draw::draw(frame, app))?;

    loop {
        app.poll_speech_signals();
        let applied = app.drain_events();

        let poll_duration = if applied > 0 || app.status() != Status::Idle {
            BUSY_POLL
        } else {
            IDLE_POLL
        };

        let mut should_draw = app.take_redraw_request();
        let mut should_quit = false;

        if event::poll(poll_duration)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    should_quit = handle_key_event(app, key);
                    should_draw = true;
                }
                Event::Resize(_, _) => should_draw = true,
                _ => {}
            }
        }

        if should_draw {
            terminal.draw(|frame| draw::draw(frame, app))?;
        }

        if should_quit {
            break;
        }
    }
    Ok(())
}

/// Apply one keystroke. Returns true when the app should quit.
fn handle_key_event(app: &mut ChatApp, key: KeyEvent) -> bool {
    log_debug(&format!(
        "key event: {:?} with modifiers: {:?}",
        key.code, key.modifiers
    ));
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => return true,
        KeyCode::Char('s') if ctrl => app.stop_voice(),
        KeyCode::Char('d') if ctrl => app.toggle_dark_mode(),
        KeyCode::Enter => app.send_current_input(),
        KeyCode::Backspace => app.backspace_input(),
        KeyCode::Esc => app.clear_input(),
        KeyCode::Char(c) if !ctrl => app.push_input_char(c),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.scroll_to_bottom(),
        _ => {}
    }
    false
}
