use super::protocol::{IpcCommand, IpcEvent};
use crate::message::UiEvent;
use crate::router::Router;
use crate::{log_debug, log_debug_content};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

#[cfg(any(test, feature = "mutants"))]
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, OnceLock,
};
#[cfg(any(test, feature = "mutants"))]
use std::time::Instant;

const LOOP_SLEEP: Duration = Duration::from_millis(5);

// ============================================================================
// Event Sending
// ============================================================================

pub(super) fn send_event(event: &IpcEvent) {
    #[cfg(any(test, feature = "mutants"))]
    if capture_test_event(event) {
        return;
    }
    if let Ok(json) = serde_json::to_string(event) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{json}");
        let _ = stdout.flush();
    }
}

#[cfg(any(test, feature = "mutants"))]
static EVENT_SINK: OnceLock<Mutex<Vec<IpcEvent>>> = OnceLock::new();
#[cfg(any(test, feature = "mutants"))]
pub(super) static IPC_LOOP_COUNT: AtomicU64 = AtomicU64::new(0);

#[cfg(any(test, feature = "mutants"))]
fn capture_test_event(event: &IpcEvent) -> bool {
    if let Some(sink) = EVENT_SINK.get() {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
            return true;
        }
    }
    false
}

#[cfg(any(test, feature = "mutants"))]
#[cfg_attr(not(test), allow(dead_code))]
pub(super) fn init_event_sink() {
    let _ = EVENT_SINK.get_or_init(|| Mutex::new(Vec::new()));
}

#[cfg(any(test, feature = "mutants"))]
#[cfg_attr(not(test), allow(dead_code))]
pub(super) fn ipc_loop_count() -> u64 {
    IPC_LOOP_COUNT.load(Ordering::SeqCst)
}

/// Take every captured event, leaving the sink empty.
#[cfg(any(test, feature = "mutants"))]
#[cfg_attr(not(test), allow(dead_code))]
pub(super) fn take_events() -> Vec<IpcEvent> {
    init_event_sink();
    EVENT_SINK
        .get()
        .and_then(|sink| sink.lock().ok().map(|mut events| std::mem::take(&mut *events)))
        .unwrap_or_default()
}

// ============================================================================
// Stdin Reader Thread
// ============================================================================

/// Parse a stdin line. Blank lines are skipped; bad JSON becomes a
/// recoverable error event.
pub(super) fn parse_command_line(line: &str) -> Option<Result<IpcCommand, IpcEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<IpcCommand>(trimmed).map_err(|err| IpcEvent::Error {
            message: format!("Invalid command: {err}"),
            recoverable: true,
        }),
    )
}

#[cfg_attr(any(test, feature = "mutants"), allow(dead_code))]
fn spawn_stdin_reader(tx: Sender<IpcCommand>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_command_line(&line) {
                Some(Ok(cmd)) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Some(Err(event)) => send_event(&event),
                None => {}
            }
        }
        log_debug("stdin reader thread exiting");
    })
}

// ============================================================================
// Main Event Loop
// ============================================================================

/// Drive the router from JSON commands on stdin and mirror every display
/// event to stdout. History loaded before this call is replayed first.
///
/// Returns once stdin closes and every admitted job has finished.
pub fn run_ipc_mode(router: &Router, events: &Receiver<UiEvent>) -> Result<()> {
    log_debug("starting JSON IPC mode");
    let (cmd_tx, cmd_rx) = unbounded();
    #[cfg(any(test, feature = "mutants"))]
    {
        drop(cmd_tx);
        run_ipc_loop(router, events, &cmd_rx, Some(10))
    }
    #[cfg(not(any(test, feature = "mutants")))]
    {
        let _stdin_handle = spawn_stdin_reader(cmd_tx);
        run_ipc_loop(router, events, &cmd_rx, None)
    }
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn ipc_guard_tripped(elapsed: Duration) -> bool {
    elapsed > Duration::from_secs(5)
}

pub(super) fn run_ipc_loop(
    router: &Router,
    events: &Receiver<UiEvent>,
    cmd_rx: &Receiver<IpcCommand>,
    max_loops: Option<u64>,
) -> Result<()> {
    #[cfg(any(test, feature = "mutants"))]
    let guard_start = Instant::now();
    let mut loop_count: u64 = 0;
    let mut input_closed = false;
    loop {
        #[cfg(any(test, feature = "mutants"))]
        if ipc_guard_tripped(guard_start.elapsed()) {
            panic!("IPC loop guard exceeded");
        }
        loop_count += 1;
        #[cfg(any(test, feature = "mutants"))]
        IPC_LOOP_COUNT.store(loop_count, Ordering::SeqCst);
        if loop_count % 1000 == 0 {
            log_debug(&format!(
                "IPC loop iteration {loop_count}, jobs in flight: {}",
                router.in_flight()
            ));
        }

        if let Some(limit) = max_loops {
            if loop_count >= limit {
                log_debug("IPC loop reached its iteration limit, exiting");
                forward_events(events);
                break;
            }
        }

        if !input_closed {
            match cmd_rx.try_recv() {
                Ok(cmd) => handle_command(router, cmd),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    log_debug("command channel closed; finishing in-flight jobs");
                    input_closed = true;
                }
            }
        }

        forward_events(events);

        if input_closed && router.in_flight() == 0 {
            forward_events(events);
            break;
        }

        thread::sleep(LOOP_SLEEP);
    }

    log_debug("IPC mode exiting");
    Ok(())
}

/// Mirror queued display events. Returns how many were sent.
pub(super) fn forward_events(events: &Receiver<UiEvent>) -> usize {
    let mut sent = 0;
    while let Ok(event) = events.try_recv() {
        send_event(&IpcEvent::from(event));
        sent += 1;
    }
    sent
}

pub(super) fn handle_command(router: &Router, cmd: IpcCommand) {
    log_debug_content(&format!("IPC command received: {cmd:?}"));
    if let Some(signal) = cmd.speech_signal() {
        router.apply_speech_signal(signal);
        return;
    }
    let result = match cmd {
        IpcCommand::SendText { text } => router.submit_typed_text(&text).map(|_| ()),
        IpcCommand::Transcript { text } => router.submit_spoken_text(&text).map(|_| ()),
        IpcCommand::StopVoice => {
            router.stop_voice();
            Ok(())
        }
        IpcCommand::GetStatus => {
            send_event(&IpcEvent::status(router.status()));
            Ok(())
        }
        _ => Ok(()),
    };
    if let Err(err) = result {
        send_event(&IpcEvent::Error {
            message: err.to_string(),
            recoverable: true,
        });
    }
}
