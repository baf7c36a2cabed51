#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::protocol::*;
use super::session::*;
use crate::engine::ScriptedEngine;
use crate::message::{Message, SourceTag, Status, UiEvent};
use crate::router::{Router, RouterSettings, RoutingCore};
use crate::speech::{SilentVoiceOutput, StatusRelay};
use crate::store::MemoryStore;
use crossbeam_channel::{unbounded, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// The captured-event sink is process-wide.
static IPC_TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock_sink() -> MutexGuard<'static, ()> {
    let guard = IPC_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    init_event_sink();
    let _ = take_events();
    guard
}

fn test_router(replies: &[&str], delay: Duration) -> (Router, Receiver<UiEvent>) {
    let (core, events) = RoutingCore::new(Arc::new(MemoryStore::new()));
    let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
    let engine = Arc::new(ScriptedEngine::new(replies, core.input_observer()).with_delay(delay));
    let relay = StatusRelay::new(core.status_sink());
    let router = Router::new(
        core,
        engine,
        Arc::new(SilentVoiceOutput),
        relay,
        RouterSettings::default(),
    )
    .expect("router");
    (router, events)
}

fn run_commands(router: &Router, events: &Receiver<UiEvent>, json_lines: &[&str]) {
    let (tx, rx) = unbounded();
    for line in json_lines {
        let cmd = parse_command_line(line)
            .expect("non-blank")
            .expect("valid command");
        tx.send(cmd).expect("queue command");
    }
    drop(tx);
    run_ipc_loop(router, events, &rx, None).expect("ipc loop");
}

fn describe(events: &[IpcEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            IpcEvent::Message {
                content, is_user, ..
            } => {
                let who = if *is_user { "user" } else { "assistant" };
                format!("{who}:{content}")
            }
            IpcEvent::Status { status, .. } => format!("status:{status}"),
            IpcEvent::Notice { .. } => "notice".to_string(),
            IpcEvent::Error { .. } => "error".to_string(),
        })
        .collect()
}

#[test]
fn parses_commands_by_tag() {
    assert_eq!(
        parse_command_line(r#"{"cmd":"send_text","text":"hi"}"#),
        Some(Ok(IpcCommand::SendText {
            text: "hi".to_string()
        }))
    );
    assert_eq!(
        parse_command_line(r#" {"cmd":"audio_stream_stop"} "#),
        Some(Ok(IpcCommand::AudioStreamStop))
    );
    assert_eq!(parse_command_line("   "), None);
}

#[test]
fn invalid_lines_become_recoverable_errors() {
    for line in [r#"{"cmd":"dance"}"#, "not json", r#"{"cmd":"send_text"}"#] {
        match parse_command_line(line) {
            Some(Err(IpcEvent::Error {
                message,
                recoverable,
            })) => {
                assert!(recoverable);
                assert!(message.starts_with("Invalid command"));
            }
            other => panic!("expected an error event for {line}, got {other:?}"),
        }
    }
}

#[test]
fn lifecycle_commands_map_to_speech_signals() {
    use crate::speech::SpeechSignal;
    assert_eq!(
        IpcCommand::WakewordDetected.speech_signal(),
        Some(SpeechSignal::WakewordDetected)
    );
    assert_eq!(IpcCommand::GetStatus.speech_signal(), None);
    assert_eq!(
        IpcCommand::Transcript {
            text: "x".to_string()
        }
        .speech_signal(),
        None
    );
}

#[test]
fn events_serialize_with_event_tag() {
    let json = serde_json::to_value(IpcEvent::status(Status::Idle)).expect("json");
    assert_eq!(json["event"], "status");
    assert_eq!(json["status"], "idle");
    assert_eq!(json["text"], "Idle - Say 'Jarvis' to activate");

    let message = Message::user("hello", Some(SourceTag::Stt));
    let json = serde_json::to_value(IpcEvent::from(UiEvent::DisplayMessage(message))).expect("json");
    assert_eq!(json["event"], "message");
    assert_eq!(json["content"], "hello");
    assert_eq!(json["is_user"], true);
    assert_eq!(json["source"], "STT");
    assert!(json["timestamp"].as_str().is_some_and(|ts| ts.contains('T')));

    let json = serde_json::to_value(IpcEvent::from(UiEvent::DisplayMessage(Message::assistant(
        "ok",
    ))))
    .expect("json");
    assert!(json["source"].is_null());
}

#[test]
fn typed_text_round_trip() {
    let _guard = lock_sink();
    let (router, events) = test_router(&["4"], Duration::ZERO);
    run_commands(&router, &events, &[r#"{"cmd":"send_text","text":"2+2?"}"#]);

    let captured = take_events();
    assert_eq!(
        describe(&captured),
        vec![
            "user:2+2?",
            "status:processing",
            "assistant:4",
            "status:idle"
        ]
    );
    match &captured[0] {
        IpcEvent::Message { source, .. } => assert_eq!(source.as_deref(), Some("Text")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn history_is_replayed_first() {
    let _guard = lock_sink();
    let (router, events) = test_router(&[], Duration::ZERO);
    router.load_history();
    run_commands(&router, &events, &[]);

    let captured = take_events();
    assert_eq!(captured.len(), 1);
    match &captured[0] {
        IpcEvent::Message {
            content, is_user, ..
        } => {
            assert!(!is_user);
            assert!(content.starts_with("# Welcome to Aurora AI Assistant"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn busy_rejection_reports_an_error() {
    let _guard = lock_sink();
    let (router, events) = test_router(&["done"], Duration::from_millis(200));
    run_commands(
        &router,
        &events,
        &[
            r#"{"cmd":"send_text","text":"first"}"#,
            r#"{"cmd":"send_text","text":"second"}"#,
        ],
    );

    let captured = take_events();
    let summary = describe(&captured);
    assert!(summary.contains(&"notice".to_string()));
    assert!(summary.contains(&"error".to_string()));
    assert!(!summary.contains(&"user:second".to_string()));
    assert_eq!(summary.last().map(String::as_str), Some("status:idle"));
    assert!(captured.iter().any(|event| matches!(
        event,
        IpcEvent::Error { message, recoverable: true } if message.contains("busy")
    )));
}

#[test]
fn speech_commands_update_status() {
    let _guard = lock_sink();
    let (router, events) = test_router(&[], Duration::ZERO);
    run_commands(
        &router,
        &events,
        &[
            r#"{"cmd":"wakeword_detected"}"#,
            r#"{"cmd":"get_status"}"#,
            r#"{"cmd":"audio_stream_start"}"#,
            r#"{"cmd":"stop_voice"}"#,
        ],
    );
    assert_eq!(
        describe(&take_events()),
        vec![
            "status:listening",
            "status:listening",
            "status:speaking",
            "status:idle"
        ]
    );
}

#[test]
fn transcripts_are_shown_as_speech() {
    let _guard = lock_sink();
    let (router, events) = test_router(&["END"], Duration::ZERO);
    run_commands(
        &router,
        &events,
        &[r#"{"cmd":"transcript","text":"lights off"}"#],
    );
    let captured = take_events();
    assert_eq!(
        describe(&captured),
        vec!["user:lights off", "status:processing", "status:idle"]
    );
    match &captured[0] {
        IpcEvent::Message { source, .. } => assert_eq!(source.as_deref(), Some("STT")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn blank_text_is_ignored() {
    let _guard = lock_sink();
    let (router, events) = test_router(&[], Duration::ZERO);
    run_commands(&router, &events, &[r#"{"cmd":"send_text","text":"   "}"#]);
    assert!(take_events().is_empty());
}

#[test]
fn run_ipc_mode_exits_when_input_closes() {
    let _guard = lock_sink();
    let (router, events) = test_router(&[], Duration::ZERO);
    run_ipc_mode(&router, &events).expect("ipc mode");
    assert_eq!(ipc_loop_count(), 1);
}
