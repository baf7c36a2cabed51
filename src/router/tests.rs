#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::engine::{noop_observer, ScriptedEngine};
use crate::speech::SilentVoiceOutput;
use crate::store::{MemoryStore, WriteKind};
use anyhow::Result as AnyResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    router: Router,
    events: Receiver<UiEvent>,
    store: Arc<MemoryStore>,
}

fn build(
    store: Arc<MemoryStore>,
    settings: RouterSettings,
    make_engine: impl FnOnce(&RoutingCore) -> Arc<dyn ResponseEngine>,
    voice: Arc<dyn VoiceOutput>,
) -> Harness {
    let (core, events) = RoutingCore::new(store.clone());
    let engine = make_engine(&core);
    let relay = StatusRelay::new(core.status_sink());
    let router = Router::new(core, engine, voice, relay, settings).expect("router");
    Harness {
        router,
        events,
        store,
    }
}

fn scripted(replies: &[&str]) -> Harness {
    scripted_with(replies, RouterSettings::default(), Duration::ZERO)
}

fn scripted_with(replies: &[&str], settings: RouterSettings, delay: Duration) -> Harness {
    let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
    build(
        Arc::new(MemoryStore::new()),
        settings,
        move |core| {
            Arc::new(ScriptedEngine::new(replies, core.input_observer()).with_delay(delay))
        },
        Arc::new(SilentVoiceOutput),
    )
}

/// Collect events until `done` holds for the collected list or the wait expires.
fn collect_until(events: &Receiver<UiEvent>, done: impl Fn(&[UiEvent]) -> bool) -> Vec<UiEvent> {
    let deadline = Instant::now() + WAIT;
    let mut seen = Vec::new();
    while !done(&seen) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) => seen.push(event),
            Err(_) => panic!("timed out waiting for events; got {seen:?}"),
        }
    }
    seen
}

fn until_idle(events: &Receiver<UiEvent>) -> Vec<UiEvent> {
    collect_until(events, |seen| {
        matches!(seen.last(), Some(UiEvent::StatusChanged(Status::Idle)))
    })
}

fn assert_quiet(events: &Receiver<UiEvent>) {
    if let Ok(event) = events.recv_timeout(Duration::from_millis(150)) {
        panic!("unexpected event {event:?}");
    }
}

fn summarize(events: &[UiEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            UiEvent::DisplayMessage(m) if m.is_user => {
                format!("user[{}]:{}", m.ui_source_type().unwrap_or("-"), m.content)
            }
            UiEvent::DisplayMessage(m) => format!("assistant:{}", m.content),
            UiEvent::StatusChanged(status) => format!("status:{status}"),
            UiEvent::Notice(_) => "notice".to_string(),
        })
        .collect()
}

#[test]
fn typed_text_round_trip() {
    let h = scripted(&["4"]);
    assert_eq!(
        h.router.submit_typed_text("2+2?").map(|s| s != Submission::Ignored),
        Ok(true)
    );

    let events = until_idle(&h.events);
    assert_eq!(
        summarize(&events),
        vec![
            "user[Text]:2+2?",
            "status:processing",
            "assistant:4",
            "status:idle"
        ]
    );
    assert_eq!(
        h.store.writes(),
        vec![
            (WriteKind::UserText, "2+2?".to_string()),
            (WriteKind::Assistant, "4".to_string()),
        ]
    );
    assert_quiet(&h.events);
}

#[test]
fn typed_text_is_trimmed_before_display() {
    let h = scripted(&["ok"]);
    h.router.submit_typed_text("  hello  ").unwrap();
    let events = until_idle(&h.events);
    assert_eq!(summarize(&events)[0], "user[Text]:hello");
}

#[test]
fn blank_input_is_a_no_op() {
    let h = scripted(&["unused"]);
    assert_eq!(h.router.submit_typed_text("   \n\t"), Ok(Submission::Ignored));
    assert_eq!(h.router.submit_spoken_text(""), Ok(Submission::Ignored));
    assert_quiet(&h.events);
    assert!(h.store.writes().is_empty());
    assert_eq!(h.router.status(), Status::Idle);
}

#[test]
fn sentinel_or_empty_reply_shows_nothing_but_goes_idle() {
    for reply in ["END", "", "  END  "] {
        let h = scripted(&[reply]);
        h.router.submit_typed_text("goodbye").unwrap();
        let events = until_idle(&h.events);
        assert_eq!(
            summarize(&events),
            vec!["user[Text]:goodbye", "status:processing", "status:idle"],
            "reply {reply:?}"
        );
        assert_eq!(h.store.writes().len(), 1);
    }
}

#[test]
fn custom_sentinel_is_honoured() {
    let settings = RouterSettings {
        terminate_sentinel: "STOP".into(),
        ..RouterSettings::default()
    };
    let h = scripted_with(&["STOP"], settings, Duration::ZERO);
    h.router.submit_typed_text("x").unwrap();
    let events = until_idle(&h.events);
    assert!(!summarize(&events).iter().any(|e| e.starts_with("assistant")));
}

#[test]
fn echo_of_typed_text_is_suppressed_and_other_input_is_unattributed() {
    let h = build(
        Arc::new(MemoryStore::new()),
        RouterSettings::default(),
        |_| Arc::new(ScriptedEngine::new(vec!["ok".into()], noop_observer())),
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_typed_text("hi").unwrap();
    until_idle(&h.events);

    h.router.on_generic_input_observed(&Utterance::typed("hi"));
    assert_quiet(&h.events);

    h.router.on_generic_input_observed(&Utterance::typed("bye"));
    let events = collect_until(&h.events, |seen| !seen.is_empty());
    assert_eq!(summarize(&events), vec!["user[-]:bye"]);
    assert_eq!(
        h.store.writes().last(),
        Some(&(WriteKind::UserText, "bye".to_string()))
    );
}

#[test]
fn echo_marker_is_cleared_after_one_match() {
    let h = build(
        Arc::new(MemoryStore::new()),
        RouterSettings::default(),
        |_| Arc::new(ScriptedEngine::new(vec!["ok".into()], noop_observer())),
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_typed_text("hi").unwrap();
    until_idle(&h.events);

    h.router.on_generic_input_observed(&Utterance::typed("hi"));
    h.router.on_generic_input_observed(&Utterance::typed("hi"));
    let events = collect_until(&h.events, |seen| !seen.is_empty());
    assert_eq!(summarize(&events), vec!["user[-]:hi"]);
}

#[test]
fn engine_echo_through_hook_never_duplicates_typed_message() {
    let h = scripted(&["pong"]);
    h.router.submit_typed_text("ping").unwrap();
    let events = until_idle(&h.events);
    let users = summarize(&events)
        .into_iter()
        .filter(|e| e.starts_with("user"))
        .count();
    assert_eq!(users, 1);
}

#[test]
fn spoken_text_is_shown_once_and_stored_as_voice() {
    let engine_slot: Arc<std::sync::Mutex<Option<Arc<ScriptedEngine>>>> = Arc::default();
    let slot = engine_slot.clone();
    let h = build(
        Arc::new(MemoryStore::new()),
        RouterSettings::default(),
        move |core| {
            let engine = Arc::new(ScriptedEngine::new(vec!["noon".into()], core.input_observer()));
            *slot.lock().unwrap() = Some(engine.clone());
            engine
        },
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_spoken_text("what time is it").unwrap();
    let events = until_idle(&h.events);
    assert_eq!(
        summarize(&events),
        vec![
            "user[STT]:what time is it",
            "status:processing",
            "assistant:noon",
            "status:idle"
        ]
    );
    assert_eq!(
        h.store.writes(),
        vec![
            (WriteKind::UserVoice, "what time is it".to_string()),
            (WriteKind::Assistant, "noon".to_string()),
        ]
    );
    let engine = engine_slot.lock().unwrap().clone().unwrap();
    assert_eq!(engine.full_calls(), 1);
    assert_eq!(engine.text_calls(), 0);
}

#[test]
fn unannounced_speech_from_hook_is_displayed_as_stt() {
    let h = scripted(&[]);
    h.router
        .on_generic_input_observed(&Utterance::spoken("lights on"));
    let events = collect_until(&h.events, |seen| !seen.is_empty());
    assert_eq!(summarize(&events), vec!["user[STT]:lights on"]);
    assert_eq!(
        h.store.writes(),
        vec![(WriteKind::UserVoice, "lights on".to_string())]
    );
}

/// Engine that reports voice output starting while it answers.
struct SpeakingEngine {
    sink: Arc<dyn StatusSink>,
}

impl ResponseEngine for SpeakingEngine {
    fn process_text_input(&self, text: &str) -> AnyResult<String> {
        Ok(text.to_string())
    }

    fn stream_graph_updates(&self, _utterance: &Utterance) -> AnyResult<String> {
        self.sink.set_status(Status::Speaking);
        Ok("spoken reply".into())
    }
}

#[test]
fn spoken_reply_leaves_speaking_status_to_voice_output() {
    let h = build(
        Arc::new(MemoryStore::new()),
        RouterSettings::default(),
        |core| {
            Arc::new(SpeakingEngine {
                sink: core.status_sink(),
            })
        },
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_spoken_text("tell me a joke").unwrap();
    let events = collect_until(&h.events, |seen| {
        summarize(seen).contains(&"assistant:spoken reply".to_string())
    });
    assert_eq!(
        summarize(&events),
        vec![
            "user[STT]:tell me a joke",
            "status:processing",
            "status:speaking",
            "assistant:spoken reply"
        ]
    );
    assert_quiet(&h.events);
    assert_eq!(h.router.status(), Status::Speaking);

    h.router.apply_speech_signal(SpeechSignal::AudioStreamStop);
    let events = collect_until(&h.events, |seen| !seen.is_empty());
    assert_eq!(summarize(&events), vec!["status:idle"]);
}

#[test]
fn repeated_stream_stop_emits_nothing_new() {
    let h = scripted(&[]);
    h.router.apply_speech_signal(SpeechSignal::AudioStreamStop);
    h.router.apply_speech_signal(SpeechSignal::AudioStreamStop);
    assert_quiet(&h.events);

    h.router.apply_speech_signal(SpeechSignal::AudioStreamStart);
    h.router.apply_speech_signal(SpeechSignal::AudioStreamStop);
    h.router.apply_speech_signal(SpeechSignal::AudioStreamStop);
    let events = collect_until(&h.events, |seen| seen.len() == 2);
    assert_eq!(summarize(&events), vec!["status:speaking", "status:idle"]);
    assert_quiet(&h.events);
    assert_eq!(h.router.status(), Status::Idle);
}

#[test]
fn speech_lifecycle_signals_drive_status() {
    let h = scripted(&[]);
    for signal in [
        SpeechSignal::WakewordDetected,
        SpeechSignal::RecordingStart,
        SpeechSignal::RecordingStop,
        SpeechSignal::WakewordDetectionStart,
    ] {
        h.router.apply_speech_signal(signal);
    }
    let events = collect_until(&h.events, |seen| seen.len() == 3);
    assert_eq!(
        summarize(&events),
        vec!["status:listening", "status:processing", "status:idle"]
    );
}

#[test]
fn transcript_signal_submits_spoken_text() {
    let h = scripted(&["sure"]);
    h.router.apply_speech_signal(SpeechSignal::Transcript {
        text: "open the pod bay doors".into(),
    });
    let events = until_idle(&h.events);
    assert_eq!(summarize(&events)[0], "user[STT]:open the pod bay doors");
    assert!(summarize(&events).contains(&"assistant:sure".to_string()));
}

#[test]
fn busy_submission_is_rejected_without_side_effects() {
    let h = scripted_with(&["slow"], RouterSettings::default(), Duration::from_millis(300));
    h.router.submit_typed_text("first").unwrap();
    assert_eq!(h.router.submit_typed_text("second"), Err(ChatError::Busy));
    assert_eq!(h.router.submit_spoken_text("third"), Err(ChatError::Busy));

    let events = until_idle(&h.events);
    let summary = summarize(&events);
    assert!(!summary.iter().any(|e| e.contains("second") || e.contains("third")));
    assert!(summary.contains(&"notice".to_string()));
    assert_eq!(
        h.store.writes(),
        vec![
            (WriteKind::UserText, "first".to_string()),
            (WriteKind::Assistant, "slow".to_string()),
        ]
    );

    // Accepted again once idle.
    assert!(h.router.submit_typed_text("again").is_ok());
}

#[test]
fn queue_policy_runs_jobs_in_order() {
    let settings = RouterSettings {
        busy_policy: BusyPolicy::Queue,
        queue_capacity: 3,
        ..RouterSettings::default()
    };
    let h = scripted_with(&[], settings, Duration::from_millis(50));
    h.router.submit_typed_text("a").unwrap();
    h.router.submit_typed_text("b").unwrap();
    h.router.submit_typed_text("c").unwrap();
    assert_eq!(h.router.submit_typed_text("d"), Err(ChatError::Busy));

    let events = until_idle(&h.events);
    let summary = summarize(&events);
    let pos = |needle: &str| {
        summary
            .iter()
            .position(|e| e == needle)
            .unwrap_or_else(|| panic!("missing {needle} in {summary:?}"))
    };
    assert!(pos("user[Text]:a") < pos("assistant:a"));
    assert!(pos("user[Text]:b") < pos("assistant:b"));
    assert!(pos("user[Text]:c") < pos("assistant:c"));
    assert!(pos("assistant:a") < pos("assistant:b"));
    assert!(pos("assistant:b") < pos("assistant:c"));
    assert_eq!(summary.iter().filter(|e| e.starts_with("user")).count(), 3);
    assert_eq!(
        summary.iter().filter(|e| *e == "status:idle").count(),
        1,
        "idle only after the queue drains: {summary:?}"
    );
}

/// Engine that reports its input through the hook only after a pause.
struct SlowHookEngine {
    observer: Arc<dyn InputObserver>,
    hook_delay: Duration,
}

impl ResponseEngine for SlowHookEngine {
    fn process_text_input(&self, text: &str) -> AnyResult<String> {
        std::thread::sleep(self.hook_delay);
        self.observer.on_input_observed(&Utterance::typed(text));
        Ok(format!("re:{text}"))
    }

    fn stream_graph_updates(&self, utterance: &Utterance) -> AnyResult<String> {
        self.observer.on_input_observed(utterance);
        Ok(format!("re:{}", utterance.text()))
    }
}

#[test]
fn queued_submission_does_not_steal_running_echo() {
    let settings = RouterSettings {
        busy_policy: BusyPolicy::Queue,
        queue_capacity: 3,
        ..RouterSettings::default()
    };
    let h = build(
        Arc::new(MemoryStore::new()),
        settings,
        |core| {
            Arc::new(SlowHookEngine {
                observer: core.input_observer(),
                hook_delay: Duration::from_millis(100),
            })
        },
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_typed_text("a").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    h.router.submit_typed_text("b").unwrap();

    let events = until_idle(&h.events);
    assert_eq!(
        summarize(&events),
        vec![
            "user[Text]:a",
            "status:processing",
            "user[Text]:b",
            "assistant:re:a",
            "assistant:re:b",
            "status:idle"
        ]
    );
    assert_eq!(
        h.store.writes(),
        vec![
            (WriteKind::UserText, "a".to_string()),
            (WriteKind::UserText, "b".to_string()),
            (WriteKind::Assistant, "re:a".to_string()),
            (WriteKind::Assistant, "re:b".to_string()),
        ]
    );
    assert_quiet(&h.events);
}

#[test]
fn engine_timeout_resets_status_and_drops_late_reply() {
    let settings = RouterSettings {
        engine_timeout: Duration::from_millis(100),
        ..RouterSettings::default()
    };
    let h = scripted_with(&["too late"], settings, Duration::from_millis(400));
    h.router.submit_typed_text("hurry").unwrap();
    let events = until_idle(&h.events);
    assert_eq!(
        summarize(&events),
        vec!["user[Text]:hurry", "status:processing", "status:idle"]
    );

    std::thread::sleep(Duration::from_millis(500));
    assert_quiet(&h.events);
    assert_eq!(h.store.writes().len(), 1);
}

#[test]
fn engine_failure_resets_status() {
    let h = build(
        Arc::new(MemoryStore::new()),
        RouterSettings::default(),
        |core| {
            let engine = Arc::new(ScriptedEngine::new(vec!["x".into()], core.input_observer()));
            engine.set_failing(true);
            engine
        },
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_spoken_text("will this fail").unwrap();
    let events = until_idle(&h.events);
    assert_eq!(
        summarize(&events),
        vec!["user[STT]:will this fail", "status:processing", "status:idle"]
    );
}

#[test]
fn store_failure_does_not_hide_messages() {
    let store = Arc::new(MemoryStore::new());
    store.set_fail_writes(true);
    let h = build(
        store,
        RouterSettings::default(),
        |core| Arc::new(ScriptedEngine::new(vec!["still here".into()], core.input_observer())),
        Arc::new(SilentVoiceOutput),
    );
    h.router.submit_typed_text("save me").unwrap();
    let events = until_idle(&h.events);
    assert_eq!(
        summarize(&events),
        vec![
            "user[Text]:save me",
            "status:processing",
            "assistant:still here",
            "status:idle"
        ]
    );
    assert!(h.store.writes().is_empty());
}

#[test]
fn history_replay_is_display_only_and_repeatable() {
    let store = Arc::new(MemoryStore::with_history(vec![
        Message::user("morning", Some(SourceTag::Stt)),
        Message::assistant("good morning"),
        Message::user("typed later", None),
    ]));
    let h = build(
        store,
        RouterSettings::default(),
        |core| Arc::new(ScriptedEngine::new(Vec::new(), core.input_observer())),
        Arc::new(SilentVoiceOutput),
    );

    assert_eq!(h.router.load_history(), HistoryLoad::Replayed(3));
    let first = collect_until(&h.events, |seen| seen.len() == 3);
    assert_eq!(h.router.load_history(), HistoryLoad::Replayed(3));
    let second = collect_until(&h.events, |seen| seen.len() == 3);

    assert_eq!(summarize(&first), summarize(&second));
    assert_eq!(
        summarize(&first),
        vec![
            "user[STT]:morning",
            "assistant:good morning",
            "user[-]:typed later"
        ]
    );
    assert!(h.store.writes().is_empty());
}

#[test]
fn empty_history_shows_unsaved_welcome() {
    let h = scripted(&[]);
    assert_eq!(h.router.load_history(), HistoryLoad::Welcome);
    let events = collect_until(&h.events, |seen| !seen.is_empty());
    match &events[0] {
        UiEvent::DisplayMessage(message) => {
            assert!(!message.is_user);
            assert!(message.content.starts_with("# Welcome to Aurora AI Assistant v"));
            assert!(message.content.contains("**Start by asking a question!**"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_quiet(&h.events);
    assert!(h.store.writes().is_empty());
}

#[test]
fn load_failure_falls_back_to_welcome() {
    let store = Arc::new(MemoryStore::new());
    store.set_fail_loads(true);
    let h = build(
        store,
        RouterSettings::default(),
        |core| Arc::new(ScriptedEngine::new(Vec::new(), core.input_observer())),
        Arc::new(SilentVoiceOutput),
    );
    assert_eq!(h.router.load_history(), HistoryLoad::Welcome);
    let events = collect_until(&h.events, |seen| !seen.is_empty());
    assert!(summarize(&events)[0].starts_with("assistant:# Welcome"));
}

#[derive(Default)]
struct CountingVoice(AtomicUsize);

impl VoiceOutput for CountingVoice {
    fn stop(&self) -> AnyResult<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn stop_voice_stops_output_and_goes_idle() {
    let voice = Arc::new(CountingVoice::default());
    let h = build(
        Arc::new(MemoryStore::new()),
        RouterSettings::default(),
        |core| Arc::new(ScriptedEngine::new(Vec::new(), core.input_observer())),
        voice.clone(),
    );
    h.router.apply_speech_signal(SpeechSignal::AudioStreamStart);
    h.router.stop_voice();
    let events = collect_until(&h.events, |seen| seen.len() == 2);
    assert_eq!(summarize(&events), vec!["status:speaking", "status:idle"]);
    assert_eq!(voice.0.load(Ordering::SeqCst), 1);

    h.router.stop_voice();
    assert_quiet(&h.events);
    assert_eq!(voice.0.load(Ordering::SeqCst), 2);
}
