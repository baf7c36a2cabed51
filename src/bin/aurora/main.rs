//! Aurora chat entrypoint: builds the routing core and hands it to the
//! terminal UI or the JSON IPC loop.
//!
//! Startup order matters: the engine needs the router's input observer, and
//! the router needs the engine, so the routing core is created first.

use anyhow::{Context, Result};
use aurora::config::AppConfig;
use aurora::engine::{CommandEngine, CommandEngineSettings, ResponseEngine, ScriptedEngine};
use aurora::router::HistoryLoad;
use aurora::speech::{SilentVoiceOutput, SpeechBridge, SpeechLogListener, StatusRelay, VoiceOutput};
use aurora::store::{JsonlStore, MemoryStore, MessageStore};
use aurora::terminal_restore::install_terminal_panic_hook;
use aurora::ui::{self, ChatApp};
use aurora::{
    init_logging, init_tracing, ipc, log_debug, log_file_path, Router, RouterSettings,
    RoutingCore,
};
use clap::Parser;
use std::sync::Arc;

#[cfg(not(test))]
fn main() -> Result<()> {
    run_with_args(std::env::args_os())
}

#[cfg_attr(test, allow(dead_code))]
fn run_with_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let mut config = AppConfig::parse_from(args);
    config.validate()?;
    config.require_engine()?;

    init_logging(&config);
    init_tracing(&config);
    install_terminal_panic_hook();
    log_debug("=== Aurora Chat Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let store = open_store(&config)?;
    let (core, events) = RoutingCore::new(store);
    let engine = build_engine(&config, &core)?;

    // Dropping the bridge kills the speech process, so it lives for the whole run.
    let bridge = match config.speech_cmd.as_deref() {
        Some(command) => Some(SpeechBridge::spawn(command)?),
        None => None,
    };
    let voice: Arc<dyn VoiceOutput> = match &bridge {
        Some(bridge) => bridge.voice_output(),
        None => Arc::new(SilentVoiceOutput),
    };

    let mut relay = StatusRelay::new(core.status_sink());
    if config.debug {
        relay = relay
            .chain_speech(Arc::new(SpeechLogListener))
            .chain_voice(Arc::new(SpeechLogListener));
    }

    let router = Router::new(
        core,
        engine,
        voice,
        relay,
        RouterSettings::from_config(&config),
    )?;
    match router.load_history() {
        HistoryLoad::Replayed(count) => log_debug(&format!("restored {count} messages")),
        HistoryLoad::Welcome => log_debug("no history for today; showing welcome"),
    }

    if config.json_ipc {
        log_debug("Running in JSON IPC mode");
        let result = ipc::run_ipc_mode(&router, &events);
        log_debug("=== Aurora IPC Exiting ===");
        return result;
    }

    let mut app = ChatApp::new(router, events, config.dark_mode);
    if let Some(bridge) = &bridge {
        app = app.with_speech_signals(bridge.signals().clone());
    }
    let result = ui::run_app(&mut app);

    log_debug("=== Aurora Chat Exiting ===");
    if let Err(ref e) = result {
        log_debug(&format!("Exit with error: {e:#}"));
    }
    drop(bridge);

    result
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn MessageStore>> {
    if config.ephemeral {
        log_debug("history kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let dir = config.resolved_store_dir();
    let store = JsonlStore::open(&dir)
        .with_context(|| format!("failed to open history directory {}", dir.display()))?;
    Ok(Arc::new(store))
}

fn build_engine(config: &AppConfig, core: &RoutingCore) -> Result<Arc<dyn ResponseEngine>> {
    if config.mock_engine {
        log_debug("using scripted engine");
        return Ok(Arc::new(ScriptedEngine::new(
            config.mock_replies.clone(),
            core.input_observer(),
        )));
    }
    let settings = CommandEngineSettings::from_config(config)?;
    Ok(Arc::new(CommandEngine::new(settings, core.input_observer())))
}
