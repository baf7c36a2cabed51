use super::dispatch::Dispatcher;
use crate::engine::{is_silent_reply, ResponseEngine};
use crate::error::ChatError;
use crate::message::{Message, Status, Utterance};
use crate::utf8_safe::ellipsize;
use crate::{log_debug, log_debug_content};
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Engine entry point a job is sent through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryPoint {
    /// `process_text_input`; never speaks.
    TextOnly,
    /// `stream_graph_updates`; may speak.
    Full,
}

#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) id: u64,
    pub(crate) utterance: Utterance,
    pub(crate) entry: EntryPoint,
}

impl Job {
    pub(crate) fn new(utterance: Utterance, entry: EntryPoint) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            utterance,
            entry,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub(crate) engine_timeout: Duration,
    pub(crate) terminate_sentinel: String,
    pub(crate) capacity: usize,
}

/// Single background execution unit. Jobs run strictly one after another.
pub(crate) struct Worker {
    jobs: Option<Sender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        dispatcher: Arc<Dispatcher>,
        engine: Arc<dyn ResponseEngine>,
        settings: WorkerSettings,
    ) -> Result<Self> {
        let (tx, rx) = bounded(settings.capacity.max(1));
        let handle = thread::Builder::new()
            .name("aurora-worker".into())
            .spawn(move || run_jobs(&rx, &dispatcher, &engine, &settings))
            .context("failed to spawn response worker")?;
        Ok(Self {
            jobs: Some(tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn submit(&self, job: Job) -> Result<(), ChatError> {
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(ChatError::EngineFailure("worker stopped".into()));
        };
        jobs.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => ChatError::Busy,
            TrySendError::Disconnected(_) => ChatError::EngineFailure("worker stopped".into()),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_jobs(
    jobs: &Receiver<Job>,
    dispatcher: &Dispatcher,
    engine: &Arc<dyn ResponseEngine>,
    settings: &WorkerSettings,
) {
    for job in jobs.iter() {
        if job.entry == EntryPoint::TextOnly {
            // Submissions made while another job ran left the slot alone.
            dispatcher.arm_echo(job.utterance.text());
        }
        let started = Instant::now();
        let outcome = call_with_timeout(engine, &job, settings.engine_timeout);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::info!(job = job.id, entry = ?job.entry, elapsed_ms, "engine call finished"),
            Err(err) => tracing::warn!(job = job.id, entry = ?job.entry, elapsed_ms, error = %err, "engine call failed"),
        }
        complete(dispatcher, &job, outcome, &settings.terminate_sentinel);
    }
    log_debug("response worker exiting");
}

/// Run one engine call on its own thread and wait at most `timeout`. A reply
/// that arrives later is dropped.
pub(crate) fn call_with_timeout(
    engine: &Arc<dyn ResponseEngine>,
    job: &Job,
    timeout: Duration,
) -> Result<String, ChatError> {
    let (tx, rx) = bounded(1);
    let engine = Arc::clone(engine);
    let utterance = job.utterance.clone();
    let entry = job.entry;
    thread::Builder::new()
        .name(format!("aurora-engine-{}", job.id))
        .spawn(move || {
            let result = match entry {
                EntryPoint::TextOnly => engine.process_text_input(utterance.text()),
                EntryPoint::Full => engine.stream_graph_updates(&utterance),
            };
            let _ = tx.send(result.map_err(|err| format!("{err:#}")));
        })
        .map_err(|err| ChatError::EngineFailure(format!("failed to spawn engine call: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(message)) => Err(ChatError::EngineFailure(message)),
        Err(RecvTimeoutError::Timeout) => Err(ChatError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(ChatError::EngineFailure("engine call panicked".into()))
        }
    }
}

fn complete(
    dispatcher: &Dispatcher,
    job: &Job,
    outcome: Result<String, ChatError>,
    sentinel: &str,
) {
    let failed = match outcome {
        Ok(reply) if is_silent_reply(&reply, sentinel) => {
            log_debug(&format!("job {} produced no displayable reply", job.id));
            false
        }
        Ok(reply) => {
            log_debug_content(&format!(
                "assistant reply for job {}: {}",
                job.id,
                ellipsize(&reply, 30)
            ));
            dispatcher.emit_message(Message::assistant(reply));
            false
        }
        Err(err) => {
            log_debug(&format!("job {} failed: {err}", job.id));
            true
        }
    };

    dispatcher.with_state(|state| {
        state.pending_jobs = state.pending_jobs.saturating_sub(1);
        if state.pending_jobs > 0 {
            return;
        }
        // Voice output may already own the status after a spoken reply.
        let reset = match job.entry {
            EntryPoint::TextOnly => true,
            EntryPoint::Full => failed || state.status == Status::Processing,
        };
        if reset {
            dispatcher.apply_status(state, Status::Idle);
        }
    });
}
