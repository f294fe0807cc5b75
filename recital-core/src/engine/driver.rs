//! Blocking session driver loop.
//!
//! ## Per-iteration work
//!
//! ```text
//! 1. Apply queued user commands (pause / resume / skip / restart / shutdown)
//! 2. Pump the recognition lifecycle (signals, restart timer, watchdog)
//! 3. Align fresh spoken tokens, emit progress
//! 4. Advance the elapsed clock while Active
//! 5. Expire the live-transcript preview
//! 6. On completion: score once, persist, broadcast, exit
//! ```
//!
//! The loop runs in `spawn_blocking`, keeping the async executor free. Every
//! mutation of session state happens here, one event at a time, so handlers
//! never race each other no matter how the environment interleaves signals.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    engine::{EngineConfig, PreparedScript, SessionSnapshot},
    events::{MicStatus, MicStatusEvent, OutcomeEvent, ProgressEvent, TranscriptPreviewEvent},
    lifecycle::{LifecycleEvent, RecognitionLifecycle},
    providers::{ScoreRecord, ScoreSink},
    recognizer::RecognizerErrorKind,
    script,
    session::{Session, SessionPhase},
};

/// User commands applied by the driver, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Pause,
    Resume,
    Skip,
    Restart,
    Shutdown,
}

/// All context the driver needs, passed as one struct so the closure stays
/// tidy.
pub(crate) struct DriverContext {
    pub(crate) config: EngineConfig,
    pub(crate) session: Session,
    pub(crate) lifecycle: RecognitionLifecycle,
    pub(crate) commands: Receiver<Command>,
    pub(crate) plan: PreparedScript,
    pub(crate) scores: Arc<dyn ScoreSink>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) snapshot: Arc<Mutex<SessionSnapshot>>,
    pub(crate) seq: Arc<AtomicU64>,
    pub(crate) progress_tx: broadcast::Sender<ProgressEvent>,
    pub(crate) transcript_tx: broadcast::Sender<TranscriptPreviewEvent>,
    pub(crate) status_tx: broadcast::Sender<MicStatusEvent>,
    pub(crate) outcome_tx: broadcast::Sender<OutcomeEvent>,
}

/// Observer-facing state owned by the loop alongside the session.
struct View {
    live_transcript: String,
    transcript_clear_due: Option<Instant>,
    mic_status: MicStatus,
    last_error: Option<String>,
}

/// Run the driver until the attempt completes or a shutdown is requested.
pub(crate) fn run(mut ctx: DriverContext) {
    info!(
        words = ctx.session.total_words(),
        expected_seconds = ctx.session.expected_seconds(),
        "session driver started"
    );

    let mut view = View {
        live_transcript: String::new(),
        transcript_clear_due: None,
        mic_status: MicStatus::Idle,
        last_error: None,
    };

    ctx.session.start();
    let now = Instant::now();
    if let Err(e) = ctx.lifecycle.start(now) {
        // Surfaced like a fatal recognizer error; the learner can resume.
        warn!(error = %e, "recognizer failed to start");
        ctx.session.pause();
        view.mic_status = MicStatus::Error;
        view.last_error = Some(e.to_string());
        emit_status(&ctx, MicStatus::Error, view.last_error.clone());
    }
    let mut next_tick_at = now + ctx.config.tick_interval;
    publish_snapshot(&ctx, &view);

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }
        let now = Instant::now();
        let mut idle = true;
        let mut dirty = false;

        // ── 1. User commands ─────────────────────────────────────────────
        loop {
            match ctx.commands.try_recv() {
                Ok(command) => {
                    idle = false;
                    dirty = true;
                    apply_command(&mut ctx, &mut view, command, now, &mut next_tick_at);
                    // A completing skip ends the attempt; anything still
                    // queued belongs to nobody.
                    if ctx.session.is_complete() {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // The engine handle is gone; nobody can command us again.
                    ctx.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // ── 2. Recognition lifecycle ─────────────────────────────────────
        for event in ctx.lifecycle.pump(now) {
            idle = false;
            dirty = true;
            apply_lifecycle_event(&mut ctx, &mut view, event, now);
        }

        // ── 3. Elapsed clock ─────────────────────────────────────────────
        if ctx.session.phase() == SessionPhase::Active && now >= next_tick_at {
            next_tick_at += ctx.config.tick_interval;
            if ctx.session.tick() {
                dirty = true;
                emit_progress(&ctx);
            }
        }

        // ── 4. Live-transcript expiry ────────────────────────────────────
        if let Some(due) = view.transcript_clear_due {
            if now >= due {
                view.transcript_clear_due = None;
                if !view.live_transcript.is_empty() {
                    view.live_transcript.clear();
                    emit_transcript(&ctx, "");
                    dirty = true;
                }
            }
        }

        // ── 5. Completion ────────────────────────────────────────────────
        if ctx.session.is_complete() {
            finish_attempt(&mut ctx, &mut view);
            break;
        }

        if dirty {
            publish_snapshot(&ctx, &view);
        }
        if idle {
            thread::sleep(ctx.config.idle_sleep);
        }
    }

    // Teardown order: pending restart + watchdog die with the lifecycle,
    // then the preview timer, then the handle is released. Idempotent.
    // No snapshot write here — an abandoning engine may already have
    // cleared it for the next script.
    view.transcript_clear_due = None;
    ctx.lifecycle.shutdown();
    ctx.running.store(false, Ordering::SeqCst);

    let diag = ctx.lifecycle.diagnostics();
    info!(
        handles_created = diag.handles_created,
        scheduled_restarts = diag.scheduled_restarts,
        forced_restarts = diag.forced_restarts,
        fragment_batches = diag.fragment_batches,
        transient_errors = diag.transient_errors,
        fatal_errors = diag.fatal_errors,
        "session driver stopped — diagnostics"
    );
}

fn apply_command(
    ctx: &mut DriverContext,
    view: &mut View,
    command: Command,
    now: Instant,
    next_tick_at: &mut Instant,
) {
    debug!(?command, "applying command");
    match command {
        Command::Pause => {
            ctx.session.pause();
            ctx.lifecycle.pause();
            view.transcript_clear_due = None;
            view.live_transcript.clear();
            view.mic_status = MicStatus::Idle;
            emit_status(ctx, MicStatus::Idle, None);
        }
        Command::Resume => {
            if ctx.session.is_complete() {
                return;
            }
            ctx.session.resume();
            *next_tick_at = now + ctx.config.tick_interval;
            match ctx.lifecycle.resume(now) {
                Ok(()) => {
                    view.last_error = None;
                }
                Err(e) => {
                    warn!(error = %e, "recognizer failed to resume");
                    ctx.session.pause();
                    view.mic_status = MicStatus::Error;
                    view.last_error = Some(e.to_string());
                    emit_status(ctx, MicStatus::Error, view.last_error.clone());
                }
            }
        }
        Command::Skip => {
            let update = ctx.session.skip();
            if update.progressed {
                emit_progress(ctx);
            }
        }
        Command::Restart => {
            // A retry is a brand-new attempt: fresh counters, every word
            // unmatched, clock at zero, fresh recognizer handle.
            ctx.session = Session::new(
                ctx.plan.words.clone(),
                ctx.plan.plan.expected_seconds,
            );
            ctx.session.start();
            *next_tick_at = now + ctx.config.tick_interval;
            view.live_transcript.clear();
            view.transcript_clear_due = None;
            view.last_error = None;
            if let Err(e) = ctx.lifecycle.start(now) {
                warn!(error = %e, "recognizer failed to restart");
                view.mic_status = MicStatus::Error;
                view.last_error = Some(e.to_string());
                emit_status(ctx, MicStatus::Error, view.last_error.clone());
            }
            emit_progress(ctx);
            info!("attempt restarted");
        }
        Command::Shutdown => {
            ctx.running.store(false, Ordering::SeqCst);
        }
    }
}

fn apply_lifecycle_event(
    ctx: &mut DriverContext,
    view: &mut View,
    event: LifecycleEvent,
    now: Instant,
) {
    match event {
        LifecycleEvent::Fragments(fragments) => {
            if ctx.session.phase() != SessionPhase::Active {
                return;
            }
            view.live_transcript = script::live_preview(&fragments);
            view.transcript_clear_due = Some(now + ctx.config.transcript_hold);
            emit_transcript(ctx, &view.live_transcript);

            for token in script::recent_spoken_tokens(&fragments) {
                let update = ctx.session.speak(&token);
                if update.progressed {
                    emit_progress(ctx);
                }
                if update.completed {
                    break;
                }
            }
        }
        LifecycleEvent::Listening => {
            view.mic_status = MicStatus::Listening;
            view.last_error = None;
            emit_status(ctx, MicStatus::Listening, None);
        }
        LifecycleEvent::Fatal(kind) => {
            let detail = fatal_detail(kind);
            view.mic_status = MicStatus::Error;
            view.last_error = Some(detail.clone());
            // Clock stops; counters stay. The learner resumes explicitly.
            ctx.session.pause();
            emit_status(ctx, MicStatus::Error, Some(detail));
        }
        LifecycleEvent::NetworkTrouble => {
            emit_status(
                ctx,
                view.mic_status,
                Some("Network error. Check your internet connection.".into()),
            );
        }
    }
}

fn fatal_detail(kind: RecognizerErrorKind) -> String {
    match kind {
        RecognizerErrorKind::NotAllowed => {
            "Microphone access denied. Allow microphone access and resume.".into()
        }
        RecognizerErrorKind::AudioCapture => {
            "No microphone found. Connect a microphone and resume.".into()
        }
        other => format!("Recognizer error: {other:?}"),
    }
}

fn finish_attempt(ctx: &mut DriverContext, view: &mut View) {
    // Recognition is done with before the score leaves the building.
    ctx.lifecycle.shutdown();
    view.transcript_clear_due = None;
    view.live_transcript.clear();
    view.mic_status = MicStatus::Idle;

    let Some(result) = ctx.session.outcome() else {
        debug_assert!(false, "complete session without outcome");
        return;
    };

    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let _ = ctx.outcome_tx.send(OutcomeEvent { seq, result });
    emit_progress(ctx);
    emit_status(ctx, MicStatus::Idle, None);

    let totals = ctx.session.totals();
    let record = ScoreRecord {
        topic: ctx.plan.request.topic.clone(),
        duration_id: ctx.plan.request.duration_id.clone(),
        score: result.final_score,
        time_component: result.time_component,
        accuracy_component: result.accuracy_component,
        fluency_component: result.fluency_component,
        words_matched: totals.matched,
        total_words: totals.total_words,
        time_taken: totals.elapsed_seconds,
        expected_time: totals.expected_seconds,
        accuracy: result.accuracy_percent,
        script_text: ctx.plan.plan.text.clone(),
    };
    // Fire-and-forget: the surfaced result never depends on storage.
    if let Err(e) = ctx.scores.persist(&record) {
        warn!(error = %e, "score persistence failed");
    }

    publish_snapshot(ctx, view);
    info!(
        final_score = result.final_score,
        matched = totals.matched,
        skipped = totals.skipped,
        elapsed = totals.elapsed_seconds,
        "attempt complete"
    );
}

fn emit_progress(ctx: &DriverContext) {
    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let _ = ctx.progress_tx.send(ProgressEvent {
        seq,
        cursor: ctx.session.cursor_position(),
        matched_count: ctx.session.matched_count(),
        skipped_count: ctx.session.skipped_count(),
        elapsed_seconds: ctx.session.elapsed_seconds(),
        total_words: ctx.session.total_words(),
    });
}

fn emit_transcript(ctx: &DriverContext, text: &str) {
    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let _ = ctx.transcript_tx.send(TranscriptPreviewEvent {
        seq,
        text: text.to_string(),
    });
}

fn emit_status(ctx: &DriverContext, status: MicStatus, detail: Option<String>) {
    let _ = ctx.status_tx.send(MicStatusEvent { status, detail });
}

fn publish_snapshot(ctx: &DriverContext, view: &View) {
    let mut snapshot = ctx.snapshot.lock();
    *snapshot = SessionSnapshot {
        phase: ctx.session.phase(),
        mic_status: view.mic_status,
        cursor: ctx.session.cursor_position(),
        matched_count: ctx.session.matched_count(),
        skipped_count: ctx.session.skipped_count(),
        elapsed_seconds: ctx.session.elapsed_seconds(),
        expected_seconds: ctx.session.expected_seconds(),
        total_words: ctx.session.total_words(),
        matched_flags: ctx.session.matched_flags(),
        live_transcript: view.live_transcript.clone(),
        outcome: ctx.session.outcome(),
        last_error: view.last_error.clone(),
    };
}
