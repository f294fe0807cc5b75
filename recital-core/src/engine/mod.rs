//! `RecitalEngine` — top-level session controller.
//!
//! ## Lifecycle
//!
//! ```text
//! RecitalEngine::new()
//!     └─► prepare()            → script fetched + tokenized, snapshot = Idle
//!         └─► start_session()  → driver loop spawned, recognizer started
//!             ├─► pause() / resume() / skip_current_word() / restart_attempt()
//!             └─► (completion) → ScoreResult broadcast + handed to the sink
//! ```
//!
//! All session state lives inside the driver loop; user commands are queued
//! and applied one at a time, so no recognizer callback or timer can ever
//! observe a half-applied mutation.

mod driver;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    error::{RecitalError, Result},
    events::{MicStatus, MicStatusEvent, OutcomeEvent, ProgressEvent, TranscriptPreviewEvent},
    lifecycle::{RecognitionLifecycle, RestartPolicy},
    providers::{ScoreSink, ScriptPlan, ScriptProvider, ScriptRequest},
    recognizer::{RecognizerConfig, RecognizerProvider},
    scoring::ScoreResult,
    script::{self, TargetWord},
    session::{Session, SessionPhase},
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for [`RecitalEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Recognizer configuration (language tag etc.), applied to every handle.
    pub recognizer: RecognizerConfig,
    /// Restart / watchdog timing.
    pub restart_policy: RestartPolicy,
    /// How long the live transcript preview survives without new fragments.
    /// Default: 2 s.
    pub transcript_hold: Duration,
    /// Elapsed-time clock resolution. Default: 1 s.
    pub tick_interval: Duration,
    /// Driver loop sleep when no work is pending (avoids busy-wait burning a
    /// core). Default: 5 ms.
    pub idle_sleep: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerConfig::default(),
            restart_policy: RestartPolicy::default(),
            transcript_hold: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            idle_sleep: Duration::from_millis(5),
        }
    }
}

/// Read-only view of the current session, refreshed by the driver after
/// every mutation. The only thing observers read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub mic_status: MicStatus,
    pub cursor: usize,
    pub matched_count: u32,
    pub skipped_count: u32,
    pub elapsed_seconds: u32,
    pub expected_seconds: u32,
    pub total_words: usize,
    pub matched_flags: Vec<bool>,
    pub live_transcript: String,
    pub outcome: Option<ScoreResult>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    fn empty() -> Self {
        Self {
            phase: SessionPhase::Idle,
            mic_status: MicStatus::Idle,
            cursor: 0,
            matched_count: 0,
            skipped_count: 0,
            elapsed_seconds: 0,
            expected_seconds: 0,
            total_words: 0,
            matched_flags: Vec::new(),
            live_transcript: String::new(),
            outcome: None,
            last_error: None,
        }
    }

    fn idle_for(words: &[TargetWord], expected_seconds: u32) -> Self {
        Self {
            expected_seconds,
            total_words: words.len(),
            matched_flags: vec![false; words.len()],
            ..Self::empty()
        }
    }
}

/// A fetched script ready to practice against, kept so retries can rebuild
/// a fresh attempt without another fetch.
#[derive(Debug, Clone)]
pub struct PreparedScript {
    pub request: ScriptRequest,
    pub plan: ScriptPlan,
    pub words: Vec<TargetWord>,
}

/// The top-level engine handle.
///
/// `RecitalEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<RecitalEngine>` to share between the caller and
/// event-forwarding tasks.
pub struct RecitalEngine {
    config: EngineConfig,
    scripts: Arc<dyn ScriptProvider>,
    recognizers: Arc<dyn RecognizerProvider>,
    scores: Arc<dyn ScoreSink>,
    prepared: Mutex<Option<PreparedScript>>,
    /// `true` while a session driver loop is alive.
    running: Arc<AtomicBool>,
    commands: Mutex<Option<Sender<driver::Command>>>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
    /// Monotonically increasing event sequence counter.
    seq: Arc<AtomicU64>,
    progress_tx: broadcast::Sender<ProgressEvent>,
    transcript_tx: broadcast::Sender<TranscriptPreviewEvent>,
    status_tx: broadcast::Sender<MicStatusEvent>,
    outcome_tx: broadcast::Sender<OutcomeEvent>,
}

impl RecitalEngine {
    pub fn new(
        config: EngineConfig,
        scripts: Arc<dyn ScriptProvider>,
        recognizers: Arc<dyn RecognizerProvider>,
        scores: Arc<dyn ScoreSink>,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (transcript_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (outcome_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            scripts,
            recognizers,
            scores,
            prepared: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            commands: Mutex::new(None),
            snapshot: Arc::new(Mutex::new(SessionSnapshot::empty())),
            seq: Arc::new(AtomicU64::new(0)),
            progress_tx,
            transcript_tx,
            status_tx,
            outcome_tx,
        }
    }

    /// Fetch and tokenize a script. No session state is created if the
    /// collaborator fails.
    ///
    /// # Errors
    /// - [`RecitalError::AlreadyRunning`] while a session is live.
    /// - [`RecitalError::ScriptFetch`] on collaborator failure or an empty
    ///   script.
    pub fn prepare(&self, request: ScriptRequest) -> Result<ScriptPlan> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RecitalError::AlreadyRunning);
        }

        let plan = self.scripts.fetch(&request)?;
        let words = script::tokenize_script(&plan.text);
        if words.is_empty() {
            return Err(RecitalError::ScriptFetch(
                "script contained no words".into(),
            ));
        }

        info!(
            topic = %request.topic,
            duration = %request.duration_id,
            words = words.len(),
            expected_seconds = plan.expected_seconds,
            "script prepared"
        );

        *self.snapshot.lock() = SessionSnapshot::idle_for(&words, plan.expected_seconds);
        *self.prepared.lock() = Some(PreparedScript {
            request,
            plan: plan.clone(),
            words,
        });
        Ok(plan)
    }

    /// Begin a fresh attempt over the prepared script.
    ///
    /// Spawns the blocking driver loop and returns immediately; progress is
    /// observable through the snapshot and the broadcast streams.
    ///
    /// # Errors
    /// - [`RecitalError::AlreadyRunning`] if a session is live.
    /// - [`RecitalError::NoScript`] if `prepare()` has not succeeded.
    pub fn start_session(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RecitalError::AlreadyRunning);
        }

        let prepared = match self.prepared.lock().clone() {
            Some(p) => p,
            None => {
                self.running.store(false, Ordering::SeqCst);
                return Err(RecitalError::NoScript);
            }
        };

        let session = Session::new(prepared.words.clone(), prepared.plan.expected_seconds);
        let lifecycle = RecognitionLifecycle::new(
            Arc::clone(&self.recognizers),
            self.config.recognizer.clone(),
            self.config.restart_policy.clone(),
            std::time::Instant::now(),
        );

        let (command_tx, command_rx) = unbounded();
        *self.commands.lock() = Some(command_tx);

        let ctx = driver::DriverContext {
            config: self.config.clone(),
            session,
            lifecycle,
            commands: command_rx,
            plan: prepared,
            scores: Arc::clone(&self.scores),
            running: Arc::clone(&self.running),
            snapshot: Arc::clone(&self.snapshot),
            seq: Arc::clone(&self.seq),
            progress_tx: self.progress_tx.clone(),
            transcript_tx: self.transcript_tx.clone(),
            status_tx: self.status_tx.clone(),
            outcome_tx: self.outcome_tx.clone(),
        };

        tokio::task::spawn_blocking(move || driver::run(ctx));
        info!("session started");
        Ok(())
    }

    /// Suspend listening and the clock; counters stay put.
    pub fn pause(&self) -> Result<()> {
        self.send(driver::Command::Pause)
    }

    /// Come back from pause (or from a fatal recognizer error).
    pub fn resume(&self) -> Result<()> {
        self.send(driver::Command::Resume)
    }

    /// Give up on the current word and move past it.
    pub fn skip_current_word(&self) -> Result<()> {
        self.send(driver::Command::Skip)
    }

    /// Throw the attempt away and start over on the same script.
    ///
    /// Live session: the driver swaps in a fresh attempt immediately.
    /// Finished session: the next `start_session()` begins the new attempt.
    pub fn restart_attempt(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            self.send(driver::Command::Restart)
        } else {
            let prepared = self.prepared.lock().clone().ok_or(RecitalError::NoScript)?;
            *self.snapshot.lock() =
                SessionSnapshot::idle_for(&prepared.words, prepared.plan.expected_seconds);
            Ok(())
        }
    }

    /// Tear the session down and forget the script. Call `prepare()` again
    /// for a new one. Safe to call at any time.
    pub fn abandon_for_new_script(&self) {
        let _ = self.send(driver::Command::Shutdown);
        // The driver drains its queue within an idle sleep or two; wait for
        // it so the cleared snapshot below is the last word.
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while self.running.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        *self.commands.lock() = None;
        *self.prepared.lock() = None;
        *self.snapshot.lock() = SessionSnapshot::empty();
        info!("script abandoned");
    }

    /// `true` while a session driver loop is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current session view (clone of the authoritative state).
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.lock().clone()
    }

    /// Subscribe to alignment/clock progress events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    /// Subscribe to live transcript preview events.
    pub fn subscribe_transcript(&self) -> broadcast::Receiver<TranscriptPreviewEvent> {
        self.transcript_tx.subscribe()
    }

    /// Subscribe to microphone status events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<MicStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to attempt outcomes (one event per completed attempt).
    pub fn subscribe_outcome(&self) -> broadcast::Receiver<OutcomeEvent> {
        self.outcome_tx.subscribe()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn send(&self, command: driver::Command) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(RecitalError::NotRunning);
        }
        match self.commands.lock().as_ref() {
            Some(tx) if tx.send(command).is_ok() => Ok(()),
            _ => Err(RecitalError::NotRunning),
        }
    }
}
