//! Recognition lifecycle: owns the live recognizer handle, absorbs its
//! failures, and forces restarts when it goes quiet.
//!
//! ## State machine
//!
//! ```text
//! Stopped ──start()──► Starting ──(Started signal)──► Listening
//!                         │                               │
//!                         │        Ended / watchdog       │
//!                         ◄───── fresh handle + start ────┤
//!                                                         │
//!                 pause() → Paused     fatal error → Error
//! ```
//!
//! The external recognizer is observed to silently stop delivering events
//! without emitting its end signal; the periodic watchdog is the only
//! backstop. Every (re)start aborts the previous handle before a new one
//! exists, and each handle reports through its own channel, so a stale
//! handle's signals die with its receiver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::recognizer::{
    Fragment, RecognizerConfig, RecognizerErrorKind, RecognizerHandle, RecognizerProvider,
    RecognizerSignal,
};

/// Timing knobs for restart and stall recovery.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Delay before restarting after a natural recognizer end — absorbs the
    /// recognizer's routine end-of-utterance stops.
    pub restart_delay: Duration,
    /// Delay before retrying when a restart itself fails.
    pub retry_delay: Duration,
    /// Interval between watchdog liveness checks.
    pub watchdog_interval: Duration,
    /// Idle time after which a handle that is not reporting itself active is
    /// declared stalled.
    pub stall_after: Duration,
    /// Idle time after which even an "active" handle is forcibly restarted.
    pub hard_stall_after: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_millis(100),
            retry_delay: Duration::from_millis(500),
            watchdog_interval: Duration::from_secs(2),
            stall_after: Duration::from_secs(5),
            hard_stall_after: Duration::from_secs(10),
        }
    }
}

/// Where the manager currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Stopped,
    /// `start()` issued, waiting for the recognizer's Started signal.
    Starting,
    Listening,
    Paused,
    /// Fatal recognizer condition — no auto-restart until `resume()`.
    Error,
}

/// What the lifecycle surfaced to its owner after draining signals and
/// timers.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// Transcript fragments to align, in arrival order.
    Fragments(Vec<Fragment>),
    /// The recognizer confirmed it is capturing.
    Listening,
    /// Fatal condition; listening halted until the caller resumes
    /// explicitly.
    Fatal(RecognizerErrorKind),
    /// Retryable network trouble — surfaced, listening continues.
    NetworkTrouble,
}

/// Observable counters, in the spirit of the engine's other diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleDiagnostics {
    pub handles_created: u64,
    pub scheduled_restarts: u64,
    pub forced_restarts: u64,
    pub fragment_batches: u64,
    pub transient_errors: u64,
    pub fatal_errors: u64,
}

/// Owns at most one live [`RecognizerHandle`] at a time.
pub struct RecognitionLifecycle {
    provider: Arc<dyn RecognizerProvider>,
    config: RecognizerConfig,
    policy: RestartPolicy,
    state: ListenState,
    handle: Option<Box<dyn RecognizerHandle>>,
    signals: Option<Receiver<RecognizerSignal>>,
    /// Whether the live handle most recently reported itself capturing.
    handle_active: bool,
    last_activity: Instant,
    restart_due: Option<Instant>,
    next_watchdog_at: Instant,
    diagnostics: LifecycleDiagnostics,
}

impl RecognitionLifecycle {
    pub fn new(
        provider: Arc<dyn RecognizerProvider>,
        config: RecognizerConfig,
        policy: RestartPolicy,
        now: Instant,
    ) -> Self {
        let next_watchdog_at = now + policy.watchdog_interval;
        Self {
            provider,
            config,
            policy,
            state: ListenState::Stopped,
            handle: None,
            signals: None,
            handle_active: false,
            last_activity: now,
            restart_due: None,
            next_watchdog_at,
            diagnostics: LifecycleDiagnostics::default(),
        }
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn diagnostics(&self) -> LifecycleDiagnostics {
        self.diagnostics
    }

    fn should_listen(&self) -> bool {
        matches!(self.state, ListenState::Starting | ListenState::Listening)
    }

    /// Start (or restart) listening with a fresh handle.
    pub fn start(&mut self, now: Instant) -> Result<()> {
        self.release_handle();

        let (tx, rx) = unbounded();
        let mut handle = self.provider.create(&self.config, tx)?;
        handle.start()?;

        self.diagnostics.handles_created += 1;
        self.handle = Some(handle);
        self.signals = Some(rx);
        self.state = ListenState::Starting;
        self.handle_active = false;
        self.last_activity = now;
        self.restart_due = None;
        self.next_watchdog_at = now + self.policy.watchdog_interval;
        debug!(handles = self.diagnostics.handles_created, "recognizer handle started");
        Ok(())
    }

    /// Abort the live handle and stop restarting until `resume()`.
    pub fn pause(&mut self) {
        self.restart_due = None;
        self.release_handle();
        self.state = ListenState::Paused;
        info!("recognition paused");
    }

    /// Come back from `Paused` (or a fatal `Error`) with a fresh handle.
    pub fn resume(&mut self, now: Instant) -> Result<()> {
        self.start(now)
    }

    /// Tear everything down: pending restart, watchdog state, handle.
    /// Idempotent — safe to call when already stopped.
    pub fn shutdown(&mut self) {
        self.restart_due = None;
        self.release_handle();
        if self.state != ListenState::Stopped {
            self.state = ListenState::Stopped;
            info!("recognition stopped");
        }
    }

    /// Drain pending signals and fire due timers. Call from the driver loop.
    pub fn pump(&mut self, now: Instant) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();

        // Drain the live handle's channel. A swapped-out handle's channel is
        // dropped with it, so stale signals cannot reach us here.
        while let Some(signal) = self.try_recv() {
            self.on_signal(signal, now, &mut events);
        }

        if let Some(due) = self.restart_due {
            if now >= due {
                self.restart_due = None;
                if self.should_listen() {
                    self.diagnostics.scheduled_restarts += 1;
                    self.restart(now);
                }
            }
        }

        if now >= self.next_watchdog_at {
            self.next_watchdog_at = now + self.policy.watchdog_interval;
            self.watchdog_check(now);
        }

        events
    }

    fn try_recv(&mut self) -> Option<RecognizerSignal> {
        self.signals.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    fn on_signal(&mut self, signal: RecognizerSignal, now: Instant, events: &mut Vec<LifecycleEvent>) {
        match signal {
            RecognizerSignal::Started => {
                if self.should_listen() {
                    self.state = ListenState::Listening;
                }
                self.handle_active = true;
                self.last_activity = now;
                events.push(LifecycleEvent::Listening);
            }
            RecognizerSignal::Fragments(fragments) => {
                self.handle_active = true;
                self.last_activity = now;
                self.diagnostics.fragment_batches += 1;
                events.push(LifecycleEvent::Fragments(fragments));
            }
            RecognizerSignal::Ended => {
                self.handle_active = false;
                if self.should_listen() {
                    // Routine end-of-utterance stop — come back shortly.
                    self.restart_due = Some(now + self.policy.restart_delay);
                    debug!("recognizer ended — restart scheduled");
                }
            }
            RecognizerSignal::Error(kind) => {
                self.handle_active = false;
                self.on_error(kind, now, events);
            }
        }
    }

    fn on_error(
        &mut self,
        kind: RecognizerErrorKind,
        now: Instant,
        events: &mut Vec<LifecycleEvent>,
    ) {
        match kind {
            RecognizerErrorKind::NotAllowed | RecognizerErrorKind::AudioCapture => {
                self.diagnostics.fatal_errors += 1;
                self.restart_due = None;
                self.release_handle();
                self.state = ListenState::Error;
                warn!(?kind, "fatal recognizer error — listening halted");
                events.push(LifecycleEvent::Fatal(kind));
            }
            RecognizerErrorKind::NoSpeech => {
                // Routine quiet spell. Refresh activity so the watchdog
                // doesn't read it as a stall; the pending end/restart flow
                // handles recovery.
                self.diagnostics.transient_errors += 1;
                self.last_activity = now;
                debug!("no speech detected");
            }
            RecognizerErrorKind::Network => {
                self.diagnostics.transient_errors += 1;
                events.push(LifecycleEvent::NetworkTrouble);
                warn!("recognizer network error — will restart via normal flow");
            }
            RecognizerErrorKind::Aborted | RecognizerErrorKind::Other => {
                self.diagnostics.transient_errors += 1;
                debug!(?kind, "transient recognizer error absorbed");
            }
        }
    }

    fn watchdog_check(&mut self, now: Instant) {
        if !self.should_listen() {
            return;
        }
        let idle = now.duration_since(self.last_activity);
        let stalled_inactive = idle >= self.policy.stall_after && !self.handle_active;
        let stalled_hard = idle >= self.policy.hard_stall_after;
        if stalled_inactive || stalled_hard {
            warn!(
                idle_ms = idle.as_millis() as u64,
                handle_active = self.handle_active,
                "watchdog: recognizer stalled — forcing restart"
            );
            self.diagnostics.forced_restarts += 1;
            self.restart(now);
        }
    }

    /// Abort whatever exists and bring up a fresh handle. A failure here is
    /// retried after `retry_delay` instead of propagating.
    fn restart(&mut self, now: Instant) {
        if let Err(e) = self.start(now) {
            warn!(error = %e, "restart failed — retrying shortly");
            self.state = ListenState::Starting;
            self.restart_due = Some(now + self.policy.retry_delay);
        }
    }

    fn release_handle(&mut self) {
        // Abort the old handle before any new one can exist — the single
        // live-handle invariant.
        if let Some(mut handle) = self.handle.take() {
            handle.abort();
        }
        self.signals = None;
        self.handle_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::scripted::ScriptedProvider;
    use std::sync::atomic::Ordering;

    fn policy() -> RestartPolicy {
        RestartPolicy::default()
    }

    fn lifecycle_with(
        playbook: Vec<Vec<RecognizerSignal>>,
    ) -> (RecognitionLifecycle, Arc<crate::recognizer::scripted::ScriptedCounters>, Instant) {
        let provider = Arc::new(ScriptedProvider::new(playbook));
        let counters = provider.counters();
        let now = Instant::now();
        let lifecycle =
            RecognitionLifecycle::new(provider, RecognizerConfig::default(), policy(), now);
        (lifecycle, counters, now)
    }

    fn fragments(text: &str) -> RecognizerSignal {
        RecognizerSignal::Fragments(vec![Fragment {
            text: text.into(),
            is_final: true,
        }])
    }

    #[test]
    fn started_signal_moves_starting_to_listening() {
        let (mut lifecycle, _counters, t0) = lifecycle_with(vec![vec![RecognizerSignal::Started]]);
        lifecycle.start(t0).expect("start");
        assert_eq!(lifecycle.state(), ListenState::Starting);

        let events = lifecycle.pump(t0);
        assert!(matches!(events[0], LifecycleEvent::Listening));
        assert_eq!(lifecycle.state(), ListenState::Listening);
    }

    #[test]
    fn fragments_are_forwarded_in_order() {
        let (mut lifecycle, _counters, t0) = lifecycle_with(vec![vec![
            RecognizerSignal::Started,
            fragments("hello"),
            fragments("world"),
        ]]);
        lifecycle.start(t0).expect("start");

        let events = lifecycle.pump(t0);
        let texts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Fragments(f) => Some(f[0].text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["hello", "world"]);
        assert_eq!(lifecycle.diagnostics().fragment_batches, 2);
    }

    #[test]
    fn natural_end_schedules_a_delayed_restart() {
        let (mut lifecycle, counters, t0) =
            lifecycle_with(vec![vec![RecognizerSignal::Started, RecognizerSignal::Ended]]);
        lifecycle.start(t0).expect("start");
        lifecycle.pump(t0);
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);

        // Before the delay elapses: nothing.
        lifecycle.pump(t0 + Duration::from_millis(50));
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);

        // After the delay: fresh handle, old one aborted.
        lifecycle.pump(t0 + Duration::from_millis(150));
        assert_eq!(counters.created.load(Ordering::Relaxed), 2);
        assert_eq!(counters.aborted.load(Ordering::Relaxed), 1);
        assert_eq!(lifecycle.diagnostics().scheduled_restarts, 1);
    }

    #[test]
    fn hard_stall_forces_exactly_one_restart_and_resets_activity() {
        // Handle reports Started (active) and then goes silent forever.
        let (mut lifecycle, counters, t0) = lifecycle_with(vec![
            vec![RecognizerSignal::Started],
            vec![RecognizerSignal::Started],
        ]);
        lifecycle.start(t0).expect("start");
        lifecycle.pump(t0);

        // Silent for 11 simulated seconds: one forced restart, even though
        // the handle still claimed to be active.
        lifecycle.pump(t0 + Duration::from_secs(11));
        assert_eq!(counters.created.load(Ordering::Relaxed), 2);
        assert_eq!(lifecycle.diagnostics().forced_restarts, 1);

        // Activity was reset by the restart: the next watchdog pass sees a
        // short idle span and leaves the fresh handle alone.
        lifecycle.pump(t0 + Duration::from_secs(14));
        assert_eq!(counters.created.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn inactive_stall_restarts_after_the_shorter_threshold() {
        // An absorbed transient error leaves the handle inactive without
        // scheduling a restart.
        let (mut lifecycle, counters, t0) = lifecycle_with(vec![
            vec![
                RecognizerSignal::Started,
                RecognizerSignal::Error(RecognizerErrorKind::Other),
            ],
            vec![RecognizerSignal::Started],
        ]);
        lifecycle.start(t0).expect("start");
        lifecycle.pump(t0);

        // 4 s idle: below the inactive threshold.
        lifecycle.pump(t0 + Duration::from_secs(4));
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);

        // 6 s idle and not active: restart.
        lifecycle.pump(t0 + Duration::from_secs(6));
        assert_eq!(counters.created.load(Ordering::Relaxed), 2);
        assert_eq!(lifecycle.diagnostics().forced_restarts, 1);
    }

    #[test]
    fn no_speech_refreshes_activity_and_avoids_a_stall_verdict() {
        let (mut lifecycle, counters, t0) = lifecycle_with(vec![vec![RecognizerSignal::Started]]);
        lifecycle.start(t0).expect("start");
        lifecycle.pump(t0);

        // A no-speech error arriving late in the quiet spell must push the
        // activity timestamp forward.
        let mut events = Vec::new();
        lifecycle.on_signal(
            RecognizerSignal::Error(RecognizerErrorKind::NoSpeech),
            t0 + Duration::from_secs(9),
            &mut events,
        );
        assert!(events.is_empty());

        // 11 s after start but only 2 s after the no-speech refresh — the
        // hard-stall branch must not fire.
        lifecycle.pump(t0 + Duration::from_secs(11));
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);
        assert_eq!(lifecycle.diagnostics().forced_restarts, 0);
    }

    #[test]
    fn fatal_error_halts_restarts_until_resume() {
        let (mut lifecycle, counters, t0) = lifecycle_with(vec![
            vec![
                RecognizerSignal::Started,
                RecognizerSignal::Error(RecognizerErrorKind::NotAllowed),
            ],
            vec![RecognizerSignal::Started],
        ]);
        lifecycle.start(t0).expect("start");
        let events = lifecycle.pump(t0);
        assert!(events
            .iter()
            .any(|e| matches!(e, LifecycleEvent::Fatal(RecognizerErrorKind::NotAllowed))));
        assert_eq!(lifecycle.state(), ListenState::Error);

        // Watchdog horizon passes: no auto-restart from Error.
        lifecycle.pump(t0 + Duration::from_secs(30));
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);

        // Explicit resume brings up a fresh handle.
        lifecycle
            .resume(t0 + Duration::from_secs(31))
            .expect("resume");
        assert_eq!(counters.created.load(Ordering::Relaxed), 2);
        assert_eq!(lifecycle.state(), ListenState::Starting);
    }

    #[test]
    fn network_error_is_surfaced_but_not_fatal() {
        let (mut lifecycle, _counters, t0) = lifecycle_with(vec![vec![
            RecognizerSignal::Started,
            RecognizerSignal::Error(RecognizerErrorKind::Network),
        ]]);
        lifecycle.start(t0).expect("start");
        let events = lifecycle.pump(t0);
        assert!(events.iter().any(|e| matches!(e, LifecycleEvent::NetworkTrouble)));
        assert_eq!(lifecycle.state(), ListenState::Listening);
    }

    #[test]
    fn pause_cancels_a_pending_restart() {
        let (mut lifecycle, counters, t0) =
            lifecycle_with(vec![vec![RecognizerSignal::Started, RecognizerSignal::Ended]]);
        lifecycle.start(t0).expect("start");
        lifecycle.pump(t0);

        lifecycle.pause();
        assert_eq!(counters.aborted.load(Ordering::Relaxed), 1);

        // Past the restart delay and several watchdog horizons: still one
        // handle ever created.
        lifecycle.pump(t0 + Duration::from_secs(30));
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);
        assert_eq!(lifecycle.state(), ListenState::Paused);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (mut lifecycle, counters, t0) = lifecycle_with(vec![vec![RecognizerSignal::Started]]);
        lifecycle.start(t0).expect("start");
        lifecycle.shutdown();
        lifecycle.shutdown();
        assert_eq!(lifecycle.state(), ListenState::Stopped);
        assert_eq!(counters.aborted.load(Ordering::Relaxed), 1);
    }
}
