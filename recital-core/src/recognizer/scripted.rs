//! `ScriptedProvider` — replay-based recognizer for tests and offline runs.
//!
//! Each created handle pops the next signal batch from the playbook and
//! replays it synchronously when `start()` is called. Handles created after
//! the playbook runs dry stay silent. Counters expose how many handles were
//! created, started, stopped and aborted, so tests can assert on restart
//! behaviour.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::debug;

use super::{RecognizerConfig, RecognizerHandle, RecognizerProvider, RecognizerSignal};
use crate::error::Result;

/// Observable lifecycle counters for a [`ScriptedProvider`].
#[derive(Debug, Default)]
pub struct ScriptedCounters {
    pub created: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub aborted: AtomicUsize,
}

pub struct ScriptedProvider {
    playbook: Mutex<VecDeque<Vec<RecognizerSignal>>>,
    counters: Arc<ScriptedCounters>,
}

impl ScriptedProvider {
    /// Each inner vec is replayed by one handle's `start()`, in order.
    /// Nothing is sent implicitly — script a `Started` signal explicitly
    /// when the handle should report itself live.
    pub fn new(playbook: Vec<Vec<RecognizerSignal>>) -> Self {
        Self {
            playbook: Mutex::new(playbook.into_iter().collect()),
            counters: Arc::new(ScriptedCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<ScriptedCounters> {
        Arc::clone(&self.counters)
    }
}

impl RecognizerProvider for ScriptedProvider {
    fn create(
        &self,
        _config: &RecognizerConfig,
        signals: Sender<RecognizerSignal>,
    ) -> Result<Box<dyn RecognizerHandle>> {
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        let script = self.playbook.lock().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedHandle {
            script,
            signals,
            counters: Arc::clone(&self.counters),
            started: false,
        }))
    }
}

struct ScriptedHandle {
    script: Vec<RecognizerSignal>,
    signals: Sender<RecognizerSignal>,
    counters: Arc<ScriptedCounters>,
    started: bool,
}

impl RecognizerHandle for ScriptedHandle {
    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        for signal in self.script.drain(..) {
            // Receiver may already be gone during teardown; that's fine.
            let _ = self.signals.send(signal);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.counters.stopped.fetch_add(1, Ordering::Relaxed);
        debug!("scripted handle stopped");
    }

    fn abort(&mut self) {
        self.counters.aborted.fetch_add(1, Ordering::Relaxed);
        debug!("scripted handle aborted");
    }
}
