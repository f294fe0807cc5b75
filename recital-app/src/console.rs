//! Stdin-driven recognizer: each typed line becomes one final transcript
//! fragment, so a full session can be exercised without a microphone.
//!
//! The provider keeps at most one live slot, shared with its handles.
//! Starting a handle claims the slot; aborting or stopping that same handle
//! releases it. Text pushed while no handle is live is dropped, exactly like
//! speech into a closed microphone.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use recital_core::{
    Fragment, RecognizerConfig, RecognizerHandle, RecognizerProvider, RecognizerSignal,
};
use tracing::debug;

struct LiveSlot {
    generation: u64,
    signals: Sender<RecognizerSignal>,
}

/// Recognizer provider fed by [`ConsoleRecognizer::push_line`].
#[derive(Default)]
pub struct ConsoleRecognizer {
    slot: Arc<Mutex<Option<LiveSlot>>>,
    generations: AtomicU64,
}

impl ConsoleRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one typed line as a final transcript fragment.
    /// Returns `false` when no handle is listening.
    pub fn push_line(&self, line: &str) -> bool {
        let slot = self.slot.lock();
        match slot.as_ref() {
            Some(live) => live
                .signals
                .send(RecognizerSignal::Fragments(vec![Fragment {
                    text: line.to_string(),
                    is_final: true,
                }]))
                .is_ok(),
            None => false,
        }
    }

    /// `true` while some handle holds the slot.
    pub fn is_listening(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl RecognizerProvider for ConsoleRecognizer {
    fn create(
        &self,
        _config: &RecognizerConfig,
        signals: Sender<RecognizerSignal>,
    ) -> recital_core::error::Result<Box<dyn RecognizerHandle>> {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ConsoleHandle {
            generation,
            signals,
            slot: Arc::clone(&self.slot),
        }))
    }
}

struct ConsoleHandle {
    generation: u64,
    signals: Sender<RecognizerSignal>,
    slot: Arc<Mutex<Option<LiveSlot>>>,
}

impl ConsoleHandle {
    fn release(&self) {
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|live| live.generation == self.generation)
        {
            *slot = None;
        }
    }
}

impl RecognizerHandle for ConsoleHandle {
    fn start(&mut self) -> recital_core::error::Result<()> {
        *self.slot.lock() = Some(LiveSlot {
            generation: self.generation,
            signals: self.signals.clone(),
        });
        let _ = self.signals.send(RecognizerSignal::Started);
        debug!(generation = self.generation, "console recognizer listening");
        Ok(())
    }

    fn stop(&mut self) {
        self.release();
    }

    fn abort(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn pushed_lines_reach_the_live_handle() {
        let recognizer = ConsoleRecognizer::new();
        assert!(!recognizer.push_line("nobody listening"));

        let (tx, rx) = unbounded();
        let mut handle = recognizer
            .create(&RecognizerConfig::default(), tx)
            .expect("create handle");
        handle.start().expect("start handle");
        assert!(matches!(rx.try_recv(), Ok(RecognizerSignal::Started)));

        assert!(recognizer.push_line("hello there"));
        match rx.try_recv() {
            Ok(RecognizerSignal::Fragments(fragments)) => {
                assert_eq!(fragments[0].text, "hello there");
                assert!(fragments[0].is_final);
            }
            other => panic!("unexpected signal: {other:?}"),
        }

        handle.abort();
        assert!(!recognizer.is_listening());
        assert!(!recognizer.push_line("after abort"));
    }

    #[test]
    fn a_stale_handle_cannot_release_its_successor() {
        let recognizer = ConsoleRecognizer::new();

        let (tx1, _rx1) = unbounded();
        let mut first = recognizer
            .create(&RecognizerConfig::default(), tx1)
            .expect("create first");
        first.start().expect("start first");

        let (tx2, rx2) = unbounded();
        let mut second = recognizer
            .create(&RecognizerConfig::default(), tx2)
            .expect("create second");
        second.start().expect("start second");

        // Aborting the superseded handle must not silence the live one.
        first.abort();
        assert!(recognizer.is_listening());
        assert!(recognizer.push_line("still here"));
        let _ = rx2.try_recv(); // Started
        assert!(matches!(
            rx2.try_recv(),
            Ok(RecognizerSignal::Fragments(_))
        ));
    }
}
