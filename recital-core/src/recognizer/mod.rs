//! Abstract speech-recognizer capability.
//!
//! The engine never talks to a real recognizer directly. A
//! [`RecognizerProvider`] is injected into the lifecycle manager and creates
//! one disposable [`RecognizerHandle`] per (re)start. Every handle reports
//! back through its own signal channel, so signals from an aborted handle
//! can never leak into its successor.

pub mod scripted;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Recognizer session configuration, applied to every handle the provider
/// creates.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Keep recognizing across utterance boundaries.
    pub continuous: bool,
    /// Deliver interim (non-final) fragments as they form.
    pub interim_results: bool,
    /// BCP 47 language tag, e.g. `en-US`.
    pub language: String,
    /// How many alternative hypotheses the recognizer may produce per
    /// fragment.
    pub max_alternatives: u32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: "en-US".into(),
            max_alternatives: 3,
        }
    }
}

/// One entry of a transcript batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Transcribed text, possibly several words.
    pub text: String,
    /// Final fragments will not be revised; interim ones may be.
    pub is_final: bool,
}

/// Classified recognizer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognizerErrorKind {
    /// Nothing was said — routine during pauses in speech.
    NoSpeech,
    /// Microphone permission denied.
    NotAllowed,
    /// No capture device available.
    AudioCapture,
    Network,
    /// The handle was aborted by us.
    Aborted,
    Other,
}

impl RecognizerErrorKind {
    /// Errors the learner must resolve before listening can continue.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::NotAllowed | Self::AudioCapture)
    }
}

/// Everything a live handle can report.
#[derive(Debug, Clone)]
pub enum RecognizerSignal {
    /// The recognizer accepted `start()` and is capturing.
    Started,
    /// A batch of transcript fragments, in recognition order.
    Fragments(Vec<Fragment>),
    /// The recognizer stopped on its own (end of utterance, idle timeout).
    Ended,
    Error(RecognizerErrorKind),
}

/// One live connection to the external recognizer.
pub trait RecognizerHandle: Send {
    /// Begin capturing. Signals arrive on the channel passed at creation.
    fn start(&mut self) -> Result<()>;

    /// Graceful stop — the handle may still flush pending fragments.
    fn stop(&mut self);

    /// Hard abort — no further signals are wanted.
    fn abort(&mut self);
}

/// Factory for recognizer handles — the capability seam that makes the
/// engine testable without a real recognizer.
pub trait RecognizerProvider: Send + Sync + 'static {
    fn create(
        &self,
        config: &RecognizerConfig,
        signals: Sender<RecognizerSignal>,
    ) -> Result<Box<dyn RecognizerHandle>>;
}
