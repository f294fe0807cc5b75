//! # recital-core
//!
//! Reusable speech-practice session engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Recognizer (external) → RecognitionLifecycle → AlignmentCursor
//!          │                      │                    │
//!    signal channel        watchdog / restart     match events
//!          │                      │                    │
//!          └──────────► session driver loop ◄──────────┘
//!                              │
//!                     scoring::score on completion
//!                              │
//!                   broadcast::Sender<…Event> + ScoreSink
//! ```
//!
//! All session state is owned by one blocking driver loop fed by a
//! command/event queue, so mutations from recognizer callbacks, timers and
//! user commands are applied one at a time, in order.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod align;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod matcher;
pub mod providers;
pub mod recognizer;
pub mod scoring;
pub mod script;
pub mod session;

// Convenience re-exports for downstream crates
pub use engine::{EngineConfig, RecitalEngine, SessionSnapshot};
pub use error::RecitalError;
pub use events::{MicStatus, MicStatusEvent, OutcomeEvent, ProgressEvent, TranscriptPreviewEvent};
pub use lifecycle::RestartPolicy;
pub use providers::{
    NullScoreSink, ScoreRecord, ScoreSink, ScriptPlan, ScriptProvider, ScriptRequest,
    VocabularyHint,
};
pub use recognizer::{
    Fragment, RecognizerConfig, RecognizerErrorKind, RecognizerHandle, RecognizerProvider,
    RecognizerSignal,
};
pub use scoring::ScoreResult;
pub use session::SessionPhase;
