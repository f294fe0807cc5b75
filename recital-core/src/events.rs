//! Event types broadcast to session observers.
//!
//! | Event | Stream |
//! |-------|--------|
//! | [`ProgressEvent`] | alignment / clock movement |
//! | [`TranscriptPreviewEvent`] | live "what the mic hears" text |
//! | [`MicStatusEvent`] | microphone state changes |
//! | [`OutcomeEvent`] | the final score, exactly once per attempt |
//!
//! All payloads serialize camelCase so a frontend can consume them as-is.

use serde::{Deserialize, Serialize};

use crate::scoring::ScoreResult;

/// Emitted whenever alignment or the elapsed clock moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Current alignment cursor position.
    pub cursor: usize,
    pub matched_count: u32,
    pub skipped_count: u32,
    pub elapsed_seconds: u32,
    pub total_words: usize,
}

/// Best-effort live transcript preview. `text` is empty once the preview
/// has been silent long enough to clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPreviewEvent {
    pub seq: u64,
    pub text: String,
}

/// Microphone state surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicStatus {
    /// Not listening (before start, while paused, after completion).
    Idle,
    /// Actively capturing speech.
    Listening,
    /// Fatal recognizer condition — explicit resume required.
    Error,
}

/// Emitted when the microphone state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicStatusEvent {
    pub status: MicStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Emitted exactly once when an attempt completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeEvent {
    pub seq: u64,
    pub result: ScoreResult,
}
