//! Collaborator interfaces consumed by the engine: script acquisition and
//! score persistence.
//!
//! Both are simple request/response seams. Script acquisition failures
//! surface before any session state exists; persistence is fire-and-forget
//! from the engine's perspective (the driver logs a failure and moves on —
//! a completed score is never dropped because storage misbehaved).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// What the caller wants to practice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    pub topic: String,
    /// Duration identifier, e.g. `2-minute`, `5-minute`, `10-minute`.
    pub duration_id: String,
}

/// Vocabulary worth reviewing after the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyHint {
    pub word: String,
    pub meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// A fetched script ready to practice against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptPlan {
    /// The verbatim script text the learner must speak.
    pub text: String,
    pub expected_seconds: u32,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyHint>,
}

/// Script acquisition collaborator.
pub trait ScriptProvider: Send + Sync + 'static {
    /// Fetch the script for one topic/duration pair.
    fn fetch(&self, request: &ScriptRequest) -> Result<ScriptPlan>;
}

/// Everything persisted about one completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub topic: String,
    pub duration_id: String,
    pub score: u32,
    pub time_component: u32,
    pub accuracy_component: u32,
    pub fluency_component: u32,
    pub words_matched: u32,
    pub total_words: u32,
    pub time_taken: u32,
    pub expected_time: u32,
    /// Accuracy percentage, 0–100.
    pub accuracy: u32,
    /// The verbatim script text that was practiced.
    pub script_text: String,
}

/// Score persistence collaborator.
pub trait ScoreSink: Send + Sync + 'static {
    fn persist(&self, record: &ScoreRecord) -> Result<()>;
}

/// Sink that only logs. Useful for demos and tests that don't care about
/// storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScoreSink;

impl ScoreSink for NullScoreSink {
    fn persist(&self, record: &ScoreRecord) -> Result<()> {
        info!(
            topic = %record.topic,
            score = record.score,
            "score discarded (null sink)"
        );
        Ok(())
    }
}
