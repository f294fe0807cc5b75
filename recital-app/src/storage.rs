//! Local score history (SQLite).
//!
//! Mirrors what the score-persistence collaborator expects: every completed
//! attempt is stored with its full component breakdown and the verbatim
//! script text; list queries omit the script text.

use std::path::{Path, PathBuf};

use chrono::Utc;
use recital_core::{RecitalError, ScoreRecord, ScoreSink};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredScore {
    pub created_at: String,
    pub topic: String,
    pub duration_id: String,
    pub score: u32,
    pub accuracy: u32,
    pub words_matched: u32,
    pub total_words: u32,
    pub time_taken: u32,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
}

impl LocalStore {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        let conn = store.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scores (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 created_at TEXT NOT NULL,
                 topic TEXT NOT NULL,
                 duration_id TEXT NOT NULL,
                 score INTEGER NOT NULL,
                 time_component INTEGER NOT NULL,
                 accuracy_component INTEGER NOT NULL,
                 fluency_component INTEGER NOT NULL,
                 words_matched INTEGER NOT NULL,
                 total_words INTEGER NOT NULL,
                 time_taken INTEGER NOT NULL,
                 expected_time INTEGER NOT NULL,
                 accuracy INTEGER NOT NULL,
                 script_text TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_scores_score ON scores(score DESC);
             CREATE INDEX IF NOT EXISTS idx_scores_created_at ON scores(created_at DESC);",
        )?;
        Ok(store)
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.db_path)
    }

    pub fn insert_score(&self, record: &ScoreRecord) -> anyhow::Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO scores (
                 created_at, topic, duration_id, score,
                 time_component, accuracy_component, fluency_component,
                 words_matched, total_words, time_taken, expected_time,
                 accuracy, script_text
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                Utc::now().to_rfc3339(),
                record.topic,
                record.duration_id,
                record.score,
                record.time_component,
                record.accuracy_component,
                record.fluency_component,
                record.words_matched,
                record.total_words,
                record.time_taken,
                record.expected_time,
                record.accuracy,
                record.script_text,
            ],
        )?;
        debug!(topic = %record.topic, score = record.score, "score stored");
        Ok(())
    }

    /// Best scores first.
    pub fn top_scores(&self, limit: usize) -> anyhow::Result<Vec<StoredScore>> {
        self.list_scores("ORDER BY score DESC, created_at DESC", limit)
    }

    /// Newest scores first.
    pub fn recent_scores(&self, limit: usize) -> anyhow::Result<Vec<StoredScore>> {
        self.list_scores("ORDER BY created_at DESC", limit)
    }

    fn list_scores(&self, order_clause: &str, limit: usize) -> anyhow::Result<Vec<StoredScore>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT created_at, topic, duration_id, score, accuracy,
                    words_matched, total_words, time_taken
             FROM scores {order_clause} LIMIT ?1"
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(params![limit as i64], |row| {
            Ok(StoredScore {
                created_at: row.get(0)?,
                topic: row.get(1)?,
                duration_id: row.get(2)?,
                score: row.get(3)?,
                accuracy: row.get(4)?,
                words_matched: row.get(5)?,
                total_words: row.get(6)?,
                time_taken: row.get(7)?,
            })
        })?;
        let mut scores = Vec::new();
        for row in rows {
            scores.push(row?);
        }
        Ok(scores)
    }
}

impl ScoreSink for LocalStore {
    fn persist(&self, record: &ScoreRecord) -> recital_core::error::Result<()> {
        self.insert_score(record)
            .map_err(|e| RecitalError::ScorePersist(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> LocalStore {
        let path = std::env::temp_dir().join(format!(
            "recital-store-{}-{name}.sqlite",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        LocalStore::open(&path).expect("open store")
    }

    fn record(topic: &str, score: u32) -> ScoreRecord {
        ScoreRecord {
            topic: topic.into(),
            duration_id: "2-minute".into(),
            score,
            time_component: 25,
            accuracy_component: 45,
            fluency_component: 18,
            words_matched: 90,
            total_words: 100,
            time_taken: 118,
            expected_time: 120,
            accuracy: 90,
            script_text: "the quick brown fox".into(),
        }
    }

    #[test]
    fn insert_then_query_round_trips_fields() {
        let store = temp_store("roundtrip");
        store.insert_score(&record("Travel", 88)).expect("insert");

        let scores = store.recent_scores(10).expect("query");
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].topic, "Travel");
        assert_eq!(scores[0].score, 88);
        assert_eq!(scores[0].accuracy, 90);
        assert_eq!(scores[0].words_matched, 90);
        assert_eq!(scores[0].total_words, 100);
    }

    #[test]
    fn top_scores_orders_by_score_descending() {
        let store = temp_store("ordering");
        store.insert_score(&record("A", 70)).expect("insert");
        store.insert_score(&record("B", 95)).expect("insert");
        store.insert_score(&record("C", 82)).expect("insert");

        let top = store.top_scores(2).expect("query");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].score, 95);
        assert_eq!(top[1].score, 82);
    }

    #[test]
    fn persist_via_the_sink_trait_stores_the_record() {
        let store = temp_store("sink");
        let sink: &dyn ScoreSink = &store;
        sink.persist(&record("Health", 77)).expect("persist");
        assert_eq!(store.top_scores(5).expect("query").len(), 1);
    }
}
