//! Session state machine: `Idle → Active ⇄ Paused → Complete`.
//!
//! One `Session` is one attempt. `Complete` is terminal — a retry builds a
//! fresh `Session` with every target word unmatched. The session owns the
//! alignment cursor and all counters; the invariant
//! `matched_count + skipped_count == cursor` holds after every mutation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::align::{AlignmentCursor, ConsumeOutcome};
use crate::scoring::{self, AttemptTotals, ScoreResult};
use crate::script::TargetWord;

/// Current phase of the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Created but not started.
    Idle,
    /// Clock running, spoken tokens consumed.
    Active,
    /// Clock and listening suspended; counters intact.
    Paused,
    /// Terminal. The outcome is computed exactly once on entry.
    Complete,
}

/// Net effect of one command or spoken token on the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    /// The cursor or a counter moved.
    pub progressed: bool,
    /// This mutation finished the attempt.
    pub completed: bool,
}

/// One practice attempt over a frozen target word sequence.
#[derive(Debug)]
pub struct Session {
    cursor: AlignmentCursor,
    phase: SessionPhase,
    matched_count: u32,
    skipped_count: u32,
    elapsed_seconds: u32,
    expected_seconds: u32,
    outcome: Option<ScoreResult>,
}

impl Session {
    pub fn new(words: Vec<TargetWord>, expected_seconds: u32) -> Self {
        debug_assert!(words.iter().all(|w| !w.matched));
        Self {
            cursor: AlignmentCursor::new(words),
            phase: SessionPhase::Idle,
            matched_count: 0,
            skipped_count: 0,
            elapsed_seconds: 0,
            expected_seconds,
            outcome: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor.cursor()
    }

    pub fn matched_count(&self) -> u32 {
        self.matched_count
    }

    pub fn skipped_count(&self) -> u32 {
        self.skipped_count
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn expected_seconds(&self) -> u32 {
        self.expected_seconds
    }

    pub fn total_words(&self) -> usize {
        self.cursor.len()
    }

    pub fn matched_flags(&self) -> Vec<bool> {
        self.cursor.matched_flags()
    }

    pub fn words(&self) -> &[TargetWord] {
        self.cursor.words()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    /// The score, present from the moment the attempt completes.
    pub fn outcome(&self) -> Option<ScoreResult> {
        self.outcome
    }

    /// Idle → Active.
    pub fn start(&mut self) {
        debug_assert_eq!(self.phase, SessionPhase::Idle);
        self.phase = SessionPhase::Active;
        debug!(words = self.total_words(), "session started");
    }

    /// One 1-second clock tick. Counts only while Active.
    pub fn tick(&mut self) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    /// Active → Paused. Counters and elapsed time are untouched.
    pub fn pause(&mut self) {
        if self.phase == SessionPhase::Active {
            self.phase = SessionPhase::Paused;
        }
    }

    /// Paused → Active.
    pub fn resume(&mut self) {
        if self.phase == SessionPhase::Paused {
            self.phase = SessionPhase::Active;
        }
    }

    /// Feed one normalized spoken token through the alignment cursor.
    pub fn speak(&mut self, token: &str) -> SessionUpdate {
        if self.phase != SessionPhase::Active {
            return SessionUpdate::default();
        }
        match self.cursor.consume(token) {
            ConsumeOutcome::Ignored => SessionUpdate::default(),
            ConsumeOutcome::Advanced { matched } => {
                self.matched_count += matched;
                self.assert_invariant();
                SessionUpdate {
                    progressed: true,
                    completed: self.check_completion(),
                }
            }
        }
    }

    /// Advance past the current word without matching it.
    pub fn skip(&mut self) -> SessionUpdate {
        if self.phase != SessionPhase::Active {
            return SessionUpdate::default();
        }
        if !self.cursor.advance_by_skip() {
            return SessionUpdate::default();
        }
        self.skipped_count += 1;
        self.assert_invariant();
        SessionUpdate {
            progressed: true,
            completed: self.check_completion(),
        }
    }

    /// The counters the scoring engine consumes.
    pub fn totals(&self) -> AttemptTotals {
        AttemptTotals {
            matched: self.matched_count,
            skipped: self.skipped_count,
            total_words: self.total_words() as u32,
            elapsed_seconds: self.elapsed_seconds,
            expected_seconds: self.expected_seconds,
        }
    }

    fn check_completion(&mut self) -> bool {
        if !self.cursor.is_complete() || self.phase == SessionPhase::Complete {
            return self.phase == SessionPhase::Complete;
        }
        self.phase = SessionPhase::Complete;
        self.outcome = Some(scoring::score(self.totals()));
        debug!(
            matched = self.matched_count,
            skipped = self.skipped_count,
            elapsed = self.elapsed_seconds,
            "attempt complete"
        );
        true
    }

    fn assert_invariant(&self) {
        debug_assert_eq!(
            self.matched_count + self.skipped_count,
            self.cursor.cursor() as u32,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::tokenize_script;

    fn active_session(text: &str, expected: u32) -> Session {
        let mut session = Session::new(tokenize_script(text), expected);
        session.start();
        session
    }

    #[test]
    fn speaking_every_word_completes_with_full_counts() {
        let mut session = active_session("alpha bravo charlie delta echo", 60);
        let mut completions = 0;
        for token in ["alpha", "bravo", "charlie", "delta", "echo"] {
            let update = session.speak(token);
            assert!(update.progressed);
            if update.completed {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(session.matched_count(), 5);
        assert_eq!(session.cursor_position(), 5);
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert!(session.outcome().is_some());
    }

    #[test]
    fn counts_always_sum_to_cursor_position() {
        let mut session = active_session("alpha bravo charlie delta", 60);
        session.speak("alpha");
        session.skip();
        session.speak("delta"); // lookahead +1 from position 2: marks both
        assert_eq!(
            session.matched_count() + session.skipped_count(),
            session.cursor_position() as u32
        );
        assert_eq!(session.matched_count(), 3);
        assert_eq!(session.skipped_count(), 1);
    }

    #[test]
    fn lookahead_match_adds_two_to_matched_count() {
        let mut session = active_session("alpha bravo charlie", 60);
        let update = session.speak("bravo");
        assert!(update.progressed);
        assert_eq!(session.matched_count(), 2);
        assert_eq!(session.cursor_position(), 2);
    }

    #[test]
    fn skip_alone_can_complete_the_attempt() {
        let mut session = active_session("alpha bravo", 60);
        assert!(!session.skip().completed);
        let update = session.skip();
        assert!(update.completed);
        assert_eq!(session.skipped_count(), 2);
        assert_eq!(session.matched_count(), 0);
    }

    #[test]
    fn ticks_count_only_while_active() {
        let mut session = active_session("alpha bravo", 60);
        assert!(session.tick());
        session.pause();
        assert!(!session.tick());
        session.resume();
        assert!(session.tick());
        assert_eq!(session.elapsed_seconds(), 2);
    }

    #[test]
    fn pause_and_resume_preserve_counters() {
        let mut session = active_session("alpha bravo charlie", 60);
        session.speak("alpha");
        session.tick();
        session.pause();
        assert_eq!(session.phase(), SessionPhase::Paused);
        assert_eq!(session.matched_count(), 1);
        assert_eq!(session.elapsed_seconds(), 1);
        session.resume();
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.matched_count(), 1);
        assert_eq!(session.skipped_count(), 0);
        assert_eq!(session.elapsed_seconds(), 1);
    }

    #[test]
    fn tokens_are_ignored_while_paused() {
        let mut session = active_session("alpha bravo", 60);
        session.pause();
        let update = session.speak("alpha");
        assert!(!update.progressed);
        assert_eq!(session.matched_count(), 0);
    }

    #[test]
    fn completion_happens_exactly_once() {
        let mut session = active_session("alpha", 60);
        let first = session.speak("alpha");
        assert!(first.completed);
        let outcome = session.outcome().expect("outcome after completion");
        // Further input cannot change the terminal state or the score.
        let second = session.speak("alpha");
        assert!(!second.progressed);
        assert_eq!(session.outcome(), Some(outcome));
        assert!(!session.skip().progressed);
        assert!(!session.tick());
    }
}
