//! Streaming alignment of spoken tokens against the target script.
//!
//! The cursor searches a bounded window `[cursor, cursor + 3)` — the current
//! word plus two lookahead words. A hit one word ahead forgives the current
//! word (both get marked); a hit two or more ahead is ignored outright, so a
//! spurious fuzzy hit in noisy transcription cannot drag the cursor forward.

use crate::matcher;
use crate::script::TargetWord;

/// Lookahead window size: current word plus two words ahead.
const LOOKAHEAD_WINDOW: usize = 3;

/// What happened when the cursor consumed one spoken token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// No usable match — nothing changed.
    Ignored,
    /// The cursor advanced; `matched` words (1 or 2) were newly marked.
    Advanced { matched: u32 },
}

/// Holds the frozen target word sequence and the current match position.
///
/// `matched` flags are monotonic and the cursor only ever increases.
#[derive(Debug)]
pub struct AlignmentCursor {
    words: Vec<TargetWord>,
    cursor: usize,
}

impl AlignmentCursor {
    pub fn new(words: Vec<TargetWord>) -> Self {
        Self { words, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The cursor has passed the last target word.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.words.len()
    }

    pub fn words(&self) -> &[TargetWord] {
        &self.words
    }

    pub fn matched_flags(&self) -> Vec<bool> {
        self.words.iter().map(|w| w.matched).collect()
    }

    /// Feed one normalized spoken token to the cursor.
    pub fn consume(&mut self, spoken: &str) -> ConsumeOutcome {
        if self.is_complete() {
            return ConsumeOutcome::Ignored;
        }

        let window_end = (self.cursor + LOOKAHEAD_WINDOW).min(self.words.len());
        for i in self.cursor..window_end {
            if self.words[i].matched {
                continue;
            }
            if !matcher::matches(spoken, &self.words[i].normalized) {
                continue;
            }

            // First match wins; stop searching either way.
            return if i == self.cursor {
                self.words[i].matched = true;
                self.cursor = i + 1;
                ConsumeOutcome::Advanced { matched: 1 }
            } else if i == self.cursor + 1 {
                // One word ahead: forgive the mumbled current word too.
                self.words[self.cursor].matched = true;
                self.words[i].matched = true;
                self.cursor = i + 1;
                ConsumeOutcome::Advanced { matched: 2 }
            } else {
                // Two or more ahead: not progress.
                ConsumeOutcome::Ignored
            };
        }

        ConsumeOutcome::Ignored
    }

    /// Advance past the current word without marking it matched.
    pub fn advance_by_skip(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.cursor += 1;
        true
    }
}
