//! Target-script tokenization and transcript-fragment handling.
//!
//! The target word sequence is derived once per script (tokenize →
//! normalize) and frozen; only the per-word `matched` flag ever changes,
//! and that belongs to the [`AlignmentCursor`](crate::align::AlignmentCursor).

use serde::{Deserialize, Serialize};

use crate::matcher;
use crate::recognizer::Fragment;

/// How many trailing spoken tokens of one fragment batch are offered to the
/// alignment cursor. Bounds per-event work and keeps stale context from
/// being reprocessed.
pub const RECENT_TOKEN_WINDOW: usize = 4;

/// Shortest normalized token worth aligning.
pub const MIN_TOKEN_LEN: usize = 2;

/// Longest live-transcript preview surfaced to observers (trailing chars).
pub const PREVIEW_MAX_CHARS: usize = 100;

/// One word of the fixed target script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetWord {
    /// Original casing and punctuation, for display.
    pub text: String,
    /// Lowercased, ASCII alphanumeric + apostrophe only.
    pub normalized: String,
    /// Index within the script.
    pub position: usize,
    /// Whether a spoken token has been aligned to this word.
    pub matched: bool,
}

/// Split script text into the frozen target word sequence.
pub fn tokenize_script(text: &str) -> Vec<TargetWord> {
    text.split_whitespace()
        .enumerate()
        .map(|(position, raw)| TargetWord {
            text: raw.to_string(),
            normalized: matcher::normalize(raw),
            position,
            matched: false,
        })
        .collect()
}

/// Extract the most recent spoken tokens from one recognizer event, in
/// chronological order, normalized and length-filtered.
pub fn recent_spoken_tokens(fragments: &[Fragment]) -> Vec<String> {
    let joined = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let words: Vec<&str> = joined.split_whitespace().collect();
    let start = words.len().saturating_sub(RECENT_TOKEN_WINDOW);
    words[start..]
        .iter()
        .map(|w| matcher::normalize(w))
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Build the live preview string for one recognizer event: the batch text,
/// trimmed, truncated to its trailing [`PREVIEW_MAX_CHARS`] chars.
pub fn live_preview(fragments: &[Fragment]) -> String {
    let joined = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let trimmed = joined.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    let start = chars.len().saturating_sub(PREVIEW_MAX_CHARS);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, is_final: bool) -> Fragment {
        Fragment {
            text: text.to_string(),
            is_final,
        }
    }

    #[test]
    fn tokenize_preserves_display_text_and_normalizes() {
        let words = tokenize_script("Hello, world!  Don't   stop.");
        assert_eq!(words.len(), 4);
        assert_eq!(words[0].text, "Hello,");
        assert_eq!(words[0].normalized, "hello");
        assert_eq!(words[2].normalized, "don't");
        assert_eq!(words[3].normalized, "stop");
        assert!(words.iter().all(|w| !w.matched));
        assert!(words.iter().enumerate().all(|(i, w)| w.position == i));
    }

    #[test]
    fn tokenize_empty_text_yields_no_words() {
        assert!(tokenize_script("   \n\t ").is_empty());
    }

    #[test]
    fn recent_tokens_keeps_only_the_trailing_window() {
        let fragments = vec![frag("one two three", true), frag("four five six", false)];
        let tokens = recent_spoken_tokens(&fragments);
        assert_eq!(tokens, vec!["three", "four", "five", "six"]);
    }

    #[test]
    fn recent_tokens_drops_short_and_punctuation_only_tokens() {
        let fragments = vec![frag("I - saw it, go!", false)];
        // last 4 raw tokens are ["-", "saw", "it,", "go!"]; "-" normalizes away
        let tokens = recent_spoken_tokens(&fragments);
        assert_eq!(tokens, vec!["saw", "it", "go"]);
    }

    #[test]
    fn preview_truncates_to_trailing_chars() {
        let long = "x".repeat(150);
        let preview = live_preview(&[frag(&long, false)]);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn preview_joins_final_and_interim_text() {
        let preview = live_preview(&[frag("hello", true), frag("world", false)]);
        assert_eq!(preview, "hello world");
    }
}
