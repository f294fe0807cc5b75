//! Fuzzy matching between one spoken token and one target-script token.
//!
//! Rules, applied in order, first hit wins:
//!
//! 1. Exact equality.
//! 2. Either token is a prefix of the other, both ≥ 3 chars.
//! 3. Edit distance for longer words (target ≥ 5, spoken ≥ 4):
//!    allowed distance 2 when the target is ≥ 7 chars, else 1.
//!
//! Tokens shorter than 2 normalized chars never reach [`matches`] — the
//! tokenizer filters them out upstream.

use strsim::levenshtein;

/// Lowercase a raw token and strip everything except ASCII alphanumerics
/// and apostrophes.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '\'')
        .collect::<String>()
        .to_lowercase()
}

/// Decide whether a spoken token counts as the target token.
///
/// Both inputs must already be normalized. Deterministic, no side effects;
/// worst case is one `O(len(spoken) · len(target))` edit-distance pass.
pub fn matches(spoken: &str, target: &str) -> bool {
    if spoken == target {
        return true;
    }

    let spoken_len = spoken.chars().count();
    let target_len = target.chars().count();

    if spoken_len >= 3
        && target_len >= 3
        && (target.starts_with(spoken) || spoken.starts_with(target))
    {
        return true;
    }

    if target_len >= 5 && spoken_len >= 4 {
        let allowed = if target_len >= 7 { 2 } else { 1 };
        if levenshtein(spoken, target) <= allowed {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_lowercases() {
        assert_eq!(normalize("Hello,"), "hello");
        assert_eq!(normalize("world!"), "world");
        assert_eq!(normalize("don't"), "don't");
        assert_eq!(normalize("42nd"), "42nd");
        assert_eq!(normalize("—"), "");
    }

    #[test]
    fn exact_equality_matches() {
        assert!(matches("technology", "technology"));
        assert!(matches("a", "a"));
    }

    #[test]
    fn prefix_matches_both_directions() {
        // spoken is a prefix of target
        assert!(matches("tech", "technology"));
        // target is a prefix of spoken
        assert!(matches("worlds", "world"));
    }

    #[test]
    fn prefix_requires_three_chars_on_both_sides() {
        assert!(!matches("ab", "abc"));
        assert!(!matches("te", "technology"));
    }

    #[test]
    fn edit_distance_one_for_medium_words() {
        assert!(matches("wrold", "world"));
        // distance 2 against a 5-char target is too far
        assert!(!matches("wrodl", "wound"));
    }

    #[test]
    fn edit_distance_two_for_long_words() {
        // two edits against a 10-char target
        assert!(matches("tecnolgy", "technology"));
        assert!(!matches("telnolgy", "technology"));
    }

    #[test]
    fn unrelated_words_do_not_match() {
        assert!(!matches("xyz", "world"));
        assert!(!matches("banana", "keyboard"));
    }

    #[test]
    fn short_spoken_token_never_reaches_fuzzy_rule() {
        // "wrd" is 3 chars — fuzzy rule needs 4, prefix rule fails
        assert!(!matches("wrd", "world"));
    }
}
