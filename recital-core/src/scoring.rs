//! Final attempt scoring.
//!
//! Pure arithmetic over the attempt counters — no I/O, no randomness.
//!
//! | component | range | source                            |
//! |-----------|-------|-----------------------------------|
//! | time      | 0–30  | elapsed vs expected seconds       |
//! | accuracy  | 0–50  | matched / total words             |
//! | fluency   | 0–20  | 2-point penalty per explicit skip |

use serde::{Deserialize, Serialize};

/// Counter snapshot a completed attempt is scored from.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTotals {
    pub matched: u32,
    pub skipped: u32,
    pub total_words: u32,
    pub elapsed_seconds: u32,
    pub expected_seconds: u32,
}

/// Final multi-factor score, created once per completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// 0–100.
    pub final_score: u32,
    /// 0–30.
    pub time_component: u32,
    /// 0–50.
    pub accuracy_component: u32,
    /// 0–20.
    pub fluency_component: u32,
    /// 0–100, reported separately from the weighted component.
    pub accuracy_percent: u32,
}

/// Raw (unrounded) time component.
///
/// Finishing at 70% of the expected time or faster earns the full 30;
/// on-time finishes taper from 30 down to 25; up to 30% overtime holds a
/// flat 15; beyond that, one point is lost per further 30 seconds, floored
/// at 5.
fn time_component(elapsed_seconds: u32, expected_seconds: u32) -> f64 {
    let elapsed = f64::from(elapsed_seconds);
    // Clamp so the ratio stays defined; prepare() never admits a zero.
    let expected = f64::from(expected_seconds.max(1));

    if elapsed <= 0.7 * expected {
        30.0
    } else if elapsed <= expected {
        25.0 + 5.0 * (1.0 - elapsed / expected)
    } else if elapsed <= 1.3 * expected {
        15.0
    } else {
        let overtime_steps = ((elapsed - 1.3 * expected) / 30.0).floor();
        (15.0 - overtime_steps).max(5.0)
    }
}

/// Score one completed attempt.
pub fn score(totals: AttemptTotals) -> ScoreResult {
    let total = f64::from(totals.total_words.max(1));
    let accuracy_percent = f64::from(totals.matched) / total * 100.0;
    let accuracy = (accuracy_percent * 0.5).round();
    let fluency = f64::from(20u32.saturating_sub(totals.skipped.saturating_mul(2)));
    let time = time_component(totals.elapsed_seconds, totals.expected_seconds);

    let final_score = (time + accuracy + fluency).round().min(100.0);

    ScoreResult {
        final_score: final_score as u32,
        time_component: time.round() as u32,
        accuracy_component: accuracy as u32,
        fluency_component: fluency as u32,
        accuracy_percent: accuracy_percent.round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn totals(matched: u32, skipped: u32, total: u32, elapsed: u32, expected: u32) -> AttemptTotals {
        AttemptTotals {
            matched,
            skipped,
            total_words: total,
            elapsed_seconds: elapsed,
            expected_seconds: expected,
        }
    }

    #[test]
    fn perfect_on_time_run_scores_in_the_high_nineties() {
        let result = score(totals(100, 0, 100, 120, 120));
        assert_eq!(result.accuracy_component, 50);
        assert_eq!(result.fluency_component, 20);
        assert!((25..=30).contains(&result.time_component));
        assert!((95..=100).contains(&result.final_score));
        assert_eq!(result.accuracy_percent, 100);
    }

    #[test]
    fn fast_finish_earns_full_time_component() {
        assert_relative_eq!(time_component(84, 120), 30.0);
        assert_relative_eq!(time_component(10, 120), 30.0);
    }

    #[test]
    fn on_time_finish_tapers_between_25_and_30() {
        // 90 of 100 expected seconds: 25 + 5 * 0.1
        assert_relative_eq!(time_component(90, 100), 25.5);
        assert_relative_eq!(time_component(100, 100), 25.0);
    }

    #[test]
    fn slight_overtime_holds_fifteen() {
        assert_relative_eq!(time_component(125, 100), 15.0);
        assert_relative_eq!(time_component(130, 100), 15.0);
    }

    #[test]
    fn heavy_overtime_decays_one_point_per_half_minute_with_floor() {
        // 60 s past the 1.3× mark: two full 30 s steps
        assert_relative_eq!(time_component(190, 100), 13.0);
        // far past: floored at 5
        assert_relative_eq!(time_component(1000, 100), 5.0);
    }

    #[test]
    fn ten_skips_zero_out_fluency() {
        let result = score(totals(50, 10, 100, 100, 100));
        assert_eq!(result.fluency_component, 0);
    }

    #[test]
    fn many_skips_do_not_go_negative() {
        let result = score(totals(0, 40, 100, 100, 100));
        assert_eq!(result.fluency_component, 0);
        assert_eq!(result.accuracy_component, 0);
    }

    #[test]
    fn accuracy_is_rounded_percent_halved() {
        // 33/100 matched: 33% → 16.5 → 17 (rounds half up)
        let result = score(totals(33, 0, 100, 100, 100));
        assert_eq!(result.accuracy_percent, 33);
        assert_eq!(result.accuracy_component, 17);
    }

    #[test]
    fn final_score_is_capped_at_one_hundred() {
        let result = score(totals(100, 0, 100, 10, 120));
        assert_eq!(result.final_score, 100);
    }

    #[test]
    fn zero_expected_seconds_does_not_divide_by_zero() {
        let result = score(totals(1, 0, 1, 5, 0));
        assert!(result.time_component <= 30);
    }

    #[test]
    fn score_result_serializes_camel_case() {
        let result = score(totals(100, 0, 100, 120, 120));
        let json = serde_json::to_value(result).expect("serialize score");
        assert_eq!(json["finalScore"], result.final_score);
        assert_eq!(json["accuracyComponent"], 50);
        assert_eq!(json["fluencyComponent"], 20);
        assert_eq!(json["accuracyPercent"], 100);
    }
}
