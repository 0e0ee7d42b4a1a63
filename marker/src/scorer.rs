//! # Scorer Module
//!
//! Turns per-check results into the numbers a report carries:
//!
//! - [`compute_overall_score`]: the correctness score, marks awarded over marks possible.
//! - [`apply_quality_adjustment`]: folds the external code-quality score into correctness.

use crate::error::MarkerError;
use crate::types::TaskResult;

/// Computes the correctness score as a percentage from a slice of `TaskResult`s.
///
/// Checks are weighted by the marks they are worth, so a 4-mark check counts four times as
/// much as a 1-mark check. Checks worth nothing are ignored.
///
/// # Returns
///
/// - `Ok(u32)`: The score, rounded to the nearest integer in `0..=100`. If `results` is
///   empty or nothing is worth any marks, returns `Ok(0)`.
///
/// # Example
///
/// ```
/// use marker::types::TaskResult;
/// use marker::scorer::compute_overall_score;
///
/// let results = vec![
///     TaskResult { name: "Task 1".to_string(), awarded: 10, possible: 10, matched_patterns: vec![], missed_patterns: vec![] },
///     TaskResult { name: "Task 2".to_string(), awarded: 5, possible: 10, matched_patterns: vec![], missed_patterns: vec![] },
/// ];
///
/// // Total awarded: 15, Total possible: 20. Score: (15 / 20) * 100 = 75
/// assert_eq!(compute_overall_score(&results).unwrap(), 75);
/// assert_eq!(compute_overall_score(&[]).unwrap(), 0);
/// ```
pub fn compute_overall_score(results: &[TaskResult]) -> Result<u32, MarkerError> {
    let (awarded, possible) = results
        .iter()
        .filter(|result| result.possible > 0)
        .fold((0u64, 0u64), |(awarded, possible), result| {
            (
                awarded + result.awarded.min(result.possible) as u64,
                possible + result.possible as u64,
            )
        });

    if possible == 0 {
        return Ok(0);
    }

    Ok((awarded as f64 / possible as f64 * 100.0).round() as u32)
}

/// Adjusts a correctness score by the code-quality score.
///
/// `quality` is in percentage points and may be negative: `+10` lifts the score by a
/// tenth of itself, `-25` removes a quarter of it. The result is
/// `round(correctness * (100 + quality) / 100)` clamped to `0..=100`.
///
/// ```
/// use marker::scorer::apply_quality_adjustment;
///
/// assert_eq!(apply_quality_adjustment(80, -25.0), 60);
/// assert_eq!(apply_quality_adjustment(95, 10.0), 100);
/// ```
pub fn apply_quality_adjustment(correctness: u32, quality: f64) -> u32 {
    if !quality.is_finite() {
        return correctness.min(100);
    }
    let adjusted = (correctness as f64 * (100.0 + quality) / 100.0).round();
    adjusted.clamp(0.0, 100.0) as u32
}
