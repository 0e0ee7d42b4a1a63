//! # Comparators
//!
//! Strategies for checking a run's captured output against expected patterns. Every
//! comparator implements [`OutputComparator`](crate::traits::comparator::OutputComparator) and awards a subsection's marks in
//! proportion to how many of its patterns were found.
//!
//! The available comparators are:
//! - [`contains_comparator`]: case-insensitive substring search.
//! - [`regex_comparator`]: regular expressions matched line by line.
//! - [`numeric_comparator`]: numbers located within a tolerance.

pub mod contains_comparator;
pub mod numeric_comparator;
pub mod regex_comparator;

use crate::types::{Subsection, TaskResult};

/// Builds the result for `section` from the patterns that were and were not found.
///
/// With no patterns at all there is nothing to miss, so the full value is awarded.
pub(crate) fn proportional(
    section: &Subsection,
    matched_patterns: Vec<String>,
    missed_patterns: Vec<String>,
) -> TaskResult {
    let total = matched_patterns.len() + missed_patterns.len();
    let awarded = if total == 0 {
        section.value
    } else {
        (section.value as f64 * matched_patterns.len() as f64 / total as f64).round() as u32
    };
    TaskResult {
        name: section.name.clone(),
        awarded,
        possible: section.value,
        matched_patterns,
        missed_patterns,
    }
}

/// Splits `expected` by whether `found` holds for each pattern.
pub(crate) fn partition<F>(expected: &[String], mut found: F) -> (Vec<String>, Vec<String>)
where
    F: FnMut(&str) -> bool,
{
    expected
        .iter()
        .cloned()
        .partition(|pattern| found(pattern))
}
