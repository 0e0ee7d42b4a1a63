//! A comparator that uses regular expressions to find matches and award marks proportionally.
//!
//! Each expected pattern is a regular expression tried against every output line. A pattern
//! that fails to compile is reported as missed rather than aborting the whole subsection,
//! since expectation sets are normally validated before marking begins.

use crate::comparators::proportional;
use crate::predicates::compile_pattern;
use crate::traits::comparator::OutputComparator;
use crate::types::{Subsection, TaskResult};

/// A comparator that matches each expected regular expression against the output lines.
pub struct RegexComparator;

impl OutputComparator for RegexComparator {
    /// Compares captured output against regular expressions.
    ///
    /// # Arguments
    ///
    /// * `section` - The subsection with its name and total possible value.
    /// * `expected` - Regular expressions, each of which should match at least one line.
    /// * `actual` - The captured output lines.
    ///
    /// # Returns
    ///
    /// A `TaskResult` with marks proportional to the number of patterns that matched.
    fn compare(&self, section: &Subsection, expected: &[String], actual: &[String]) -> TaskResult {
        let mut matched = Vec::new();
        let mut missed = Vec::new();

        for pattern in expected {
            match compile_pattern(pattern) {
                Ok(regex) if actual.iter().any(|line| regex.is_match(line)) => {
                    matched.push(pattern.clone())
                }
                Ok(_) => missed.push(pattern.clone()),
                Err(_) => missed.push(format!("Invalid regex pattern: {pattern}")),
            }
        }

        proportional(section, matched, missed)
    }
}
