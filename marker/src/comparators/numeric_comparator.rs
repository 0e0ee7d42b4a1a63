//! A comparator for numeric answers printed among other text.

use crate::comparators::proportional;
use crate::predicates::contains_number;
use crate::traits::comparator::OutputComparator;
use crate::types::{Subsection, TaskResult};

/// Treats every expected pattern as a number and looks for it, within `tolerance`,
/// among the numeric literals of the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericComparator {
    pub tolerance: f64,
}

impl Default for NumericComparator {
    fn default() -> Self {
        Self { tolerance: 1e-9 }
    }
}

impl OutputComparator for NumericComparator {
    fn compare(&self, section: &Subsection, expected: &[String], actual: &[String]) -> TaskResult {
        let mut matched = Vec::new();
        let mut missed = Vec::new();

        for pattern in expected {
            match pattern.trim().parse::<f64>() {
                Ok(value) if contains_number(actual, value, self.tolerance) => {
                    matched.push(pattern.clone())
                }
                Ok(_) => missed.push(pattern.clone()),
                Err(_) => missed.push(format!("Invalid number: {pattern}")),
            }
        }

        proportional(section, matched, missed)
    }
}
