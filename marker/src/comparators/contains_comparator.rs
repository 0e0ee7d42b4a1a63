//! A comparator that looks for each expected pattern as plain text.

use crate::comparators::{partition, proportional};
use crate::predicates::contains_text;
use crate::traits::comparator::OutputComparator;
use crate::types::{Subsection, TaskResult};

/// Awards marks for every expected pattern that appears, ignoring case, on any output line.
pub struct ContainsComparator;

impl OutputComparator for ContainsComparator {
    fn compare(&self, section: &Subsection, expected: &[String], actual: &[String]) -> TaskResult {
        let (matched, missed) = partition(expected, |pattern| contains_text(actual, pattern));
        proportional(section, matched, missed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string_vec(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    fn mock_subsection(value: u32) -> Subsection {
        Subsection {
            name: "Greeting".to_string(),
            value,
        }
    }

    #[test]
    fn test_all_patterns_present() {
        let expected = to_string_vec(&["hello", "ada"]);
        let actual = to_string_vec(&["PROMPT: Name?", "Hello, Ada!"]);
        let result = ContainsComparator.compare(&mock_subsection(4), &expected, &actual);
        assert_eq!(result.awarded, 4);
        assert!(result.missed_patterns.is_empty());
    }

    #[test]
    fn test_half_the_patterns_present() {
        let expected = to_string_vec(&["hello", "goodbye"]);
        let actual = to_string_vec(&["hello"]);
        let result = ContainsComparator.compare(&mock_subsection(4), &expected, &actual);
        assert_eq!(result.awarded, 2);
        assert_eq!(result.matched_patterns, vec!["hello"]);
        assert_eq!(result.missed_patterns, vec!["goodbye"]);
    }

    #[test]
    fn test_no_output() {
        let expected = to_string_vec(&["hello"]);
        let result = ContainsComparator.compare(&mock_subsection(3), &expected, &[]);
        assert_eq!(result.awarded, 0);
        assert_eq!(result.possible, 3);
    }
}
