//! # Types Module
//!
//! Core data structures shared by the comparators, the scorer, feedback and reports.

use serde::{Deserialize, Serialize};

/// A markable unit: a display name and the marks it is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub name: String,
    pub value: u32,
}

/// Represents the result of a single marking task.
///
/// Holds the score awarded, the maximum possible score, and what was matched or missed
/// while checking the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    /// A descriptive name for the task.
    pub name: String,
    /// The number of points awarded for the task.
    pub awarded: u32,
    /// The maximum number of points possible for the task.
    pub possible: u32,
    /// Patterns or checks the submission satisfied.
    pub matched_patterns: Vec<String>,
    /// Patterns or checks that were expected but not satisfied.
    pub missed_patterns: Vec<String>,
}

impl TaskResult {
    /// A result that is either worth everything or nothing.
    pub fn all_or_nothing(section: &Subsection, passed: bool, description: String) -> Self {
        let (matched_patterns, missed_patterns) = if passed {
            (vec![description], Vec::new())
        } else {
            (Vec::new(), vec![description])
        };
        TaskResult {
            name: section.name.clone(),
            awarded: if passed { section.value } else { 0 },
            possible: section.value,
            matched_patterns,
            missed_patterns,
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.possible == 0 {
            return 0.0;
        }
        (self.awarded as f64 / self.possible as f64 * 10000.0).round() / 100.0
    }
}

/// The reporting view of a [`TaskResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonTaskResult {
    pub name: String,
    pub awarded: u32,
    pub possible: u32,
    pub percentage: f64,
}

impl From<&TaskResult> for JsonTaskResult {
    fn from(result: &TaskResult) -> Self {
        JsonTaskResult {
            name: result.name.clone(),
            awarded: result.awarded,
            possible: result.possible,
            percentage: result.percentage(),
        }
    }
}

/// Output of the external code-quality analyser, accepted as-is.
///
/// `score` is in percentage points and may be negative when violations are penalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: f64,
    #[serde(default)]
    pub violations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(value: u32) -> Subsection {
        Subsection {
            name: "Greeting".to_string(),
            value,
        }
    }

    #[test]
    fn test_all_or_nothing() {
        let passed = TaskResult::all_or_nothing(&section(4), true, "prints hello".into());
        assert_eq!(passed.awarded, 4);
        assert_eq!(passed.matched_patterns, vec!["prints hello"]);

        let failed = TaskResult::all_or_nothing(&section(4), false, "prints hello".into());
        assert_eq!(failed.awarded, 0);
        assert_eq!(failed.possible, 4);
        assert_eq!(failed.missed_patterns, vec!["prints hello"]);
    }

    #[test]
    fn test_percentage_rounds_to_two_places() {
        let result = TaskResult {
            name: "t".into(),
            awarded: 1,
            possible: 3,
            matched_patterns: vec![],
            missed_patterns: vec![],
        };
        assert_eq!(result.percentage(), 33.33);
        assert_eq!(JsonTaskResult::from(&result).percentage, 33.33);
    }

    #[test]
    fn test_quality_report_violations_default() {
        let report: QualityReport = serde_json::from_str(r#"{"score": -12.5}"#).unwrap();
        assert_eq!(report.score, -12.5);
        assert!(report.violations.is_empty());
    }
}
