use crate::types::{Subsection, TaskResult};

/// OutputComparator is a strategy trait for checking captured output.
///
/// Each implementation decides how a single expected pattern is looked for in the
/// actual output lines and awards the subsection's marks accordingly.
pub trait OutputComparator: Send + Sync {
    /// Compare one subsection, producing a full [`TaskResult`].
    ///
    /// - `section`: name and marks for this check.
    /// - `expected`: the patterns the output should contain.
    /// - `actual`: captured output lines of the run.
    fn compare(&self, section: &Subsection, expected: &[String], actual: &[String]) -> TaskResult;
}
