//! # Output Predicates
//!
//! Small, reusable questions asked of a run's captured output lines. Every predicate
//! looks at each line independently; a match anywhere in the output counts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::MarkerError;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());

/// Case-insensitive substring search over every line.
pub fn contains_text(output: &[String], text: &str) -> bool {
    let needle = text.to_lowercase();
    output
        .iter()
        .any(|line| line.to_lowercase().contains(&needle))
}

/// Whether any line matches `pattern`.
///
/// # Errors
///
/// Returns [`MarkerError::InvalidPattern`] if the pattern does not compile.
pub fn matches_pattern(output: &[String], pattern: &str) -> Result<bool, MarkerError> {
    let regex = compile_pattern(pattern)?;
    Ok(output.iter().any(|line| regex.is_match(line)))
}

/// Whether every one of `texts` appears somewhere in the output.
pub fn contains_all<S: AsRef<str>>(output: &[String], texts: &[S]) -> bool {
    texts.iter().all(|text| contains_text(output, text.as_ref()))
}

/// Whether any numeric literal in the output lies within `tolerance` of `expected`.
pub fn contains_number(output: &[String], expected: f64, tolerance: f64) -> bool {
    output
        .iter()
        .flat_map(|line| extract_numbers(line))
        .any(|found| (found - expected).abs() <= tolerance.abs())
}

/// Every numeric literal in `line`, in order of appearance.
pub fn extract_numbers(line: &str) -> Vec<f64> {
    NUMBER
        .find_iter(line)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, MarkerError> {
    Regex::new(pattern).map_err(|e| MarkerError::InvalidPattern(format!("{pattern}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_contains_text_ignores_case() {
        let output = lines(&["PROMPT: Enter your name", "Hello, Ada!"]);
        assert!(contains_text(&output, "hello, ada"));
        assert!(contains_text(&output, "ENTER YOUR"));
        assert!(!contains_text(&output, "goodbye"));
    }

    #[test]
    fn test_matches_pattern() {
        let output = lines(&["Total: 42", "done"]);
        assert!(matches_pattern(&output, r"^Total: \d+$").unwrap());
        assert!(!matches_pattern(&output, r"^Average").unwrap());
    }

    #[test]
    fn test_matches_pattern_rejects_invalid_regex() {
        let err = matches_pattern(&lines(&["x"]), "(unclosed").unwrap_err();
        assert!(matches!(err, MarkerError::InvalidPattern(_)));
    }

    #[test]
    fn test_contains_all() {
        let output = lines(&["apples: 3", "pears: 5"]);
        assert!(contains_all(&output, &["apples", "PEARS"]));
        assert!(!contains_all(&output, &["apples", "plums"]));
        assert!(contains_all::<&str>(&output, &[]));
    }

    #[test]
    fn test_extract_numbers() {
        assert_eq!(extract_numbers("x=3, y=-4.5, z=.25"), vec![3.0, -4.5, 0.25]);
        assert_eq!(extract_numbers("big 1e3"), vec![1000.0]);
        assert!(extract_numbers("no digits").is_empty());
    }

    #[test]
    fn test_contains_number_with_tolerance() {
        let output = lines(&["Average: 3.3333333", "Count: 7"]);
        assert!(contains_number(&output, 3.33, 0.01));
        assert!(!contains_number(&output, 3.3, 0.01));
        assert!(contains_number(&output, 7.0, 0.0));
    }
}
