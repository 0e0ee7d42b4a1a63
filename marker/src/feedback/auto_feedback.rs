//! # AutoFeedback Strategy
//!
//! Template-based feedback from the matched and missed patterns of each result:
//!
//! - Anything missed produces `Missing: <pattern>, <pattern>`.
//! - Otherwise, anything matched produces `All patterns matched`.
//! - A result with neither gets an empty message so entries stay aligned with results.

use crate::error::MarkerError;
use crate::traits::feedback::{Feedback, FeedbackEntry};
use crate::types::TaskResult;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoFeedback;

#[async_trait]
impl Feedback for AutoFeedback {
    async fn assemble_feedback(
        &self,
        results: &[TaskResult],
    ) -> Result<Vec<FeedbackEntry>, MarkerError> {
        Ok(results
            .iter()
            .map(|result| {
                let message = if !result.missed_patterns.is_empty() {
                    format!("Missing: {}", result.missed_patterns.join(", "))
                } else if !result.matched_patterns.is_empty() {
                    "All patterns matched".to_string()
                } else {
                    String::new()
                };
                FeedbackEntry {
                    task: result.name.clone(),
                    message,
                }
            })
            .collect())
    }
}
