//! # Mark Report Module
//!
//! The serialisable output of a marking job. A [`MarkReport`] records what the submission's
//! run did, how each check was marked, the learner feedback and the resulting scores. It is
//! returned wrapped in a [`MarkReportResponse`] envelope.
//!
//! ## JSON Output Example
//!
//! ```json
//! {
//!   "success": true,
//!   "message": "Grading complete.",
//!   "data": {
//!     "submission_id": "u123",
//!     "created_at": "2025-08-01T10:00:00Z",
//!     "correctness": 80,
//!     "quality": -25.0,
//!     "overall_score": 60,
//!     "execution": { "success": true, "error": null, "error_kind": null,
//!                    "output_lines": 3, "call_counts": { "prompt": 1, ... } },
//!     "task_results": [
//!       { "name": "...", "awarded": 4, "possible": 5, "percentage": 80.0 }
//!     ],
//!     "feedback": [
//!       { "task": "...", "message": "..." }
//!     ]
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use code_runner::{CallCounts, ErrorKind, ExecutionResult};
use serde::Serialize;

use crate::traits::feedback::FeedbackEntry;
use crate::types::JsonTaskResult;

/// What the learner's script run did, without its full output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub success: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub output_lines: usize,
    pub call_counts: CallCounts,
}

impl From<&ExecutionResult> for ExecutionSummary {
    fn from(run: &ExecutionResult) -> Self {
        ExecutionSummary {
            success: run.success,
            error: run.error.clone(),
            error_kind: run.error_kind,
            output_lines: run.all_output.len(),
            call_counts: run.call_counts.clone(),
        }
    }
}

/// The final report generated after marking a submission.
#[derive(Debug, Clone, Serialize)]
pub struct MarkReport {
    pub submission_id: String,
    pub created_at: DateTime<Utc>,
    /// Marks awarded over marks possible, as a percentage.
    pub correctness: u32,
    /// The opaque code-quality score, when one was supplied.
    pub quality: Option<f64>,
    /// `correctness` adjusted by `quality`, or `correctness` alone.
    pub overall_score: u32,
    pub execution: ExecutionSummary,
    pub task_results: Vec<JsonTaskResult>,
    pub feedback: Vec<FeedbackEntry>,
}

/// The response envelope for grading results.
#[derive(Debug, Clone, Serialize)]
pub struct MarkReportResponse {
    success: bool,
    message: String,
    data: MarkReport,
}

impl MarkReportResponse {
    pub fn report(&self) -> &MarkReport {
        &self.data
    }

    pub fn into_report(self) -> MarkReport {
        self.data
    }
}

/// Enables ergonomic conversion from [`MarkReport`] to [`MarkReportResponse`].
impl From<MarkReport> for MarkReportResponse {
    fn from(report: MarkReport) -> Self {
        MarkReportResponse {
            success: true,
            message: "Grading complete.".to_string(),
            data: report,
        }
    }
}
