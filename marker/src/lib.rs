//! # Marker Library
//!
//! Marks learner submissions by running them in the `code_runner` sandbox and checking the
//! observed behaviour against an exercise's expectation set.
//!
//! ## Key Concepts
//! - **MarkingJob**: One submission: its code, queued prompt responses, the expectation set,
//!   an optional code-quality score and the limits to run under.
//! - **Expectations**: Named, weighted checks over the run's output, call counts, observed
//!   identifiers and the functions it leaves behind.
//! - **Comparators**: Pluggable strategies for finding expected patterns in output.
//! - **Feedback**: Automated feedback generation for each check.
//! - **Reports**: Structured output summarising scores and feedback.
//!
//! Each job builds its own [`Sandbox`], and with it its own mock state, so [`mark_all`] can
//! mark many submissions at once without them observing each other.

pub mod comparators;
pub mod error;
pub mod expectations;
pub mod feedback;
pub mod parsers;
pub mod predicates;
pub mod report;
pub mod scorer;
pub mod traits;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use code_runner::{ExecutionLimits, ExecutionResult, Sandbox};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use util::config::AppConfig;

use crate::error::MarkerError;
use crate::expectations::ExpectationSet;
use crate::feedback::auto_feedback::AutoFeedback;
use crate::report::{ExecutionSummary, MarkReport, MarkReportResponse};
use crate::scorer::{apply_quality_adjustment, compute_overall_score};
use crate::traits::feedback::Feedback;
use crate::types::{JsonTaskResult, QualityReport, TaskResult};

/// Represents a marking job for a single learner submission.
///
/// # Fields
/// - `submission_id`: Identifier echoed into the report.
/// - `code`: The learner's fragment.
/// - `responses`: Answers queued for `prompt`, consumed in order.
/// - `expectations`: The checks to mark against.
/// - `quality`: Optional analyser output folded into the overall score.
/// - `limits`: Resource limits for the run and every function call.
/// - `feedback`: Strategy turning results into learner feedback.
pub struct MarkingJob {
    submission_id: String,
    code: String,
    responses: Vec<String>,
    expectations: ExpectationSet,
    quality: Option<QualityReport>,
    limits: ExecutionLimits,
    feedback: Box<dyn Feedback + Send + Sync>,
}

impl MarkingJob {
    /// Create a new marking job.
    ///
    /// Limits come from the expectation set when it ships its own, otherwise from the
    /// global [`AppConfig`].
    pub fn new(
        submission_id: impl Into<String>,
        code: impl Into<String>,
        expectations: ExpectationSet,
    ) -> Self {
        let limits = match &expectations.limits {
            Some(limits) => limits.clone(),
            None => ExecutionLimits::from_config(&AppConfig::global()),
        };
        Self {
            submission_id: submission_id.into(),
            code: code.into(),
            responses: Vec::new(),
            expectations,
            quality: None,
            limits,
            feedback: Box::new(AutoFeedback),
        }
    }

    /// Queue the answers `prompt` will return, in order.
    pub fn with_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses = responses.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the code-quality analyser's report for this submission.
    pub fn with_quality(mut self, quality: QualityReport) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Override the resource limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set a custom feedback strategy for this marking job.
    pub fn with_feedback<F: Feedback + Send + Sync + 'static>(mut self, feedback: F) -> Self {
        self.feedback = Box::new(feedback);
        self
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    /// Run the marking process and generate a report.
    ///
    /// # Steps
    /// 1. Runs the submission in a fresh sandbox on a blocking worker thread.
    /// 2. Evaluates every expectation against the run and its session.
    /// 3. Computes correctness and applies the quality adjustment, if any.
    /// 4. Generates feedback and builds the report.
    ///
    /// A submission that fails to compile, throws or times out is still marked; only a
    /// failure of the worker itself or of the feedback strategy is an `Err`.
    pub async fn mark(self) -> Result<MarkReportResponse, MarkerError> {
        let MarkingJob {
            submission_id,
            code,
            responses,
            expectations,
            quality,
            limits,
            feedback,
        } = self;

        let (run, results) = tokio::task::spawn_blocking(move || {
            evaluate(&code, responses, &expectations, limits)
        })
        .await
        .map_err(|e| MarkerError::Execution(format!("marking {submission_id}: {e}")))?;

        let correctness = compute_overall_score(&results)?;
        let overall_score = match &quality {
            Some(report) => apply_quality_adjustment(correctness, report.score),
            None => correctness,
        };
        let feedback = feedback.assemble_feedback(&results).await?;

        info!(
            submission = %submission_id,
            checks = results.len(),
            correctness,
            overall_score,
            run_succeeded = run.success,
            "submission marked"
        );

        let report = MarkReport {
            submission_id,
            created_at: Utc::now(),
            correctness,
            quality: quality.map(|q| q.score),
            overall_score,
            execution: ExecutionSummary::from(&run),
            task_results: results.iter().map(JsonTaskResult::from).collect(),
            feedback,
        };
        Ok(report.into())
    }
}

fn evaluate(
    code: &str,
    responses: Vec<String>,
    expectations: &ExpectationSet,
    limits: ExecutionLimits,
) -> (ExecutionResult, Vec<TaskResult>) {
    let mut sandbox = Sandbox::new(limits);
    let run = sandbox.run_script(code, responses);
    let results = expectations
        .expectations
        .iter()
        .map(|entry| entry.evaluate(&run, &mut sandbox))
        .collect();
    (run, results)
}

/// Marks `jobs` concurrently, at most `max_concurrency` at a time.
///
/// Results come back in the order the jobs were given. Each job owns its sandbox, so no
/// state is shared between concurrently marked submissions.
pub async fn mark_all(
    jobs: Vec<MarkingJob>,
    max_concurrency: usize,
) -> Vec<Result<MarkReportResponse, MarkerError>> {
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut workers = JoinSet::new();
    let total = jobs.len();

    for (index, job) in jobs.into_iter().enumerate() {
        let permits = Arc::clone(&permits);
        workers.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (index, Err(MarkerError::Execution(e.to_string()))),
            };
            (index, job.mark().await)
        });
    }

    let mut slots: Vec<Option<Result<MarkReportResponse, MarkerError>>> =
        (0..total).map(|_| None).collect();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => warn!("marking task failed to complete: {e}"),
        }
    }

    let marked = slots.iter().filter(|slot| matches!(slot, Some(Ok(_)))).count();
    info!(total, marked, max_concurrency, "batch marking finished");

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(MarkerError::Execution(
                    "marking task did not complete".to_string(),
                ))
            })
        })
        .collect()
}

/// [`mark_all`] with the concurrency bound from the global [`AppConfig`].
pub async fn mark_all_configured(
    jobs: Vec<MarkingJob>,
) -> Vec<Result<MarkReportResponse, MarkerError>> {
    let max_concurrency = AppConfig::global().max_concurrent_jobs;
    mark_all(jobs, max_concurrency).await
}
