//! Offline evaluation of generated queries against a labeled dataset.
//!
//! Two modes share the scoring machinery in [`metrics`]. Recorded mode
//! scores candidate queries already present in the dataset. Generated mode
//! asks a [`Pipeline`] to produce a query for each question first, then
//! scores what came back. Either way the reference query defines ground
//! truth, so an example whose reference will not execute cannot be judged.

pub mod dataset;
pub mod metrics;

pub use dataset::{LabeledExample, load_dataset};
pub use metrics::{Counts, EvalReport, Metrics, TypeCounts};

use tracing::{info, warn};

use crate::error::{AnkhError, AnkhResult};
use crate::graph::QueryExecutor;
use crate::pipeline::Pipeline;
use crate::verify::Verifier;

/// Options for an evaluation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    /// Score only the first N examples.
    pub limit: Option<usize>,
}

/// Score the candidate queries recorded in the dataset.
pub fn run_recorded(
    executor: &dyn QueryExecutor,
    examples: &[LabeledExample],
    options: EvalOptions,
) -> EvalReport {
    let verifier = Verifier::new(executor);
    let mut report = EvalReport::default();
    let take = options.limit.unwrap_or(examples.len());

    for (idx, example) in examples.iter().take(take).enumerate() {
        let question_type = example.question_type();
        let Some(generated) = example.sparql_response.as_deref() else {
            warn!(idx, "example has no recorded candidate query, skipping");
            report.record_unjudgeable(question_type);
            continue;
        };
        match verifier.compare(generated, &example.sparql) {
            Ok(verdict) => report.record(question_type, &verdict),
            Err(e) => {
                warn!(idx, error = %e, "reference query failed, skipping");
                report.record_unjudgeable(question_type);
            }
        }
    }

    info!(
        judged = report.judged,
        skipped = report.skipped,
        "evaluation complete"
    );
    report
}

/// Generate a query for each question through the pipeline, then score it.
///
/// Repair exhaustion and per-question deadlines count as misses against the
/// reference result set. Completion backend failures abort the run, since
/// every remaining example would fail the same way.
pub fn run_generated(
    executor: &dyn QueryExecutor,
    pipeline: &Pipeline,
    examples: &[LabeledExample],
    options: EvalOptions,
) -> AnkhResult<EvalReport> {
    let verifier = Verifier::new(executor);
    let mut report = EvalReport::default();
    let take = options.limit.unwrap_or(examples.len());

    for (idx, example) in examples.iter().take(take).enumerate() {
        let question_type = example.question_type();
        let question = example.to_question();

        let resolution = match pipeline.resolve_query(&question) {
            Ok(resolution) => resolution,
            Err(AnkhError::Repair(e)) => {
                warn!(idx, error = %e, "no executable query for example");
                score_generation_failure(&mut report, executor, example, question_type);
                continue;
            }
            Err(AnkhError::Pipeline(e)) => {
                warn!(idx, error = %e, "pipeline gave up on example");
                score_generation_failure(&mut report, executor, example, question_type);
                continue;
            }
            Err(other) => return Err(other),
        };

        match verifier.compare(resolution.query.as_str(), &example.sparql) {
            Ok(verdict) => report.record(question_type, &verdict),
            Err(e) => {
                warn!(idx, error = %e, "reference query failed, skipping");
                report.record_unjudgeable(question_type);
            }
        }
    }

    info!(
        judged = report.judged,
        skipped = report.skipped,
        "evaluation complete"
    );
    Ok(report)
}

/// Score a query-generation failure as a miss against the reference rows.
fn score_generation_failure(
    report: &mut EvalReport,
    executor: &dyn QueryExecutor,
    example: &LabeledExample,
    question_type: &str,
) {
    match executor.execute(&example.sparql) {
        Ok(reference) => report.record_generation_failure(question_type, &reference),
        Err(e) => {
            warn!(error = %e, "reference query failed, skipping");
            report.record_unjudgeable(question_type);
        }
    }
}
