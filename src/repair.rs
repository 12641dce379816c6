//! Execution-guided repair: the loop that turns failing queries into
//! executable ones.
//!
//! The graph backend is the only judge of a candidate query. The initial
//! candidate is executed first and consumes no retry budget. Each repair
//! round then costs exactly one completion call (the fix request, carrying
//! the previous query and its diagnostic) and one execution of the new
//! candidate. An empty result set is success. Backend errors are recorded
//! and drive the next round; completion errors are not retried and
//! propagate immediately. When the budget runs out the caller gets the full
//! attempt history, not just the last failure.

use std::fmt;

use tracing::{info, warn};

use crate::error::{AnkhResult, ExecError, RepairError};
use crate::graph::{QueryExecutor, ResultSet};
use crate::llm::{ChatMessage, CompletionClient, Decoding, ModelRef};
use crate::pipeline::Deadline;
use crate::prompt::PromptSet;
use crate::question::{Query, Question};

/// Default repair budget.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// An execution diagnostic as shown to the model.
///
/// Captured from an [`ExecError`]'s rendered message at the moment of
/// failure, so the fix request always carries the diagnostic of the query it
/// names, not a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail(String);

impl ErrorDetail {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ExecError> for ErrorDetail {
    fn from(err: &ExecError) -> Self {
        Self(err.to_string())
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened when a candidate query was executed.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success(ResultSet),
    Failure(ErrorDetail),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}

/// One entry of the attempt history.
#[derive(Debug, Clone)]
pub struct RepairAttempt {
    /// 0 for the initial candidate, then 1..=max_retries for repair rounds.
    pub round: usize,
    pub query: Query,
    pub outcome: ExecutionOutcome,
}

/// A successfully resolved query with its execution results and history.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The query that executed cleanly.
    pub query: Query,
    pub rows: ResultSet,
    /// Every candidate tried, in order; the last entry is the success.
    pub attempts: Vec<RepairAttempt>,
}

impl Resolution {
    /// Number of repair rounds it took (0 if the initial candidate ran).
    pub fn repair_rounds(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }
}

/// The bounded repair state machine.
pub struct RepairLoop<'a> {
    executor: &'a dyn QueryExecutor,
    client: &'a dyn CompletionClient,
    prompts: &'a PromptSet,
    max_retries: usize,
    stop_on_repeat: bool,
}

impl<'a> RepairLoop<'a> {
    pub fn new(
        executor: &'a dyn QueryExecutor,
        client: &'a dyn CompletionClient,
        prompts: &'a PromptSet,
    ) -> Self {
        Self {
            executor,
            client,
            prompts,
            max_retries: DEFAULT_MAX_RETRIES,
            stop_on_repeat: false,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Give up early when the model returns the query it was asked to fix.
    ///
    /// Off by default: with it off the budget is exact (a failing question
    /// costs exactly `max_retries` completion calls, never more). The
    /// repeated candidate is neither re-executed nor added to the history.
    pub fn with_stop_on_repeat(mut self, stop_on_repeat: bool) -> Self {
        self.stop_on_repeat = stop_on_repeat;
        self
    }

    /// Drive `initial` to an executable query, or fail with the full history.
    pub fn resolve(
        &self,
        question: &Question,
        initial: Query,
        model: &ModelRef,
        deadline: &Deadline,
    ) -> AnkhResult<Resolution> {
        let mut attempts = Vec::with_capacity(1 + self.max_retries);

        deadline.check()?;
        let mut last_error = match self.executor.execute(initial.as_str()) {
            Ok(rows) => {
                attempts.push(RepairAttempt {
                    round: 0,
                    query: initial.clone(),
                    outcome: ExecutionOutcome::Success(rows.clone()),
                });
                info!(rows = rows.len(), "initial query executed cleanly");
                return Ok(Resolution {
                    query: initial,
                    rows,
                    attempts,
                });
            }
            Err(e) => {
                warn!(error = %e, "initial query failed, entering repair");
                let detail = ErrorDetail::from(&e);
                attempts.push(RepairAttempt {
                    round: 0,
                    query: initial.clone(),
                    outcome: ExecutionOutcome::Failure(detail.clone()),
                });
                detail
            }
        };

        let mut current = initial;
        for round in 1..=self.max_retries {
            deadline.check()?;
            let messages = [
                ChatMessage::system(self.prompts.repair.clone()),
                ChatMessage::user(repair_context(question, &current, &last_error)),
            ];
            let text = self
                .client
                .complete(&messages, model, Decoding::DETERMINISTIC)?;
            let next = Query::new(text);

            if self.stop_on_repeat && next == current {
                warn!(round, "model repeated the failing query, giving up early");
                break;
            }
            current = next;

            deadline.check()?;
            match self.executor.execute(current.as_str()) {
                Ok(rows) => {
                    attempts.push(RepairAttempt {
                        round,
                        query: current.clone(),
                        outcome: ExecutionOutcome::Success(rows.clone()),
                    });
                    info!(round, rows = rows.len(), "query repaired");
                    return Ok(Resolution {
                        query: current,
                        rows,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(round, error = %e, "repaired query still fails");
                    last_error = ErrorDetail::from(&e);
                    attempts.push(RepairAttempt {
                        round,
                        query: current.clone(),
                        outcome: ExecutionOutcome::Failure(last_error.clone()),
                    });
                }
            }
        }

        Err(RepairError::Unresolved {
            question: question.text().to_string(),
            attempts,
        }
        .into())
    }
}

/// The user message of a fix request: question, failing query, diagnostic.
fn repair_context(question: &Question, failed: &Query, error: &ErrorDetail) -> String {
    format!(
        "Question: {}\n\nPrevious SPARQL query:\n{}\n\nError message:\n{}",
        question.prompt_text(),
        failed,
        error
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::AnkhError;
    use crate::graph::GraphValue;
    use crate::llm::LlmError;

    struct ScriptExecutor {
        outcomes: Mutex<VecDeque<Result<ResultSet, ExecError>>>,
        calls: AtomicUsize,
    }

    impl ScriptExecutor {
        fn new(outcomes: Vec<Result<ResultSet, ExecError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QueryExecutor for ScriptExecutor {
        fn execute(&self, _sparql: &str) -> Result<ResultSet, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ResultSet::empty()))
        }
    }

    struct ScriptClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        seen_user: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptClient {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen_user: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CompletionClient for ScriptClient {
        fn complete(
            &self,
            messages: &[ChatMessage],
            _model: &ModelRef,
            _decoding: Decoding,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(user) = messages.last() {
                self.seen_user.lock().unwrap().push(user.content.clone());
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("SELECT ?fallback WHERE { }".into()))
        }
    }

    fn one_row() -> ResultSet {
        ResultSet::new(vec![vec![GraphValue::Literal("Le Havre".into())]])
    }

    fn query_error(msg: &str) -> ExecError {
        ExecError::Query {
            message: msg.into(),
        }
    }

    fn run(
        executor: &ScriptExecutor,
        client: &ScriptClient,
        max_retries: usize,
        stop_on_repeat: bool,
    ) -> AnkhResult<Resolution> {
        let prompts = PromptSet::default();
        RepairLoop::new(executor, client, &prompts)
            .with_max_retries(max_retries)
            .with_stop_on_repeat(stop_on_repeat)
            .resolve(
                &Question::new("Who directed [Le Havre]?"),
                Query::new("SELECT ?d WHERE { ?f ?p ?d }"),
                &ModelRef::from("m"),
                &Deadline::unbounded(),
            )
    }

    #[test]
    fn clean_initial_execution_makes_no_completion_calls() {
        let executor = ScriptExecutor::new(vec![Ok(one_row())]);
        let client = ScriptClient::new(vec![]);
        let resolution = run(&executor, &client, 3, false).unwrap();

        assert_eq!(client.calls(), 0);
        assert_eq!(executor.calls(), 1);
        assert_eq!(resolution.repair_rounds(), 0);
        assert_eq!(resolution.attempts.len(), 1);
        assert!(resolution.attempts[0].outcome.is_success());
    }

    #[test]
    fn empty_result_set_is_success_not_retried() {
        let executor = ScriptExecutor::new(vec![Ok(ResultSet::empty())]);
        let client = ScriptClient::new(vec![]);
        let resolution = run(&executor, &client, 3, false).unwrap();

        assert_eq!(client.calls(), 0);
        assert!(resolution.rows.is_empty());
    }

    #[test]
    fn success_at_round_two_costs_two_completions() {
        let executor = ScriptExecutor::new(vec![
            Err(query_error("MALFORMED QUERY: bad prefix")),
            Err(query_error("MALFORMED QUERY: still bad")),
            Ok(one_row()),
        ]);
        let client = ScriptClient::new(vec![
            Ok("SELECT ?d WHERE { fix one }".into()),
            Ok("SELECT ?d WHERE { fix two }".into()),
        ]);
        let resolution = run(&executor, &client, 3, false).unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(executor.calls(), 3);
        assert_eq!(resolution.repair_rounds(), 2);
        assert_eq!(resolution.query.as_str(), "SELECT ?d WHERE { fix two }");
        assert_eq!(resolution.attempts.len(), 3);
        assert!(!resolution.attempts[0].outcome.is_success());
        assert!(!resolution.attempts[1].outcome.is_success());
        assert!(resolution.attempts[2].outcome.is_success());
    }

    #[test]
    fn budget_exhaustion_yields_full_history() {
        let executor = ScriptExecutor::new(vec![
            Err(query_error("err 0")),
            Err(query_error("err 1")),
            Err(query_error("err 2")),
            Err(query_error("err 3")),
        ]);
        let client = ScriptClient::new(vec![
            Ok("candidate 1".into()),
            Ok("candidate 2".into()),
            Ok("candidate 3".into()),
        ]);
        let err = run(&executor, &client, 3, false).unwrap_err();

        assert_eq!(client.calls(), 3);
        assert_eq!(executor.calls(), 4);
        match err {
            AnkhError::Repair(RepairError::Unresolved { attempts, .. }) => {
                assert_eq!(attempts.len(), 4);
                for (i, attempt) in attempts.iter().enumerate() {
                    assert_eq!(attempt.round, i);
                    assert!(!attempt.outcome.is_success());
                }
            }
            other => panic!("expected Unresolved, got {other:?}"),
        }
    }

    #[test]
    fn zero_budget_fails_after_initial_execution() {
        let executor = ScriptExecutor::new(vec![Err(query_error("nope"))]);
        let client = ScriptClient::new(vec![]);
        let err = run(&executor, &client, 0, false).unwrap_err();

        assert_eq!(client.calls(), 0);
        assert_eq!(executor.calls(), 1);
        assert!(matches!(
            err,
            AnkhError::Repair(RepairError::Unresolved { .. })
        ));
    }

    #[test]
    fn completion_failure_propagates_immediately() {
        let executor = ScriptExecutor::new(vec![Err(query_error("bad"))]);
        let client = ScriptClient::new(vec![Err(LlmError::RequestFailed {
            message: "connection refused".into(),
        })]);
        let err = run(&executor, &client, 3, false).unwrap_err();

        assert_eq!(executor.calls(), 1);
        assert_eq!(client.calls(), 1);
        assert!(matches!(err, AnkhError::Llm(LlmError::RequestFailed { .. })));
    }

    #[test]
    fn fix_request_carries_previous_query_and_its_diagnostic() {
        let executor = ScriptExecutor::new(vec![
            Err(query_error("first diagnostic")),
            Err(query_error("second diagnostic")),
            Ok(one_row()),
        ]);
        let client = ScriptClient::new(vec![
            Ok("candidate one".into()),
            Ok("candidate two".into()),
        ]);
        run(&executor, &client, 3, false).unwrap();

        let seen = client.seen_user.lock().unwrap();
        assert!(seen[0].contains("SELECT ?d WHERE { ?f ?p ?d }"));
        assert!(seen[0].contains("first diagnostic"));
        assert!(seen[0].contains("Who directed [Le Havre]?"));
        assert!(seen[1].contains("candidate one"));
        assert!(seen[1].contains("second diagnostic"));
        assert!(!seen[1].contains("first diagnostic"));
    }

    #[test]
    fn stop_on_repeat_gives_up_without_reexecuting() {
        let executor = ScriptExecutor::new(vec![Err(query_error("bad"))]);
        // The model parrots the query it was asked to fix.
        let client = ScriptClient::new(vec![Ok("SELECT ?d WHERE { ?f ?p ?d }".into())]);
        let err = run(&executor, &client, 3, true).unwrap_err();

        assert_eq!(client.calls(), 1);
        assert_eq!(executor.calls(), 1);
        match err {
            AnkhError::Repair(RepairError::Unresolved { attempts, .. }) => {
                assert_eq!(attempts.len(), 1);
            }
            other => panic!("expected Unresolved, got {other:?}"),
        }
    }

    #[test]
    fn repeat_detection_off_by_default_keeps_budget_exact() {
        let executor = ScriptExecutor::new(vec![
            Err(query_error("e")),
            Err(query_error("e")),
            Err(query_error("e")),
            Err(query_error("e")),
        ]);
        let client = ScriptClient::new(vec![
            Ok("SELECT ?d WHERE { ?f ?p ?d }".into()),
            Ok("SELECT ?d WHERE { ?f ?p ?d }".into()),
            Ok("SELECT ?d WHERE { ?f ?p ?d }".into()),
        ]);
        let err = run(&executor, &client, 3, false).unwrap_err();

        assert_eq!(client.calls(), 3);
        assert_eq!(executor.calls(), 4);
        assert!(matches!(
            err,
            AnkhError::Repair(RepairError::Unresolved { .. })
        ));
    }
}
