//! End-to-end pipeline: synthesis, repair, grounded answering.
//!
//! `Pipeline` is the facade the CLI and the eval runner drive. It owns the
//! two injected boundaries (graph executor, completion client) behind `Arc`s
//! so one instance can serve many questions, and threads an optional
//! whole-request [`Deadline`] through every step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::answer::synthesize_answer;
use crate::error::{AnkhResult, PipelineError};
use crate::graph::{QueryExecutor, ResultSet};
use crate::llm::{CompletionClient, ModelRef};
use crate::prompt::PromptSet;
use crate::question::{Answer, Query, Question};
use crate::repair::{DEFAULT_MAX_RETRIES, RepairLoop, Resolution};
use crate::synthesize::synthesize_query;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Model for query synthesis and repair.
    pub query_model: ModelRef,
    /// Model for answer phrasing.
    pub answer_model: ModelRef,
    /// Repair budget per question.
    pub max_retries: usize,
    /// Give up early when the model repeats the failing query.
    pub stop_on_repeat: bool,
    /// Whole-request budget; `None` means unbounded.
    pub deadline: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            query_model: ModelRef::from("llama3.2"),
            answer_model: ModelRef::from("llama3.2"),
            max_retries: DEFAULT_MAX_RETRIES,
            stop_on_repeat: false,
            deadline: None,
        }
    }
}

/// An answer together with the evidence that produced it.
#[derive(Debug, Clone)]
pub struct Grounded {
    pub answer: Answer,
    /// The query whose results ground the answer.
    pub query: Query,
    pub rows: ResultSet,
    /// Candidates executed, including the successful one.
    pub attempts: usize,
}

/// A per-request deadline checked before each remote call.
///
/// Checks happen between steps, so an in-flight call can overrun by at most
/// its own per-call timeout before the next check surfaces
/// [`PipelineError::DeadlineExceeded`].
#[derive(Debug, Clone)]
pub struct Deadline {
    end: Option<Instant>,
    budget_secs: u64,
}

impl Deadline {
    pub fn start(budget: Option<Duration>) -> Self {
        Self {
            end: budget.map(|b| Instant::now() + b),
            budget_secs: budget.map(|b| b.as_secs()).unwrap_or(0),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            end: None,
            budget_secs: 0,
        }
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        match self.end {
            Some(end) if Instant::now() >= end => Err(PipelineError::DeadlineExceeded {
                secs: self.budget_secs,
            }),
            _ => Ok(()),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.end
            .map(|end| end.saturating_duration_since(Instant::now()))
    }
}

/// The question-answering facade.
pub struct Pipeline {
    executor: Arc<dyn QueryExecutor>,
    client: Arc<dyn CompletionClient>,
    prompts: PromptSet,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(executor: Arc<dyn QueryExecutor>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            executor,
            client,
            prompts: PromptSet::default(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Answer a question end to end: synthesize, repair, ground, phrase.
    pub fn answer_question(&self, question: &Question) -> AnkhResult<Grounded> {
        let deadline = Deadline::start(self.options.deadline);
        info!(question = %question.text(), model = %self.options.query_model, "answering question");

        let resolution = self.resolve_with(question, &deadline)?;
        info!(
            attempts = resolution.attempts.len(),
            rows = resolution.rows.len(),
            "query resolved"
        );

        deadline.check()?;
        let answer = synthesize_answer(
            self.client.as_ref(),
            &self.prompts,
            question,
            &resolution.query,
            &resolution.rows,
            &self.options.answer_model,
        )?;

        Ok(Grounded {
            answer,
            query: resolution.query,
            rows: resolution.rows,
            attempts: resolution.attempts.len(),
        })
    }

    /// Synthesize and resolve a query without phrasing an answer.
    ///
    /// This is the query-scoring path of the eval runner.
    pub fn resolve_query(&self, question: &Question) -> AnkhResult<Resolution> {
        let deadline = Deadline::start(self.options.deadline);
        self.resolve_with(question, &deadline)
    }

    fn resolve_with(&self, question: &Question, deadline: &Deadline) -> AnkhResult<Resolution> {
        deadline.check()?;
        let initial = synthesize_query(
            self.client.as_ref(),
            &self.prompts,
            question,
            &self.options.query_model,
        )?;

        RepairLoop::new(self.executor.as_ref(), self.client.as_ref(), &self.prompts)
            .with_max_retries(self.options.max_retries)
            .with_stop_on_repeat(self.options.stop_on_repeat)
            .resolve(question, initial, &self.options.query_model, deadline)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{AnkhError, ExecError};
    use crate::graph::GraphValue;
    use crate::llm::{ChatMessage, Decoding, LlmError};

    struct FixedExecutor {
        rows: ResultSet,
        calls: AtomicUsize,
    }

    impl QueryExecutor for FixedExecutor {
        fn execute(&self, _sparql: &str) -> Result<ResultSet, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.clone())
        }
    }

    struct FixedClient {
        replies: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl CompletionClient for FixedClient {
        fn complete(
            &self,
            _messages: &[ChatMessage],
            _model: &ModelRef,
            _decoding: Decoding,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok("fallback".into())
            } else {
                Ok(replies.remove(0))
            }
        }
    }

    fn pipeline(rows: ResultSet, replies: Vec<&str>) -> Pipeline {
        Pipeline::new(
            Arc::new(FixedExecutor {
                rows,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(FixedClient {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
                calls: AtomicUsize::new(0),
            }),
        )
    }

    #[test]
    fn grounded_answer_carries_query_rows_and_attempts() {
        let rows = ResultSet::new(vec![vec![GraphValue::Literal("Aki Kaurismäki".into())]]);
        let p = pipeline(rows.clone(), vec!["SELECT ?d ...", "Aki Kaurismäki."]);
        let grounded = p
            .answer_question(&Question::new("Who directed [Le Havre]?"))
            .unwrap();

        assert_eq!(grounded.answer.as_str(), "Aki Kaurismäki.");
        assert_eq!(grounded.query.as_str(), "SELECT ?d ...");
        assert_eq!(grounded.rows, rows);
        assert_eq!(grounded.attempts, 1);
    }

    #[test]
    fn exhausted_deadline_fails_before_any_remote_call() {
        let p = pipeline(ResultSet::empty(), vec![]).with_options(PipelineOptions {
            deadline: Some(Duration::ZERO),
            ..PipelineOptions::default()
        });
        let err = p
            .answer_question(&Question::new("Who directed [Le Havre]?"))
            .unwrap_err();
        assert!(matches!(
            err,
            AnkhError::Pipeline(PipelineError::DeadlineExceeded { .. })
        ));
    }

    #[test]
    fn unbounded_deadline_never_trips() {
        let d = Deadline::unbounded();
        assert!(d.check().is_ok());
        assert!(d.remaining().is_none());
    }

    #[test]
    fn resolve_query_skips_answer_synthesis() {
        let rows = ResultSet::from_bool(true);
        let p = pipeline(rows, vec!["ASK { ... }"]);
        let resolution = p
            .resolve_query(&Question::new("Did Aki Kaurismäki direct [Le Havre]?"))
            .unwrap();
        assert_eq!(resolution.query.as_str(), "ASK { ... }");
        assert_eq!(resolution.repair_rounds(), 0);
    }
}
