//! Rich diagnostic error types for per-ankh.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it. `ExecError` doubles as the repair feedback
//! channel: its rendered message is what the model is shown when asked to fix a
//! failed query. The LLM client keeps its error type in `crate::llm`.

use miette::Diagnostic;
use thiserror::Error;

use crate::llm::LlmError;
use crate::repair::RepairAttempt;

/// Top-level error type for per-ankh.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source chains) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum AnkhError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repair(#[from] RepairError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

// ---------------------------------------------------------------------------
// Graph execution errors
// ---------------------------------------------------------------------------

/// Errors from the graph backend.
///
/// Failures surfaced by query execution are repairable: the repair loop
/// records the rendered message and hands it to the model as the diagnostic
/// for the next candidate query.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    #[error("query rejected by the graph backend: {message}")]
    #[diagnostic(
        code(ankh::graph::query),
        help(
            "The backend could not parse or evaluate the query. \
             When this happens inside the pipeline the message is forwarded \
             to the repair loop verbatim."
        )
    )]
    Query { message: String },

    #[error("connection to the graph backend failed: {message}")]
    #[diagnostic(
        code(ankh::graph::connection),
        help("Check that the endpoint URL is correct and the graph store is running.")
    )]
    Connection { message: String },

    #[error("query timed out after {seconds} seconds")]
    #[diagnostic(
        code(ankh::graph::timeout),
        help("Raise [graph] timeout_secs, or add a LIMIT clause to bound the query.")
    )]
    Timeout { seconds: u64 },

    #[error("failed to decode query results: {message}")]
    #[diagnostic(
        code(ankh::graph::decode),
        help(
            "The backend returned a malformed or unsupported result document. \
             Only SELECT and ASK results are supported."
        )
    )]
    Decode { message: String },

    #[error("invalid RDF term: {message}")]
    #[diagnostic(
        code(ankh::graph::term),
        help("IRIs must be absolute; check the subject, predicate, and object values.")
    )]
    Term { message: String },
}

// ---------------------------------------------------------------------------
// Repair errors
// ---------------------------------------------------------------------------

/// Errors from the execution-guided repair loop.
#[derive(Debug, Error, Diagnostic)]
pub enum RepairError {
    #[error(
        "no executable query after {} repair attempts for question: \"{question}\"",
        attempts.len().saturating_sub(1)
    )]
    #[diagnostic(
        code(ankh::repair::unresolved),
        help(
            "Every candidate query failed to execute. Increase [pipeline] max_retries, \
             rephrase the question, or inspect the attempt history for the backend \
             diagnostics that drove each repair round."
        )
    )]
    Unresolved {
        question: String,
        attempts: Vec<RepairAttempt>,
    },
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Errors from pipeline orchestration, outside any single subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("question text is empty")]
    #[diagnostic(
        code(ankh::pipeline::empty_question),
        help("Provide a non-empty natural-language question.")
    )]
    EmptyQuestion,

    #[error("deadline of {secs}s exceeded before the request completed")]
    #[diagnostic(
        code(ankh::pipeline::deadline),
        help("Raise [pipeline] deadline_secs, or leave it unset for no overall deadline.")
    )]
    DeadlineExceeded { secs: u64 },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors from loading or saving the TOML configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(ankh::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(ankh::config::parse),
        help("Check the TOML syntax; `ankh config show` prints the effective configuration.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(ankh::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot determine home directory")]
    #[diagnostic(
        code(ankh::config::no_home),
        help("Set the HOME environment variable or pass --config explicitly.")
    )]
    NoHome,

    #[error("environment variable \"{env}\" named in the config is not set")]
    #[diagnostic(
        code(ankh::config::missing_env),
        help("Export the variable before running, or remove it from the config.")
    )]
    MissingEnv { env: String },
}

// ---------------------------------------------------------------------------
// Eval errors
// ---------------------------------------------------------------------------

/// Errors from the offline evaluation runner.
#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("failed to read dataset: {path}")]
    #[diagnostic(
        code(ankh::eval::read),
        help("Ensure the dataset file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset: {path}")]
    #[diagnostic(
        code(ankh::eval::parse),
        help(
            "The dataset must be a JSON array of labeled examples with at least \
             `question` and `sparql` fields."
        )
    )]
    Parse { path: String, message: String },

    #[error("failed to write report: {path}")]
    #[diagnostic(
        code(ankh::eval::write),
        help("Ensure you have write permissions for the output path.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type AnkhResult<T> = std::result::Result<T, AnkhError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_error_converts_to_top_level() {
        let err = ExecError::Query {
            message: "MALFORMED QUERY".into(),
        };
        let ankh: AnkhError = err.into();
        assert!(matches!(ankh, AnkhError::Exec(ExecError::Query { .. })));
    }

    #[test]
    fn query_error_carries_backend_diagnostic() {
        let err = ExecError::Query {
            message: "Lexical error at line 1".into(),
        };
        assert!(err.to_string().contains("Lexical error at line 1"));
    }

    #[test]
    fn timeout_message_names_the_budget() {
        let err = ExecError::Timeout { seconds: 30 };
        assert_eq!(err.to_string(), "query timed out after 30 seconds");
    }

    #[test]
    fn pipeline_error_converts_to_top_level() {
        let ankh: AnkhError = PipelineError::EmptyQuestion.into();
        assert!(matches!(
            ankh,
            AnkhError::Pipeline(PipelineError::EmptyQuestion)
        ));
    }
}
