// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # per-ankh
//!
//! Question answering over knowledge graphs: a natural-language question is
//! turned into a SPARQL query by a language model, executed against a graph,
//! repaired on failure with the execution error fed back to the model, and
//! finally rendered as a prose answer grounded in the query results.
//!
//! ## Architecture
//!
//! - **Pipeline** (`pipeline`): question in, grounded answer out
//! - **Repair loop** (`repair`): bounded retry with error feedback
//! - **Graph access** (`graph`): embedded store or remote SPARQL endpoint
//! - **Completion backend** (`llm`): OpenAI-compatible chat completions
//! - **Verification** (`verify`, `eval`): result-set equivalence and metrics
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use per_ankh::graph::{EmbeddedStore, GraphValue};
//! use per_ankh::llm::{HttpCompletionClient, LlmConfig};
//! use per_ankh::pipeline::Pipeline;
//! use per_ankh::question::Question;
//!
//! let store = Arc::new(EmbeddedStore::in_memory().unwrap());
//! let client = Arc::new(HttpCompletionClient::new(LlmConfig::default()).unwrap());
//! let pipeline = Pipeline::new(store, client);
//!
//! let question = Question::new("Who directed Le Havre?")
//!     .with_entities(vec!["Le Havre".into()]);
//! let grounded = pipeline.answer_question(&question).unwrap();
//! println!("{}", grounded.answer);
//! ```

pub mod answer;
pub mod config;
pub mod error;
pub mod eval;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod question;
pub mod repair;
pub mod synthesize;
pub mod verify;
