//! Offline result verification: set-based equivalence of query results.
//!
//! Two queries are judged by what they return, not how they are written:
//! their result sets are compared as sets of rows, so row order and
//! duplicates are ignored while value order within a row still matters.
//! ASK queries take part through the boolean-row normalization, so a
//! generated ASK can be verified against a reference ASK like any SELECT.

use tracing::debug;

use crate::error::ExecError;
use crate::graph::{QueryExecutor, ResultSet};
use crate::repair::ErrorDetail;

/// Order- and duplicate-insensitive equality of two result sets.
pub fn equivalent(a: &ResultSet, b: &ResultSet) -> bool {
    a.row_set() == b.row_set()
}

/// Outcome of comparing a generated query against a reference query.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Whether the generated query reproduced the reference rows.
    pub equivalent: bool,
    /// Rows from the generated query, when it executed.
    pub generated: Option<ResultSet>,
    /// Rows from the reference query.
    pub reference: ResultSet,
    /// Diagnostic when the generated query failed.
    pub generated_error: Option<ErrorDetail>,
}

/// Executes query pairs on one backend and compares their results.
pub struct Verifier<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> Verifier<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Compare a generated query against a reference query.
    ///
    /// The reference must execute; its failure makes the pair unjudgeable
    /// and propagates. A failing generated query is not an error here: it
    /// yields a non-equivalent verdict carrying the diagnostic.
    pub fn compare(&self, generated: &str, reference: &str) -> Result<Verdict, ExecError> {
        let reference_rows = self.executor.execute(reference)?;
        match self.executor.execute(generated) {
            Ok(rows) => {
                let same = equivalent(&rows, &reference_rows);
                debug!(
                    equivalent = same,
                    generated_rows = rows.len(),
                    reference_rows = reference_rows.len(),
                    "compared result sets"
                );
                Ok(Verdict {
                    equivalent: same,
                    generated: Some(rows),
                    reference: reference_rows,
                    generated_error: None,
                })
            }
            Err(e) => Ok(Verdict {
                equivalent: false,
                generated: None,
                reference: reference_rows,
                generated_error: Some(ErrorDetail::from(&e)),
            }),
        }
    }
}
