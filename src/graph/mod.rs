//! Graph values, result sets, and the query-executor boundary.
//!
//! Everything downstream of query execution (repair, answer grounding, the
//! verifier) works on one normalized shape: a [`ResultSet`] of fixed-arity
//! rows of [`GraphValue`]s. ASK results are folded into that shape at this
//! boundary as a single one-column boolean row, so no caller ever branches
//! on query form.
//!
//! Two executors implement [`QueryExecutor`]:
//!
//! - [`SparqlEndpoint`]: a remote SPARQL 1.1 protocol endpoint over HTTP
//! - [`EmbeddedStore`]: an in-process oxigraph store

pub mod endpoint;
pub mod store;

use std::collections::HashSet;
use std::fmt;

pub use endpoint::{EndpointConfig, SparqlEndpoint};
pub use store::EmbeddedStore;

use crate::error::ExecError;

/// A single cell of a result row.
///
/// Equality and hashing are derived, so rows can be collected into sets for
/// order-insensitive comparison. Literals compare by lexical form; language
/// tags and datatypes are not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphValue {
    /// An IRI-identified resource.
    Resource(String),
    /// A literal's lexical form.
    Literal(String),
    /// A blank node label (scoped to one execution, rendered anonymously).
    Blank(String),
    /// The result of an ASK query, normalized into a row.
    Boolean(bool),
}

impl GraphValue {
    /// Render the value the way it is shown to the answer model.
    pub fn render(&self) -> String {
        match self {
            GraphValue::Resource(iri) => format!("Resource ({iri})"),
            GraphValue::Literal(lexical) => format!("Value: {lexical}"),
            GraphValue::Blank(_) => "Unnamed Entity (Blank Node)".to_string(),
            GraphValue::Boolean(b) => b.to_string(),
        }
    }
}

impl fmt::Display for GraphValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// One result row: the bound values of a solution, in projection order.
pub type Row = Vec<GraphValue>;

/// The normalized outcome of a successful query execution.
///
/// May be empty; emptiness is not an error anywhere in the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize an ASK verdict into a single-row result set.
    pub fn from_bool(value: bool) -> Self {
        Self {
            rows: vec![vec![GraphValue::Boolean(value)]],
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows as a set, for order- and duplicate-insensitive comparison.
    pub fn row_set(&self) -> HashSet<&Row> {
        self.rows.iter().collect()
    }

    /// Render the whole set as answer-grounding context.
    ///
    /// Values within a row are joined with `" - "`, rows are separated by a
    /// blank line. An empty set renders as the empty string, which the answer
    /// template's don't-know policy is written against.
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(GraphValue::render)
                    .collect::<Vec<_>>()
                    .join(" - ")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl FromIterator<Row> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// The execution boundary the pipeline and verifier depend on.
///
/// Implementations submit a SPARQL query and either return the normalized
/// rows or an [`ExecError`] whose rendered message is fit to show a model.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, sparql: &str) -> Result<ResultSet, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_renders_with_iri() {
        let v = GraphValue::Resource("https://www.wikidata.org/entity/Q646458".into());
        assert_eq!(
            v.render(),
            "Resource (https://www.wikidata.org/entity/Q646458)"
        );
    }

    #[test]
    fn literal_renders_lexical_form() {
        assert_eq!(GraphValue::Literal("Le Havre".into()).render(), "Value: Le Havre");
    }

    #[test]
    fn blank_renders_anonymously() {
        assert_eq!(
            GraphValue::Blank("b0".into()).render(),
            "Unnamed Entity (Blank Node)"
        );
    }

    #[test]
    fn rows_join_with_separator() {
        let set = ResultSet::new(vec![
            vec![
                GraphValue::Literal("Le Havre".into()),
                GraphValue::Resource("https://example.org/le-havre".into()),
            ],
            vec![GraphValue::Literal("Drifting Clouds".into())],
        ]);
        assert_eq!(
            set.render(),
            "Value: Le Havre - Resource (https://example.org/le-havre)\n\nValue: Drifting Clouds"
        );
    }

    #[test]
    fn empty_set_renders_empty_string() {
        assert_eq!(ResultSet::empty().render(), "");
        assert!(ResultSet::empty().is_empty());
    }

    #[test]
    fn ask_normalizes_to_single_row() {
        let set = ResultSet::from_bool(true);
        assert_eq!(set.len(), 1);
        assert_eq!(set.rows()[0], vec![GraphValue::Boolean(true)]);
        assert_eq!(set.render(), "true");
    }

    #[test]
    fn row_set_ignores_order_and_duplicates() {
        let a = ResultSet::new(vec![
            vec![GraphValue::Literal("x".into())],
            vec![GraphValue::Literal("y".into())],
            vec![GraphValue::Literal("x".into())],
        ]);
        let b = ResultSet::new(vec![
            vec![GraphValue::Literal("y".into())],
            vec![GraphValue::Literal("x".into())],
        ]);
        assert_eq!(a.row_set(), b.row_set());
    }
}
