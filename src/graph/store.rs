//! Embedded oxigraph store executor.
//!
//! Runs queries in-process against an oxigraph [`Store`], either purely in
//! memory or persisted at a path. The in-memory form is what the test suite
//! and local experiments seed with the insert helpers.

use std::path::Path;

use oxigraph::model::{GraphNameRef, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::ExecError;

use super::{GraphValue, QueryExecutor, ResultSet};

/// In-process SPARQL store.
pub struct EmbeddedStore {
    store: Store,
}

impl EmbeddedStore {
    /// Create a new in-memory store (no persistence).
    pub fn in_memory() -> Result<Self, ExecError> {
        let store = Store::new().map_err(|e| ExecError::Connection {
            message: format!("failed to create store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Open or create a persistent store at the given path.
    pub fn open(path: &Path) -> Result<Self, ExecError> {
        std::fs::create_dir_all(path).map_err(|e| ExecError::Connection {
            message: format!("failed to create store directory: {e}"),
        })?;
        let store = Store::open(path).map_err(|e| ExecError::Connection {
            message: format!("failed to open store at {}: {e}", path.display()),
        })?;
        Ok(Self { store })
    }

    fn iri(value: &str) -> Result<NamedNode, ExecError> {
        NamedNode::new(value).map_err(|e| ExecError::Term {
            message: format!("{value}: {e}"),
        })
    }

    /// Insert a triple whose object is a resource.
    pub fn insert_resource(&self, subject: &str, predicate: &str, object: &str) -> Result<(), ExecError> {
        let quad = Quad::new(
            Self::iri(subject)?,
            Self::iri(predicate)?,
            Self::iri(object)?,
            GraphNameRef::DefaultGraph,
        );
        self.store.insert(&quad).map_err(|e| ExecError::Connection {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    /// Insert a triple whose object is a plain literal.
    pub fn insert_literal(&self, subject: &str, predicate: &str, object: &str) -> Result<(), ExecError> {
        let quad = Quad::new(
            Self::iri(subject)?,
            Self::iri(predicate)?,
            Literal::new_simple_literal(object),
            GraphNameRef::DefaultGraph,
        );
        self.store.insert(&quad).map_err(|e| ExecError::Connection {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    /// Number of triples in the default graph.
    pub fn len(&self) -> Result<usize, ExecError> {
        self.store.len().map_err(|e| ExecError::Connection {
            message: format!("len failed: {e}"),
        })
    }

    pub fn is_empty(&self) -> Result<bool, ExecError> {
        self.len().map(|n| n == 0)
    }

    /// Internal store reference, for advanced oxigraph operations.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

fn value_from_term(term: &Term) -> GraphValue {
    match term {
        Term::NamedNode(n) => GraphValue::Resource(n.as_str().to_string()),
        Term::BlankNode(b) => GraphValue::Blank(b.as_str().to_string()),
        Term::Literal(l) => GraphValue::Literal(l.value().to_string()),
        other => GraphValue::Literal(other.to_string()),
    }
}

impl QueryExecutor for EmbeddedStore {
    fn execute(&self, sparql: &str) -> Result<ResultSet, ExecError> {
        let results = self.store.query(sparql).map_err(|e| ExecError::Query {
            message: e.to_string(),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| ExecError::Query {
                        message: format!("solution error: {e}"),
                    })?;
                    let mut row = Vec::new();
                    for (_var, term) in solution.iter() {
                        row.push(value_from_term(term));
                    }
                    rows.push(row);
                }
                Ok(ResultSet::new(rows))
            }
            QueryResults::Boolean(b) => Ok(ResultSet::from_bool(b)),
            QueryResults::Graph(_) => Err(ExecError::Decode {
                message: "CONSTRUCT/DESCRIBE results are not supported".into(),
            }),
        }
    }
}

impl std::fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EX: &str = "https://example.org/";

    fn seeded() -> EmbeddedStore {
        let store = EmbeddedStore::in_memory().unwrap();
        store
            .insert_resource(
                &format!("{EX}le-havre"),
                &format!("{EX}director"),
                &format!("{EX}kaurismaki"),
            )
            .unwrap();
        store
            .insert_literal(
                &format!("{EX}kaurismaki"),
                "http://www.w3.org/2000/01/rdf-schema#label",
                "Aki Kaurismäki",
            )
            .unwrap();
        store
    }

    #[test]
    fn select_returns_rows() {
        let store = seeded();
        let rows = store
            .execute(&format!(
                "SELECT ?name WHERE {{ <{EX}le-havre> <{EX}director> ?d . \
                 ?d <http://www.w3.org/2000/01/rdf-schema#label> ?name }}"
            ))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows.rows()[0],
            vec![GraphValue::Literal("Aki Kaurismäki".into())]
        );
    }

    #[test]
    fn select_without_matches_is_empty_not_error() {
        let store = seeded();
        let rows = store
            .execute(&format!("SELECT ?x WHERE {{ ?x <{EX}missing> ?y }}"))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn ask_normalizes_both_ways() {
        let store = seeded();
        let yes = store
            .execute(&format!("ASK {{ <{EX}le-havre> <{EX}director> ?d }}"))
            .unwrap();
        assert_eq!(yes.rows()[0], vec![GraphValue::Boolean(true)]);

        let no = store
            .execute(&format!("ASK {{ <{EX}le-havre> <{EX}composer> ?d }}"))
            .unwrap();
        assert_eq!(no.rows()[0], vec![GraphValue::Boolean(false)]);
        assert_eq!(no.len(), 1);
    }

    #[test]
    fn malformed_query_is_query_error() {
        let store = seeded();
        let err = store.execute("SELEKT ?x WHERE { ?x ?y ?z }").unwrap_err();
        assert!(matches!(err, ExecError::Query { .. }));
    }

    #[test]
    fn resources_come_back_as_resources() {
        let store = seeded();
        let rows = store
            .execute(&format!(
                "SELECT ?d WHERE {{ <{EX}le-havre> <{EX}director> ?d }}"
            ))
            .unwrap();
        assert_eq!(
            rows.rows()[0],
            vec![GraphValue::Resource(format!("{EX}kaurismaki"))]
        );
    }

    #[test]
    fn invalid_iri_is_term_error() {
        let store = EmbeddedStore::in_memory().unwrap();
        let err = store
            .insert_resource("not an iri", "https://example.org/p", "https://example.org/o")
            .unwrap_err();
        assert!(matches!(err, ExecError::Term { .. }));
    }
}
