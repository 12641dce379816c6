//! Labeled evaluation datasets.
//!
//! A dataset is a JSON array of examples, each carrying a question, its
//! reference query, and optionally a pre-generated candidate query recorded
//! by an earlier run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::question::Question;

/// One labeled example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledExample {
    pub question: String,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
    /// Expected natural-language answer. Carried through for inspection,
    /// never scored.
    #[serde(default)]
    pub answer: Option<serde_json::Value>,
    /// Reference query that defines the correct result set.
    pub sparql: String,
    /// Pre-generated candidate, under either historical field name.
    #[serde(default, alias = "generated_sparql")]
    pub sparql_response: Option<String>,
}

impl LabeledExample {
    pub fn to_question(&self) -> Question {
        Question::new(&self.question)
            .with_entities(self.entities.clone())
            .with_entity_ids(self.entity_ids.clone())
    }

    pub fn question_type(&self) -> &str {
        self.question_type.as_deref().unwrap_or("unknown")
    }
}

/// Read a JSON dataset file.
pub fn load_dataset(path: &Path) -> Result<Vec<LabeledExample>, EvalError> {
    let text = fs::read_to_string(path).map_err(|source| EvalError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| EvalError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_example() {
        let json = r#"[{"question": "Who directed Le Havre?", "sparql": "SELECT ?d WHERE { ?f <d> ?d }"}]"#;
        let examples: Vec<LabeledExample> = serde_json::from_str(json).unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].question_type(), "unknown");
        assert!(examples[0].sparql_response.is_none());
        assert!(examples[0].entities.is_empty());
    }

    #[test]
    fn accepts_generated_sparql_alias() {
        let json = r#"[{"question": "q", "sparql": "s", "generated_sparql": "g"}]"#;
        let examples: Vec<LabeledExample> = serde_json::from_str(json).unwrap();
        assert_eq!(examples[0].sparql_response.as_deref(), Some("g"));
    }

    #[test]
    fn question_carries_entities_and_ids() {
        let json = r#"[{
            "question": "Who directed Le Havre?",
            "question_type": "simple",
            "entities": ["Le Havre"],
            "entity_ids": ["Q270510"],
            "sparql": "s"
        }]"#;
        let examples: Vec<LabeledExample> = serde_json::from_str(json).unwrap();
        let question = examples[0].to_question();
        assert_eq!(question.prompt_text(), "Who directed [Le Havre]?");
        assert_eq!(question.entity_hints().as_deref(), Some("Le Havre = Q270510"));
    }

    #[test]
    fn missing_reference_query_is_a_parse_error() {
        let json = r#"[{"question": "q"}]"#;
        assert!(serde_json::from_str::<Vec<LabeledExample>>(json).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_dataset(Path::new("/nonexistent/dataset.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dataset.json"));
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(
            &path,
            r#"[{"question": "q", "question_type": "yes_no", "sparql": "ASK { ?s ?p ?o }", "sparql_response": "ASK { ?s ?p ?o }"}]"#,
        )
        .unwrap();

        let examples = load_dataset(&path).unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].question_type(), "yes_no");
    }
}
