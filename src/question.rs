//! Request-scoped data model: the question and the artifacts derived from it.
//!
//! A `Question` flows into query synthesis, a `Query` flows through the repair
//! loop, and an `Answer` comes out the far end. Queries are opaque here: they
//! are produced and replaced whole, never edited in place.

use std::fmt;

/// A natural-language question, optionally annotated with topic entities.
///
/// Entity labels are bracket-marked in the prompt text so the model can anchor
/// on them; entity identifiers (e.g. WikiData Q-ids) are passed alongside when
/// known so the model does not have to guess IRIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    entities: Vec<String>,
    entity_ids: Vec<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            entity_ids: Vec::new(),
        }
    }

    /// Attach topic entity labels (surface forms appearing in the text).
    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach graph identifiers for the topic entities, in the same order.
    pub fn with_entity_ids(mut self, entity_ids: Vec<String>) -> Self {
        self.entity_ids = entity_ids;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn entity_ids(&self) -> &[String] {
        &self.entity_ids
    }

    /// True when the question carries no usable text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// The question text with each topic entity bracket-marked.
    ///
    /// The first occurrence of each entity label is wrapped in `[...]`; labels
    /// that are already marked (dataset questions come pre-marked) or that do
    /// not appear in the text are left alone.
    pub fn prompt_text(&self) -> String {
        let mut marked = self.text.clone();
        for entity in &self.entities {
            if entity.is_empty() || marked.contains(&format!("[{entity}]")) {
                continue;
            }
            if let Some(pos) = marked.find(entity.as_str()) {
                marked.replace_range(pos..pos + entity.len(), &format!("[{entity}]"));
            }
        }
        marked
    }

    /// Label-to-identifier pairs for the prompt, when identifiers are known.
    pub fn entity_hints(&self) -> Option<String> {
        if self.entity_ids.is_empty() {
            return None;
        }
        let pairs: Vec<String> = if self.entities.len() == self.entity_ids.len() {
            self.entities
                .iter()
                .zip(&self.entity_ids)
                .map(|(label, id)| format!("{label} = {id}"))
                .collect()
        } else {
            self.entity_ids.clone()
        };
        Some(pairs.join(", "))
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A SPARQL query as generated text.
///
/// No validation happens here: whether the text is executable is decided by
/// the graph backend, and the repair loop reacts to its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// A natural-language answer grounded in query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer(String);

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
