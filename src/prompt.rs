//! Instruction templates for query generation, repair, and answer synthesis.
//!
//! The built-in templates encode the grounding policy the whole system rests
//! on: queries use only the `wd:` / `rdfs:` prefixes (never `wdt:`), topic
//! entities arrive bracket-marked, and answers must come from the query
//! results alone, with "don't know" for missing information and a plain "No"
//! for yes/no questions with empty results. All three templates can be
//! overridden from the `[prompts]` config section.

use crate::question::Query;

/// Placeholder in the answer template replaced by the final query text.
pub const QUERY_PLACEHOLDER: &str = "{{query}}";

/// Placeholder in the answer template replaced by the rendered result set.
pub const CONTEXT_PLACEHOLDER: &str = "{{context}}";

const DEFAULT_GENERATION: &str = "\
You are a SPARQL assistant. Review the question and generate a SPARQL query that answers it.
The knowledge graph uses the WikiData vocabulary. [text] marks a topic entity in the question.
Only use these two prefixes if needed: PREFIX wd: <https://www.wikidata.org/entity/> and PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>.
Do not use wdt: syntax.
Return only the SPARQL query, with no explanation.";

const DEFAULT_REPAIR: &str = "\
You are a SPARQL assistant. A SPARQL query generated to answer a question failed to execute.
Give a corrected version of the query based on the previous query, the question, and the error message.
Return only the corrected SPARQL query, with no explanation.";

const DEFAULT_ANSWER: &str = "\
Generate a natural language response from the results of a SPARQL query.
Do not use any internal knowledge to answer the question; just say you don't know if no information is available from the results of the SPARQL query.
If the question is a yes/no question and there is no information available, answer No.
SPARQL query: {{query}}
The results of the SPARQL query: {{context}}";

/// The three instruction templates used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System message for initial query synthesis.
    pub generation: String,
    /// System message for repair rounds.
    pub repair: String,
    /// Answer-synthesis template with [`QUERY_PLACEHOLDER`] and
    /// [`CONTEXT_PLACEHOLDER`].
    pub answer: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            generation: DEFAULT_GENERATION.into(),
            repair: DEFAULT_REPAIR.into(),
            answer: DEFAULT_ANSWER.into(),
        }
    }
}

impl PromptSet {
    /// The answer template with query text and rendered results substituted.
    pub fn answer_instruction(&self, query: &Query, context: &str) -> String {
        self.answer
            .replace(QUERY_PLACEHOLDER, query.as_str())
            .replace(CONTEXT_PLACEHOLDER, context)
    }
}
