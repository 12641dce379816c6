//! Query synthesis: the first SPARQL candidate for a question.
//!
//! One completion call with the generation template as the system message and
//! the bracket-marked question as the user message, under deterministic
//! decoding. The generated text is returned as-is: whether it is executable
//! is the repair loop's business, not ours.

use tracing::debug;

use crate::error::{AnkhResult, PipelineError};
use crate::llm::{ChatMessage, CompletionClient, Decoding, ModelRef};
use crate::prompt::PromptSet;
use crate::question::{Query, Question};

/// Generate the initial query candidate for a question.
///
/// Fails fast on an empty question; otherwise any error is the completion
/// backend's.
pub fn synthesize_query(
    client: &dyn CompletionClient,
    prompts: &PromptSet,
    question: &Question,
    model: &ModelRef,
) -> AnkhResult<Query> {
    if question.is_empty() {
        return Err(PipelineError::EmptyQuestion.into());
    }

    let mut user = question.prompt_text();
    if let Some(hints) = question.entity_hints() {
        user.push_str("\nEntity identifiers: ");
        user.push_str(&hints);
    }

    let messages = [
        ChatMessage::system(prompts.generation.clone()),
        ChatMessage::user(user),
    ];
    let text = client.complete(&messages, model, Decoding::DETERMINISTIC)?;
    debug!(model = %model, chars = text.len(), "synthesized query candidate");
    Ok(Query::new(text))
}
