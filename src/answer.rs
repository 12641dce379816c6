//! Result-grounded answer synthesis.
//!
//! The final query and its rendered results are substituted into the answer
//! template, which becomes the system message; the question is the user
//! message. The template forbids outside knowledge, so an empty result set
//! is still sent: the model is the one that says "don't know" (or "No" for
//! yes/no questions), not us.

use tracing::debug;

use crate::error::AnkhResult;
use crate::graph::ResultSet;
use crate::llm::{ChatMessage, CompletionClient, Decoding, ModelRef};
use crate::prompt::PromptSet;
use crate::question::{Answer, Query, Question};

/// Phrase an answer to `question` grounded in `rows`.
pub fn synthesize_answer(
    client: &dyn CompletionClient,
    prompts: &PromptSet,
    question: &Question,
    query: &Query,
    rows: &ResultSet,
    model: &ModelRef,
) -> AnkhResult<Answer> {
    let context = rows.render();
    let instruction = prompts.answer_instruction(query, &context);
    let messages = [
        ChatMessage::system(instruction),
        ChatMessage::user(question.prompt_text()),
    ];
    let text = client.complete(&messages, model, Decoding::PROSE)?;
    debug!(model = %model, rows = rows.len(), "synthesized answer");
    Ok(Answer::new(text))
}
