use tracing::info;

use crate::build_prompt::build_prompt_with_context;
use crate::chat_history::ChatHistory;
use crate::config::Config;
use crate::embed_text::Embedder;
use crate::error::Result;
use crate::generate::{Generator, TokenUsage};
use crate::retrieve_chunks::retrieve_top;
use crate::vector_index::VectorIndex;

/// The reply to one prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct Answer {
    /// Rendered retrieved chunks; empty when nothing was retrieved.
    pub sources: String,
    pub answer: String,
    pub usage: TokenUsage,
}

/// Answer `prompt` from the documents in `namespace`.
///
/// The user message is appended to `history` before anything else and stays
/// there even if a later step fails. The assistant message is appended only
/// on success.
pub fn answer_query(
    cfg: &Config,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    index: &dyn VectorIndex,
    prompt: &str,
    namespace: &str,
    history: &mut ChatHistory,
) -> Result<Answer> {
    history.push_user(prompt);

    let query_vec = embedder.embed(prompt)?;
    let hits = retrieve_top(cfg, index, namespace, &query_vec)?;
    info!(namespace, hits = hits.len(), "retrieved chunks");

    let (messages, context) = build_prompt_with_context(cfg, prompt, &hits);
    let generation = generator.generate(&messages)?;
    info!(
        input_tokens = generation.usage.input_tokens,
        output_tokens = generation.usage.output_tokens,
        "generated answer"
    );

    history.push_assistant(generation.text.clone());
    Ok(Answer { sources: context, answer: generation.text, usage: generation.usage })
}
