//! Single-shot answering and the chunked-or-direct entry point.
//!
//! [`answer`] is what front ends call: it tries the chunked coordinator
//! first and, on hand-off, renders every item into one prompt and issues a
//! single responder call.

use tracing::{debug, info};

use crate::coordinator::{self, RunOptions};
use crate::error::RelayError;
use crate::models::{Answer, DirectAnswer, RetrievableItem};
use crate::plan::Chunk;
use crate::profile::profile_for;
use crate::prompts;
use crate::render::render;
use crate::responder::{Responder, ResponderRequest};

/// Answer `query` over `items`, chunking only when the items exceed the
/// model's budget.
pub async fn answer<R>(
    query: &str,
    items: &[RetrievableItem],
    model_name: &str,
    responder: &R,
    options: &RunOptions,
) -> Result<Answer, RelayError>
where
    R: Responder + ?Sized,
{
    match coordinator::run(query, items, model_name, responder, options).await? {
        Some(chunked) => Ok(Answer::Chunked(chunked)),
        None => answer_direct(query, items, model_name, responder, options)
            .await
            .map(Answer::Direct),
    }
}

/// One responder call over all items, without budget checks.
pub async fn answer_direct<R>(
    query: &str,
    items: &[RetrievableItem],
    model_name: &str,
    responder: &R,
    options: &RunOptions,
) -> Result<DirectAnswer, RelayError>
where
    R: Responder + ?Sized,
{
    if options.cancel.is_cancelled() {
        return Err(RelayError::Cancelled {
            completed: 0,
            total: 1,
        });
    }

    let (prompt, sources) = match Chunk::whole(items.iter().collect()) {
        Some(chunk) => {
            let rendered = render(&chunk, profile_for(model_name));
            debug!(
                items = chunk.len(),
                rendered = rendered.prompt_text.len(),
                "rendered single-shot context"
            );
            (
                prompts::rag_prompt(&rendered.prompt_text, query),
                rendered.sources,
            )
        }
        None => (prompts::no_context_prompt(query), Vec::new()),
    };

    let request = ResponderRequest {
        prompt,
        model_name: model_name.to_string(),
        system_prompt: prompts::RAG_SYSTEM_PROMPT.to_string(),
        enable_reasoning: options.enable_reasoning,
    };
    let reply = responder
        .respond(&request, &options.cancel)
        .await
        .map_err(|source| {
            if options.cancel.is_cancelled() {
                RelayError::Cancelled {
                    completed: 0,
                    total: 1,
                }
            } else {
                RelayError::Direct { source }
            }
        })?;
    info!(items = items.len(), responder = responder.name(), "single-shot answer");

    Ok(DirectAnswer {
        content: reply.content,
        reasoning: reply.reasoning,
        has_reasoning: reply.has_reasoning,
        sources_used: sources,
    })
}
