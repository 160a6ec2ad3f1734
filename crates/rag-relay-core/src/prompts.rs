//! Prompt templates for chunk, synthesis, and single-shot calls.

use crate::models::PartialAnswer;

pub const CHUNK_SYSTEM_PROMPT: &str = "You are a RAG-based AI assistant. Provide a partial answer \
using only the chunk data you are given; partial results from other chunks will be merged later.";

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert at synthesizing multiple partial \
answers into one complete, coherent final answer.";

pub const RAG_SYSTEM_PROMPT: &str = "You are a RAG (Retrieval-Augmented Generation) AI assistant. \
Give accurate, useful answers based on the provided context.";

/// Prompt for one chunk (`index` is 1-based).
pub fn chunk_prompt(index: usize, total: usize, context: &str, query: &str) -> String {
    format!(
        "\nThe following is part of the full data (chunk {index}/{total}):\n\n\
         {context}\n\n\
         Question: {query}\n\n\
         Answer based only on the data in this chunk. \
         Your answer will be combined with the results of the other chunks later.\n"
    )
}

/// Prompt merging every chunk's answer into a final one.
pub fn synthesis_prompt(query: &str, partials: &[PartialAnswer]) -> String {
    let mut prompt = format!(
        "\nThe following are partial answers to the same question, \
         each obtained from a different chunk of data:\n\n\
         Question: {query}\n\n\
         Answers by chunk:\n"
    );

    for partial in partials {
        prompt.push_str(&format!(
            "\n--- Chunk {} answer ---\n{}\n",
            partial.chunk_index, partial.rendered_text
        ));
    }

    prompt.push_str(
        "\nCombine all of the chunk answers above into one complete and consistent final answer:\n\
         1. Merge duplicated information\n\
         2. Include every perspective where the chunks differ\n\
         3. Present overall insights and a conclusion\n\
         4. Organize the chunk-level details systematically\n",
    );
    prompt
}

/// Single-shot prompt over the full rendered context.
pub fn rag_prompt(context: &str, query: &str) -> String {
    format!(
        "\nThe following context was collected to answer the question:\n\n\
         {context}\n\n\
         Question: {query}\n\n\
         Answer the question in detail and accurately based on the context above.\n\
         - Do not guess at information that is not in the context\n\
         - Include concrete figures or examples where relevant data exists\n\
         - Name the sources your answer is based on\n"
    )
}

/// Single-shot prompt when no context was retrieved at all.
pub fn no_context_prompt(query: &str) -> String {
    format!(
        "Question: {query}\n\n\
         No context information is available. Answer from general knowledge."
    )
}
