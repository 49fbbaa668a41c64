//! Answer construction.
//!
//! Retrieved chunks are joined into a context block and sent to the
//! generation model with a fixed grounding instruction. With no chunks the
//! model is never called and [`REFUSAL`] is returned as-is.

use crate::generation::{GenerationError, GenerationProvider, GenerationRequest};

/// The one refusal sentence. Callers may match on it byte-for-byte, so every
/// path that refuses must return this constant.
pub const REFUSAL: &str = "The information you requested is confidential or privacy restricted. Please reach out to Human Resources directly for assistance.";

/// Separator placed between retrieved chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Message returned instead of an answer when the API key is not set.
pub fn credential_missing_message(env_var: &str) -> String {
    format!(
        "Error: {} not set. Please add it to the environment.",
        env_var
    )
}

/// Grounding rules for the generation model.
pub fn system_instruction() -> String {
    format!(
        "You are an HR assistant. Summarize the provided document context to answer the user's question.

RULES:
1. Use ONLY information from the provided context. Do NOT add, infer, or invent anything.
2. If the context contains accrual rates, hours, amounts, or policy details that relate to the question - you MUST answer using that information. Do NOT use the fallback.
3. If the context uses different terminology (e.g., \"monthly\" vs \"pay period\", \"Vacation\" vs \"PTO\"), present the information from the context. For accrual: if the handbook says \"hours per month\", provide those rates and note that PTO/vacation accrues monthly.
4. ONLY if the context truly has NO relevant information, respond EXACTLY with: \"{}\"
5. Summarize your answer to 2-3 sentences. Be concise but accurate.",
        REFUSAL
    )
}

pub fn build_context(chunks: &[String]) -> String {
    chunks.join(CONTEXT_SEPARATOR)
}

pub fn build_request(question: &str, chunks: &[String], temperature: f32) -> GenerationRequest {
    GenerationRequest {
        system: system_instruction(),
        user: format!(
            "Context from handbook:\n\n{}\n\nQuestion: {}",
            build_context(chunks),
            question
        ),
        temperature,
    }
}

/// Answer `question` from `chunks`, or refuse when there are none.
pub async fn answer(
    generator: &dyn GenerationProvider,
    question: &str,
    chunks: &[String],
    temperature: f32,
) -> Result<String, GenerationError> {
    if chunks.is_empty() {
        return Ok(REFUSAL.to_string());
    }

    let request = build_request(question, chunks, temperature);
    let response = generator.complete(&request).await?;
    Ok(response.trim().to_string())
}
