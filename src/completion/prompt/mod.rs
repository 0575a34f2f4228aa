
use crate::retrieval::RetrievedChunk;

const STORYTELLER_PROMPT: &str = "You are a careful, creative storyteller assistant. \
Use ONLY the provided context when it is relevant. \
If the context is insufficient, ask clarifying questions instead of inventing facts. \
Keep the tone consistent with the user's world and constraints.";

/// System prompt, with an optional caller preamble placed first
#[inline]
pub fn build_system_prompt(preamble: Option<&str>) -> String {
    match preamble.map(str::trim).filter(|p| !p.is_empty()) {
        Some(preamble) => format!("{}\n\n{}", preamble, STORYTELLER_PROMPT),
        None => STORYTELLER_PROMPT.to_string(),
    }
}

/// User prompt with numbered context blocks the model can cite as `[n]`
#[inline]
pub fn build_user_prompt(question: &str, contexts: &[RetrievedChunk]) -> String {
    let mut parts = vec![format!("Question:\n{}", question.trim())];

    if contexts.is_empty() {
        parts.push("\nNo context was retrieved from the knowledge base.".to_string());
    } else {
        parts.push("\nContext (retrieved from the user's world knowledge base):".to_string());
        for (position, context) in contexts.iter().enumerate() {
            parts.push(format!(
                "\n[{}] {}\n{}",
                position + 1,
                context.source_label(),
                context.text.trim()
            ));
        }
    }

    parts.push(
        "\nInstructions: Answer the question. Cite sources like [1], [2] when using facts from context."
            .to_string(),
    );
    parts.join("\n")
}
