// Completion module
// Chat-style answer generation on top of retrieved context


pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::database::vector::PayloadFilter;
use crate::retrieval::{Citation, Retriever};

pub use openai::OpenAiCompatibleClient;
pub use prompt::{build_system_prompt, build_user_prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One blocking round-trip to a chat model; failures are `ProviderCall` errors
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String>;
}

/// Generated answer plus the citations it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Options for a single question
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub top_k: Option<usize>,
    pub filter: Option<PayloadFilter>,
    pub system_preamble: Option<String>,
    pub temperature: Option<f64>,
}

/// Retrieval followed by completion
pub struct AnswerService {
    retriever: Retriever,
    provider: Arc<dyn CompletionProvider>,
    default_temperature: f64,
    default_preamble: Option<String>,
}

impl AnswerService {
    #[inline]
    pub fn new(
        retriever: Retriever,
        provider: Arc<dyn CompletionProvider>,
        default_temperature: f64,
        default_preamble: Option<String>,
    ) -> Self {
        Self {
            retriever,
            provider,
            default_temperature,
            default_preamble,
        }
    }

    #[inline]
    pub async fn ask(&self, kb_id: &str, question: &str, options: &AskOptions) -> Result<Answer> {
        let contexts = self
            .retriever
            .retrieve_within_budget(kb_id, question, options.top_k, options.filter.as_ref())
            .await?;
        debug!(
            "Answering with {} context chunks from knowledge base {}",
            contexts.len(),
            kb_id
        );

        let preamble = options
            .system_preamble
            .as_deref()
            .or(self.default_preamble.as_deref());
        let messages = vec![
            ChatMessage::system(build_system_prompt(preamble)),
            ChatMessage::user(build_user_prompt(question, &contexts)),
        ];

        let temperature = options.temperature.unwrap_or(self.default_temperature);
        let answer = self.provider.complete(&messages, temperature).await?;
        info!(
            "Generated answer of {} chars for knowledge base {}",
            answer.chars().count(),
            kb_id
        );

        Ok(Answer {
            answer,
            citations: self.retriever.to_citations(&contexts),
        })
    }
}
