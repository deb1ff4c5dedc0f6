use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use ragbot_core::config::ChatConfig;
use ragbot_core::traits::{with_timeout, Completer};
use ragbot_core::types::{ChatMessage, RetrievedResult};
use ragbot_core::Result;

use crate::retriever::Retriever;

pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant documents to answer your question. Please try rephrasing or asking about a different topic.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub score: f32,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub context_used: String,
}

/// Retrieval-augmented question answering: retrieve, build a prompt, complete.
pub struct RagChatbot {
    retriever: Retriever,
    completer: Arc<dyn Completer>,
    system_prompt: String,
    max_context_chunks: usize,
    timeout: Duration,
}

impl RagChatbot {
    pub fn new(retriever: Retriever, completer: Arc<dyn Completer>, cfg: &ChatConfig) -> Self {
        Self {
            retriever,
            completer,
            system_prompt: cfg.system_prompt.clone(),
            max_context_chunks: cfg.max_context_chunks,
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    pub async fn chat(&self, query: &str) -> Result<ChatResponse> {
        info!("Processing query: {}", query);
        let results = self.retriever.retrieve(query, Some(self.max_context_chunks), None).await?;
        if results.is_empty() {
            warn!("No relevant documents for query");
            return Ok(ChatResponse {
                query: query.to_string(),
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
                context_used: String::new(),
            });
        }

        let context = build_context(&results);
        let messages = vec![ChatMessage::system(self.system_prompt.clone()), ChatMessage::user(user_message(&context, query))];
        let answer = with_timeout(self.completer.model(), self.timeout, self.completer.complete(&messages)).await?;
        info!("Generated answer from {} context documents", results.len());

        let sources = results
            .iter()
            .map(|r| SourceRef { source: r.chunk.source_document_path.clone(), score: r.similarity_score, chunk_index: r.chunk.index })
            .collect();
        Ok(ChatResponse { query: query.to_string(), answer, sources, context_used: context })
    }
}

pub fn build_context(results: &[RetrievedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!("Document {} (Score: {:.3}, Source: {}):\n{}", i + 1, r.similarity_score, r.chunk.source_document_path, r.chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn user_message(context: &str, query: &str) -> String {
    format!("Context documents:\n{}\n\n---\n\nQuestion: {}\n\nPlease answer based on the context provided above.", context, query)
}
