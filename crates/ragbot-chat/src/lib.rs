//! Query path: retrieval over the vector store and answer generation.

pub mod chatbot;
pub mod completer;
pub mod retriever;

use std::sync::Arc;

use ragbot_core::config::AppConfig;
use ragbot_core::traits::{Embedder, VectorStore};
use ragbot_core::Result;
use ragbot_embed::OpenAiClient;

pub use chatbot::{build_context, ChatResponse, RagChatbot, SourceRef, NO_RESULTS_ANSWER};
pub use completer::OpenAiCompleter;
pub use retriever::Retriever;

/// Wire a chatbot answering with the configured OpenAI chat model.
pub fn build_chatbot(settings: &AppConfig, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Result<RagChatbot> {
    let client = OpenAiClient::from_config(&settings.openai)?;
    let completer = Arc::new(OpenAiCompleter::new(client, &settings.chat));
    Ok(RagChatbot::new(Retriever::new(embedder, store, &settings.retrieval), completer, &settings.chat))
}
