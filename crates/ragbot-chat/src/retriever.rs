use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use ragbot_core::config::RetrievalConfig;
use ragbot_core::traits::{with_timeout, Embedder, VectorStore};
use ragbot_core::types::{Meta, RetrievedResult};
use ragbot_core::Result;

/// Embeds a query and asks the store for its nearest chunks.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    default_k: usize,
    timeout: Duration,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, cfg: &RetrievalConfig) -> Self {
        Self { embedder, store, default_k: cfg.top_k, timeout: Duration::from_secs(cfg.timeout_secs) }
    }

    /// Best match first; equal scores keep the store's order.
    pub async fn retrieve(&self, query: &str, k: Option<usize>, filter: Option<&Meta>) -> Result<Vec<RetrievedResult>> {
        let k = k.unwrap_or(self.default_k);
        if k == 0 { return Ok(Vec::new()); }
        let vector = with_timeout(self.embedder.embedder_id(), self.timeout, self.embedder.embed(query)).await?;
        let matches = with_timeout(self.store.name(), self.timeout, self.store.query(&vector, k, filter)).await?;
        let mut results: Vec<RetrievedResult> = matches.into_iter().map(RetrievedResult::from_match).collect();
        results.sort_by(|a, b| b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        debug!("retrieved {} results for {:?}", results.len(), query);
        Ok(results)
    }
}
