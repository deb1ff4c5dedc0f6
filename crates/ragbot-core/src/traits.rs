use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result, UpstreamKind};
use crate::types::{ChatMessage, EmbeddingVector, Meta, StoreStats, StoredMatch, VectorRecord};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-ada-002`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        match out.pop() {
            Some(v) if out.is_empty() => Ok(v),
            _ => Err(Error::upstream(self.embedder_id(), UpstreamKind::InvalidResponse, "expected exactly one embedding")),
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;
    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;
    /// `k` nearest records to `vector`, best first. `filter` is an equality
    /// match on metadata keys.
    async fn query(&self, vector: &[f32], k: usize, filter: Option<&Meta>) -> Result<Vec<StoredMatch>>;
    async fn delete_by_source(&self, source: &str) -> Result<()>;
    async fn stats(&self) -> Result<StoreStats>;
}

#[async_trait]
pub trait Completer: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Bound an external call by `limit`; elapsing it is an upstream timeout.
pub async fn with_timeout<T, F>(service: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::upstream(service, UpstreamKind::Timeout, format!("no response within {:?}", limit))),
    }
}
