//! Embedding providers.
//!
//! `OpenAiEmbedder` calls the hosted embeddings endpoint. `FakeEmbedder` is a
//! deterministic hash-based stand-in selected by `APP_USE_FAKE_EMBEDDINGS=1`
//! or `embedding.provider = "fake"`, for tests and offline development.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ragbot_core::config::{AppConfig, EmbeddingProvider};
use ragbot_core::traits::Embedder;
use ragbot_core::types::EmbeddingVector;
use ragbot_core::{Error, Result, UpstreamKind};

pub use openai::OpenAiClient;

pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dim: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient, model: impl Into<String>, dim: usize) -> Self {
        let model = model.into();
        let id = format!("openai:{}", model);
        Self { client, model, dim, id }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        debug!("embedding {} texts with {}", texts.len(), self.model);
        let resp: EmbeddingResponse = self.client.post_json("embeddings", &EmbeddingRequest { model: &self.model, input: texts }).await?;
        if resp.data.len() != texts.len() {
            return Err(Error::upstream(
                openai::SERVICE,
                UpstreamKind::InvalidResponse,
                format!("expected {} embeddings, got {}", texts.len(), resp.data.len()),
            ));
        }
        let mut data = resp.data;
        data.sort_by_key(|d| d.index);
        let mut out = Vec::with_capacity(data.len());
        for d in data {
            if d.embedding.len() != self.dim {
                return Err(Error::upstream(
                    openai::SERVICE,
                    UpstreamKind::InvalidResponse,
                    format!("embedding dimension {} does not match configured {}", d.embedding.len(), self.dim),
                ));
            }
            out.push(d.embedding);
        }
        Ok(out)
    }
}

/// Deterministic, L2-normalised bag-of-words hashing embedder.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("fake:d{}", dim) } }

    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(settings: &AppConfig) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() || settings.embedding.provider == EmbeddingProvider::Fake {
        info!("Using FakeEmbedder (d{})", settings.embedding.dimension);
        return Ok(Arc::new(FakeEmbedder::new(settings.embedding.dimension)));
    }
    let client = OpenAiClient::from_config(&settings.openai)?;
    info!("Using OpenAI embeddings model {}", settings.embedding.model);
    Ok(Arc::new(OpenAiEmbedder::new(client, settings.embedding.model.clone(), settings.embedding.dimension)))
}
