//! Wiring shared by the `ragbot-processor` and `ragbot` binaries.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ragbot_core::config::{AppConfig, Config};
use ragbot_core::traits::{Embedder, VectorStore};
use ragbot_embed::get_default_embedder;
use ragbot_vector::{open_store, IngestReport};

/// `RUST_LOG` wins; otherwise `info` for everything.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Read `.env`, then the layered configuration.
pub fn load_settings() -> anyhow::Result<AppConfig> {
    dotenv::dotenv().ok();
    Config::load().and_then(|config| config.settings()).context("loading configuration")
}

/// Point both the Pinecone index and the LanceDB table at `name`.
pub fn override_index(settings: &mut AppConfig, name: Option<&str>) {
    if let Some(name) = name {
        settings.pinecone.index_name = name.to_string();
        settings.store.table_name = name.to_string();
    }
}

pub async fn open_backends(settings: &AppConfig) -> anyhow::Result<(Arc<dyn Embedder>, Arc<dyn VectorStore>)> {
    let embedder = get_default_embedder(settings).context("creating embedder")?;
    let store = open_store(settings, embedder.dim()).await.context("opening vector store")?;
    Ok((embedder, store))
}

/// Turn a report with failed documents or vectors into an error so the
/// process exits non-zero.
pub fn ensure_ingest_succeeded(report: &IngestReport) -> anyhow::Result<()> {
    if !report.is_success() {
        anyhow::bail!(
            "ingestion finished with {} failed documents and {} failed vectors",
            report.failures.len(),
            report.vectors_failed
        );
    }
    Ok(())
}

/// First `limit` chars of `text`, with `...` when cut.
pub fn preview(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    if text.chars().count() > limit { out.push_str("..."); }
    out
}
