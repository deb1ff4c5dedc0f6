//! Ingestion pipeline: Loader → Chunker → Embedder → Vector Store.
//!
//! Documents are processed concurrently, at most `ingest.concurrency` at a
//! time. Local errors (I/O, configuration) abort the run. Upstream failures
//! are counted in the [`IngestReport`] and the run continues with the next
//! document or batch.

use std::future::{self, Future};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};

use ragbot_core::chunker::{Chunker, ChunkingConfig};
use ragbot_core::config::{AppConfig, IngestConfig};
use ragbot_core::loader::{Loader, LoaderConfig};
use ragbot_core::traits::{with_timeout, Embedder, VectorStore};
use ragbot_core::types::{Chunk, Document, VectorRecord};
use ragbot_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub vectors_upserted: usize,
    pub vectors_failed: usize,
    pub skipped_empty: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool { self.failures.is_empty() && self.vectors_failed == 0 }

    fn absorb(&mut self, outcome: DocOutcome) {
        self.documents += 1;
        self.chunks += outcome.chunks;
        self.skipped_empty += outcome.skipped_empty;
        self.vectors_upserted += outcome.upserted;
        self.vectors_failed += outcome.failed;
        if let Some(message) = outcome.error {
            self.failures.push(IngestFailure { path: outcome.path, message });
        }
    }
}

struct DocOutcome {
    path: String,
    chunks: usize,
    skipped_empty: usize,
    upserted: usize,
    failed: usize,
    error: Option<String>,
}

pub struct Ingestor {
    loader: Loader,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    options: IngestConfig,
}

impl Ingestor {
    pub fn new(settings: &AppConfig, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Result<Self> {
        Self::with_options(&settings.loader, settings.chunking.clone(), settings.ingest.clone(), embedder, store)
    }

    /// Fails with a configuration error before touching any file.
    pub fn with_options(
        loader: &LoaderConfig,
        chunking: ChunkingConfig,
        options: IngestConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let chunker = Chunker::new(chunking)?;
        if options.concurrency == 0 || options.embed_batch_size == 0 || options.upsert_batch_size == 0 {
            return Err(Error::config("ingest concurrency and batch sizes must be at least 1"));
        }
        Ok(Self { loader: Loader::new(loader), chunker, embedder, store, options })
    }

    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport> {
        info!("Processing directory: {}", dir.display());
        let paths = self.loader.discover(dir)?;
        let loads = stream::iter(paths).map(|path| async move {
            let path = path?;
            self.loader.load_file_async(&path).await
        });
        let report = self.run(loads).await?;
        info!(
            "Processed {} documents into {} chunks ({} vectors upserted, {} failed)",
            report.documents, report.chunks, report.vectors_upserted, report.vectors_failed
        );
        Ok(report)
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        info!("Processing file: {}", path.display());
        self.run(stream::iter([self.loader.load_file_async(path)])).await
    }

    pub async fn ingest_documents<I>(&self, docs: I) -> Result<IngestReport>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        self.run(stream::iter(docs).map(future::ready)).await
    }

    /// Drive document loads through the pipeline, at most `concurrency` at once.
    async fn run<S, F>(&self, loads: S) -> Result<IngestReport>
    where
        S: Stream<Item = F>,
        F: Future<Output = Result<Document>>,
    {
        let pb = self.progress_bar();
        let mut report = IngestReport::default();
        let mut outcomes = loads
            .map(|load| async move {
                let doc = load.await?;
                Ok::<_, Error>(self.ingest_document(doc).await)
            })
            .buffer_unordered(self.options.concurrency);
        while let Some(outcome) = outcomes.next().await {
            let outcome = outcome?;
            pb.set_message(outcome.path.clone());
            pb.inc(1);
            report.absorb(outcome);
        }
        pb.finish_with_message("✅ ingestion completed");
        Ok(report)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.options.show_progress { return ProgressBar::hidden(); }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} documents {msg}") {
            pb.set_style(style);
        }
        pb
    }

    fn timeout(&self) -> Duration { Duration::from_secs(self.options.timeout_secs) }

    async fn ingest_document(&self, doc: Document) -> DocOutcome {
        let all = self.chunker.chunk(&doc);
        let produced = all.len();
        let chunks: Vec<Chunk> = all.into_iter().filter(|c| !c.text.trim().is_empty()).collect();
        let mut outcome = DocOutcome {
            path: doc.path.clone(),
            chunks: chunks.len(),
            skipped_empty: produced - chunks.len(),
            upserted: 0,
            failed: 0,
            error: None,
        };
        if chunks.is_empty() {
            warn!("No content to embed in {}", doc.path);
            return outcome;
        }

        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.options.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = with_timeout(self.embedder.embedder_id(), self.timeout(), self.embedder.embed_batch(&texts)).await;
            match embedded {
                Ok(vectors) if vectors.len() == batch.len() => {
                    records.extend(batch.iter().zip(vectors).map(|(c, v)| VectorRecord::from_chunk(c, v)));
                }
                Ok(vectors) => {
                    let msg = format!("embedder returned {} vectors for {} chunks", vectors.len(), batch.len());
                    error!("Error embedding {}: {}", doc.path, msg);
                    outcome.error = Some(msg);
                    return outcome;
                }
                Err(e) => {
                    error!("Error embedding {}: {}", doc.path, e);
                    outcome.error = Some(e.to_string());
                    return outcome;
                }
            }
        }

        for (i, batch) in records.chunks(self.options.upsert_batch_size).enumerate() {
            match with_timeout(self.store.name(), self.timeout(), self.store.upsert(batch)).await {
                Ok(n) => {
                    outcome.upserted += n;
                    info!("Upserted batch {} of {}: {} vectors", i + 1, doc.path, n);
                }
                Err(e) => {
                    outcome.failed += batch.len();
                    error!("Failed to upsert batch {} of {}: {}", i + 1, doc.path, e);
                }
            }
        }
        outcome
    }
}
