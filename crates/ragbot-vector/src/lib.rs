//! Vector store backends and the ingestion pipeline that fills them.

pub mod ingest;
pub mod lance;
pub mod memory;
pub mod pinecone;
pub mod schema;
pub mod table;

use std::sync::Arc;

use tracing::info;

use ragbot_core::config::{expand_path, AppConfig, StoreBackend};
use ragbot_core::traits::VectorStore;
use ragbot_core::Result;

pub use ingest::{IngestFailure, IngestReport, Ingestor};
pub use lance::LanceDbStore;
pub use memory::MemoryStore;
pub use pinecone::PineconeStore;

/// Open the store selected by `store.backend` for vectors of dimension `dim`.
pub async fn open_store(settings: &AppConfig, dim: usize) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.store.backend {
        StoreBackend::Pinecone => Arc::new(PineconeStore::connect(&settings.pinecone, dim).await?),
        StoreBackend::LanceDb => {
            let path = expand_path(&settings.data.lancedb_dir);
            Arc::new(LanceDbStore::open(&path, &settings.store.table_name, dim).await?)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!("Using {} vector store", store.name());
    Ok(store)
}
