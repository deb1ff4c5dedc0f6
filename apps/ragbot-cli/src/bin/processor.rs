use std::path::PathBuf;

use clap::Parser;

use ragbot_chat::Retriever;
use ragbot_cli::{ensure_ingest_succeeded, init_logging, load_settings, open_backends, override_index, preview};
use ragbot_core::config::expand_path;
use ragbot_core::traits::VectorStore;
use ragbot_core::types::{keys, Meta};
use ragbot_vector::{IngestReport, Ingestor};

#[derive(Parser, Debug)]
#[command(name = "ragbot-processor", about = "Ingest documents into the vector store and inspect it")]
struct Args {
    /// Directory of documents to ingest
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Single file to ingest
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Print the closest chunks for a query
    #[arg(short, long)]
    search: Option<String>,

    /// Only search chunks from this source path
    #[arg(long, requires = "search")]
    source: Option<String>,

    /// Number of search results
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Remove every vector of a document
    #[arg(long)]
    delete: Option<String>,

    /// Print vector store statistics
    #[arg(long)]
    stats: bool,

    /// Index (Pinecone) or table (LanceDB) name
    #[arg(long)]
    index: Option<String>,
}

fn print_report(report: &IngestReport) {
    println!("\n✅ Ingestion completed!");
    println!("📊 Documents: {}  Chunks: {}  Vectors upserted: {}", report.documents, report.chunks, report.vectors_upserted);
    if report.skipped_empty > 0 { println!("⚠️  Skipped {} empty chunks", report.skipped_empty); }
    if report.vectors_failed > 0 { println!("❌ {} vectors failed to upsert", report.vectors_failed); }
    for failure in &report.failures { println!("❌ {}: {}", failure.path, failure.message); }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let mut settings = load_settings()?;
    override_index(&mut settings, args.index.as_deref());

    let nothing_requested = args.directory.is_none() && args.file.is_none() && args.search.is_none() && args.delete.is_none() && !args.stats;
    let (embedder, store) = open_backends(&settings).await?;
    let mut ingest_result = Ok(());

    if args.directory.is_some() || args.file.is_some() || nothing_requested {
        let ingestor = Ingestor::new(&settings, embedder.clone(), store.clone())?;
        let report = if let Some(file) = &args.file {
            println!("📄 Processing file: {}", file.display());
            ingestor.ingest_file(file).await?
        } else {
            let dir = args.directory.clone().unwrap_or_else(|| expand_path(&settings.data.docs_dir));
            println!("📁 Processing directory: {}", dir.display());
            ingestor.ingest_dir(&dir).await?
        };
        print_report(&report);
        ingest_result = ensure_ingest_succeeded(&report);
    }

    if let Some(query) = &args.search {
        let filter = args.source.as_ref().map(|source| {
            let mut f = Meta::new();
            f.insert(keys::SOURCE.to_string(), source.clone());
            f
        });
        let retriever = Retriever::new(embedder.clone(), store.clone(), &settings.retrieval);
        let results = retriever.retrieve(query, args.top_k, filter.as_ref()).await?;
        println!("\n🔍 Found {} results for: \"{}\"", results.len(), query);
        for (i, r) in results.iter().enumerate() {
            println!("\n  {}. score={:.4}  source={}  chunk={}", i + 1, r.similarity_score, r.chunk.source_document_path, r.chunk.index);
            println!("     📝 {}", preview(&r.chunk.text, 200));
        }
    }

    if let Some(source) = &args.delete {
        store.delete_by_source(source).await?;
        println!("🗑️  Deleted vectors for {}", source);
    }

    if args.stats {
        let stats = store.stats().await?;
        println!("\n📊 Vector store: {}", store.name());
        println!("   Total vectors: {}", stats.total_vectors);
        if let Some(dim) = stats.dimension { println!("   Dimension: {}", dim); }
        for (name, count) in &stats.namespaces {
            let name = if name.is_empty() { "(default)" } else { name.as_str() };
            println!("   Namespace {}: {} vectors", name, count);
        }
    }
    ingest_result
}
