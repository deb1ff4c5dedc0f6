use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use ragbot_core::traits::VectorStore;
use ragbot_core::types::{keys, Meta, StoreStats, StoredMatch, VectorRecord};
use ragbot_core::{Error, Result, UpstreamKind};

use crate::memory::matches_filter;
use crate::schema::build_chunk_schema;
use crate::table::{ensure_table, lance_err, open_db, sql_literal, SERVICE};

/// Local vector store backed by a single LanceDB table, searched by cosine
/// distance. Scores are `1 - distance`.
///
/// The table is created empty on open; writes are serialized through
/// `write_lock` so concurrent ingestion never races on commits.
pub struct LanceDbStore { table: Table, table_name: String, dim: i32, write_lock: Mutex<()> }

impl LanceDbStore {
	pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		std::fs::create_dir_all(db_path).map_err(|e| Error::io(db_path, e))?;
		let dim = i32::try_from(dim).map_err(|_| Error::config(format!("embedding dimension {} is too large", dim)))?;
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		let table = ensure_table(&db, table_name, build_chunk_schema(dim)).await?;
		Ok(Self { table, table_name: table_name.to_string(), dim, write_lock: Mutex::new(()) })
	}

	fn records_to_batch(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
		let mut ids = Vec::new(); let mut sources = Vec::new(); let mut chunk_indices = Vec::new(); let mut contents = Vec::new(); let mut metas = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for r in records {
			if r.vector.len() != self.dim as usize {
				return Err(Error::config(format!("vector for {} has dimension {}, table expects {}", r.id, r.vector.len(), self.dim)));
			}
			ids.push(r.id.clone());
			sources.push(r.metadata.get(keys::SOURCE).cloned().unwrap_or_default());
			chunk_indices.push(r.metadata.get(keys::CHUNK_INDEX).and_then(|v| v.parse::<i32>().ok()).unwrap_or(0));
			contents.push(r.text.clone());
			metas.push(serde_json::to_string(&r.metadata).map_err(|e| Error::config(e.to_string()))?);
			vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
		}
		let batch = RecordBatch::try_new(build_chunk_schema(self.dim), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(sources)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(metas)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim)),
		]).map_err(lance_err)?;
		Ok(batch)
	}

	fn batch_to_matches(batch: &RecordBatch, out: &mut Vec<StoredMatch>) -> Result<()> {
		let string_col = |name: &str| batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| missing(name));
		let ids = string_col("id")?; let contents = string_col("content")?; let metas = string_col("metadata")?;
		let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
		for i in 0..batch.num_rows() {
			let metadata: Meta = serde_json::from_str(metas.value(i)).map_err(|e| Error::upstream(SERVICE, UpstreamKind::InvalidResponse, e.to_string()))?;
			let score = distances.filter(|d| !d.is_null(i)).map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
			out.push(StoredMatch { id: ids.value(i).to_string(), score, text: contents.value(i).to_string(), metadata });
		}
		Ok(())
	}
}

fn missing(column: &str) -> Error { Error::upstream(SERVICE, UpstreamKind::InvalidResponse, format!("missing column '{}'", column)) }

#[async_trait]
impl VectorStore for LanceDbStore {
	fn name(&self) -> &str { SERVICE }

	async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
		if records.is_empty() { return Ok(0); }
		let batch = self.records_to_batch(records)?; let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let _guard = self.write_lock.lock().await;
		let mut mi = self.table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await.map_err(lance_err)?;
		debug!("Upserted {} rows into {}", records.len(), self.table_name);
		Ok(records.len())
	}

	async fn query(&self, vector: &[f32], k: usize, filter: Option<&Meta>) -> Result<Vec<StoredMatch>> {
		if k == 0 { return Ok(Vec::new()); }
		// only `source` is a column; other keys are matched after the search
		let extra_keys = filter.map_or(false, |f| f.keys().any(|key| key != keys::SOURCE));
		let fetch = if extra_keys { k * 10 } else { k };
		let mut query = self.table.vector_search(vector.to_vec()).map_err(lance_err)?.distance_type(DistanceType::Cosine).limit(fetch);
		if let Some(source) = filter.and_then(|f| f.get(keys::SOURCE)) {
			query = query.only_if(format!("source = {}", sql_literal(source)));
		}
		let mut stream = query.execute().await.map_err(lance_err)?;
		let mut out = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(lance_err)? {
			Self::batch_to_matches(&batch, &mut out)?;
		}
		out.retain(|m| matches_filter(&m.metadata, filter));
		out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		out.truncate(k);
		Ok(out)
	}

	async fn delete_by_source(&self, source: &str) -> Result<()> {
		let _guard = self.write_lock.lock().await;
		self.table.delete(&format!("source = {}", sql_literal(source))).await.map_err(lance_err)?;
		info!("Deleted rows with source {} from {}", source, self.table_name);
		Ok(())
	}

	async fn stats(&self) -> Result<StoreStats> {
		let total = self.table.count_rows(None).await.map_err(lance_err)?;
		let mut namespaces = std::collections::BTreeMap::new();
		namespaces.insert(self.table_name.clone(), total);
		Ok(StoreStats { total_vectors: total, dimension: Some(self.dim as usize), namespaces })
	}
}
