//! In-process vector store with exact cosine search.
//!
//! Rows keep their insertion position across upserts, and equal scores are
//! returned in insertion order.
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use ragbot_core::traits::VectorStore;
use ragbot_core::types::{keys, Meta, StoreStats, StoredMatch, VectorRecord};
use ragbot_core::{Error, Result};

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<VectorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.rows.read().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

pub(crate) fn matches_filter(metadata: &Meta, filter: Option<&Meta>) -> bool {
    filter.map_or(true, |f| f.iter().all(|(k, v)| metadata.get(k) == Some(v)))
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str { "memory" }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let dim = rows.first().map(|r| r.vector.len()).or_else(|| records.first().map(|r| r.vector.len()));
        if let Some(dim) = dim {
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
                return Err(Error::config(format!("vector for {} has dimension {}, store holds {}", bad.id, bad.vector.len(), dim)));
            }
        }
        for record in records {
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => rows.push(record.clone()),
            }
        }
        Ok(records.len())
    }

    async fn query(&self, vector: &[f32], k: usize, filter: Option<&Meta>) -> Result<Vec<StoredMatch>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut scored: Vec<(f32, &VectorRecord)> = rows
            .iter()
            .filter(|r| matches_filter(&r.metadata, filter))
            .map(|r| (cosine(vector, &r.vector), r))
            .collect();
        // stable: ties keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(score, r)| StoredMatch { id: r.id.clone(), score, text: r.text.clone(), metadata: r.metadata.clone() })
            .collect())
    }

    async fn delete_by_source(&self, source: &str) -> Result<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.retain(|r| r.metadata.get(keys::SOURCE).map(String::as_str) != Some(source));
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(StoreStats { total_vectors: rows.len(), dimension: rows.first().map(|r| r.vector.len()), namespaces: Default::default() })
    }
}
