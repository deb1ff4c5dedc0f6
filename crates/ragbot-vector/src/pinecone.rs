//! Pinecone vector store over the REST API.
//!
//! The control plane (`api.pinecone.io`) resolves or creates the index; all
//! reads and writes go to the index's data-plane host, scoped to one
//! namespace. Chunk text travels in the `content` metadata field.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use ragbot_core::config::PineconeConfig;
use ragbot_core::traits::VectorStore;
use ragbot_core::types::{keys, Meta, StoreStats, StoredMatch, VectorRecord};
use ragbot_core::{Error, Result, UpstreamKind};

const SERVICE: &str = "pinecone";
const API_VERSION: &str = "2024-07";
const READY_POLLS: usize = 60;

pub struct PineconeStore {
    client: Client,
    api_key: String,
    host: String,
    namespace: String,
    metadata_text_limit: usize,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: usize,
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))
}

fn transport_error(e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() { UpstreamKind::Timeout } else { UpstreamKind::Transport };
    Error::upstream(SERVICE, kind, e.to_string())
}

fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") { host.to_string() } else { format!("https://{}", host) }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        error!("Pinecone API error ({}): {}", status, text);
        return Err(Error::from_status(SERVICE, status.as_u16(), text));
    }
    response.json::<T>().await.map_err(|e| Error::upstream(SERVICE, UpstreamKind::InvalidResponse, e.to_string()))
}

/// Metadata values written by other clients may be numbers or booleans.
fn value_to_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl PineconeStore {
    pub fn new(api_key: impl Into<String>, host: &str, namespace: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("Pinecone API key is required (set PINECONE_API_KEY)"));
        }
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            host: with_scheme(host),
            namespace: namespace.into(),
            metadata_text_limit: 1000,
        })
    }

    pub fn with_metadata_text_limit(mut self, limit: usize) -> Self { self.metadata_text_limit = limit; self }

    /// Resolve the data-plane host for `cfg.index_name`, creating a serverless
    /// index of `dimension` when it is missing and creation is allowed.
    pub async fn connect(cfg: &PineconeConfig, dimension: usize) -> Result<Self> {
        let api_key = cfg.api_key.clone().unwrap_or_default();
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let host = match &cfg.host {
            Some(host) => host.clone(),
            None => {
                let control = ControlPlane { client: build_client(timeout)?, api_key: &api_key, base: cfg.control_url.trim_end_matches('/') };
                control.resolve_host(cfg, dimension).await?
            }
        };
        info!("Using Pinecone index {} at {} (namespace '{}')", cfg.index_name, host, cfg.namespace);
        Ok(Self::new(api_key, &host, cfg.namespace.clone(), timeout)?.with_metadata_text_limit(cfg.metadata_text_limit))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}/{}", self.host, path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    fn to_pinecone<'a>(&self, record: &'a VectorRecord) -> PineconeVector<'a> {
        let mut metadata: Map<String, Value> =
            record.metadata.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect();
        let content: String = record.text.chars().take(self.metadata_text_limit).collect();
        metadata.insert(keys::CONTENT.to_string(), Value::String(content));
        PineconeVector { id: &record.id, values: &record.vector, metadata }
    }
}

struct ControlPlane<'a> {
    client: Client,
    api_key: &'a str,
    base: &'a str,
}

impl ControlPlane<'_> {
    async fn describe(&self, name: &str) -> Result<Option<IndexDescription>> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.base, name))
            .header("Api-Key", self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND { return Ok(None); }
        read_json(response).await.map(Some)
    }

    async fn create(&self, cfg: &PineconeConfig, dimension: usize) -> Result<IndexDescription> {
        let region = cfg.environment.clone().unwrap_or_else(|| "us-east-1".to_string());
        let body = json!({
            "name": cfg.index_name,
            "dimension": dimension,
            "metric": cfg.metric,
            "spec": { "serverless": { "cloud": cfg.cloud, "region": region } }
        });
        let response = self
            .client
            .post(format!("{}/indexes", self.base))
            .header("Api-Key", self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let created: IndexDescription = read_json(response).await?;
        info!("Created Pinecone index: {}", cfg.index_name);
        Ok(created)
    }

    async fn resolve_host(&self, cfg: &PineconeConfig, dimension: usize) -> Result<String> {
        let mut desc = match self.describe(&cfg.index_name).await? {
            Some(desc) => desc,
            None if cfg.create_if_missing => self.create(cfg, dimension).await?,
            None => return Err(Error::config(format!("Pinecone index '{}' does not exist", cfg.index_name))),
        };
        let mut polls = 0;
        while !desc.status.as_ref().map_or(true, |s| s.ready) {
            if polls >= READY_POLLS {
                return Err(Error::upstream(SERVICE, UpstreamKind::Timeout, format!("index '{}' did not become ready", cfg.index_name)));
            }
            polls += 1;
            tokio::time::sleep(Duration::from_secs(1)).await;
            desc = match self.describe(&cfg.index_name).await? {
                Some(d) => d,
                None => continue,
            };
        }
        Ok(desc.host)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn name(&self) -> &str { SERVICE }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() { return Ok(0); }
        let vectors: Vec<PineconeVector<'_>> = records.iter().map(|r| self.to_pinecone(r)).collect();
        let body = json!({ "vectors": vectors, "namespace": self.namespace });
        let resp: UpsertResponse = self.post("vectors/upsert", &body).await?;
        debug!("Upserted {} vectors", resp.upserted_count);
        Ok(resp.upserted_count)
    }

    async fn query(&self, vector: &[f32], k: usize, filter: Option<&Meta>) -> Result<Vec<StoredMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
            "includeValues": false,
            "namespace": self.namespace,
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            let clauses: Map<String, Value> = filter.iter().map(|(k, v)| (k.clone(), json!({ "$eq": v }))).collect();
            body["filter"] = Value::Object(clauses);
        }
        let resp: QueryResponse = self.post("query", &body).await?;
        Ok(resp
            .matches
            .into_iter()
            .map(|m| {
                let mut metadata: Meta = m.metadata.into_iter().map(|(k, v)| (k, value_to_string(v))).collect();
                let text = metadata.remove(keys::CONTENT).unwrap_or_default();
                StoredMatch { id: m.id, score: m.score, text, metadata }
            })
            .collect())
    }

    async fn delete_by_source(&self, source: &str) -> Result<()> {
        let mut filter = Map::new();
        filter.insert(keys::SOURCE.to_string(), json!({ "$eq": source }));
        let body = json!({ "filter": filter, "namespace": self.namespace });
        let _: Value = self.post("vectors/delete", &body).await?;
        info!("Deleted vectors with source {}", source);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let resp: IndexStats = self.post("describe_index_stats", &json!({})).await?;
        Ok(StoreStats {
            total_vectors: resp.total_vector_count,
            dimension: resp.dimension,
            namespaces: resp.namespaces.into_iter().map(|(name, ns)| (name, ns.vector_count)).collect(),
        })
    }
}
