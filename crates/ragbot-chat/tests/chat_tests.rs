use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ragbot_chat::{build_context, OpenAiCompleter, RagChatbot, Retriever, NO_RESULTS_ANSWER};
use ragbot_core::config::{ChatConfig, RetrievalConfig};
use ragbot_core::traits::{Completer, Embedder, VectorStore};
use ragbot_core::types::{keys, ChatMessage, EmbeddingVector, Meta, StoreStats, StoredMatch, VectorRecord};
use ragbot_core::{Error, Result, UpstreamKind};
use ragbot_embed::{FakeEmbedder, OpenAiClient};
use ragbot_vector::MemoryStore;

/// Returns canned matches regardless of the query vector.
struct CannedStore {
    matches: Vec<StoredMatch>,
    queries: AtomicUsize,
}

#[async_trait]
impl VectorStore for CannedStore {
    fn name(&self) -> &str { "canned" }
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> { Ok(records.len()) }
    async fn query(&self, _vector: &[f32], k: usize, _filter: Option<&Meta>) -> Result<Vec<StoredMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.iter().take(k).cloned().collect())
    }
    async fn delete_by_source(&self, _source: &str) -> Result<()> { Ok(()) }
    async fn stats(&self) -> Result<StoreStats> { Ok(StoreStats::default()) }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn embedder_id(&self) -> &str { "failing" }
    fn dim(&self) -> usize { 4 }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Err(Error::upstream("failing", UpstreamKind::Auth, "invalid key"))
    }
}

#[derive(Default)]
struct RecordingCompleter {
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl Completer for RecordingCompleter {
    fn model(&self) -> &str { "recording" }
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok("The answer.".to_string())
    }
}

fn stored(id: &str, source: &str, index: usize, score: f32, text: &str) -> StoredMatch {
    let mut metadata = Meta::new();
    metadata.insert(keys::SOURCE.to_string(), source.to_string());
    metadata.insert(keys::CHUNK_INDEX.to_string(), index.to_string());
    StoredMatch { id: id.to_string(), score, text: text.to_string(), metadata }
}

fn canned(matches: Vec<StoredMatch>) -> Arc<CannedStore> {
    Arc::new(CannedStore { matches, queries: AtomicUsize::new(0) })
}

fn retriever(store: Arc<dyn VectorStore>) -> Retriever {
    Retriever::new(Arc::new(FakeEmbedder::new(8)), store, &RetrievalConfig::default())
}

#[tokio::test]
async fn retrieve_sorts_by_score_and_keeps_ties_stable() {
    let store = canned(vec![
        stored("a", "a.txt", 0, 0.4, "a"),
        stored("b", "b.txt", 0, 0.9, "b"),
        stored("c", "c.txt", 2, 0.4, "c"),
        stored("d", "d.txt", 0, 0.7, "d"),
    ]);
    let results = retriever(store).retrieve("q", Some(4), None).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "d", "a", "c"]);
    assert_eq!(results[3].chunk.source_document_path, "c.txt");
    assert_eq!(results[3].chunk.index, 2);
}

#[tokio::test]
async fn retrieve_defaults_k_and_zero_k_makes_no_call() {
    let matches = (0..8).map(|i| stored(&format!("m{}", i), "a.txt", i, 1.0 - i as f32 * 0.1, "t")).collect();
    let store = canned(matches);
    let r = retriever(store.clone());

    assert_eq!(r.retrieve("q", None, None).await.unwrap().len(), 5);
    assert!(r.retrieve("q", Some(0), None).await.unwrap().is_empty());
    assert_eq!(store.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retrieve_against_memory_store_with_filter() {
    let embedder = Arc::new(FakeEmbedder::new(16));
    let store = Arc::new(MemoryStore::new());
    let mut records = Vec::new();
    for (i, (source, text)) in [("fire.txt", "build a fire"), ("water.txt", "boil water"), ("fire.txt", "fire safety")].iter().enumerate() {
        let mut metadata = Meta::new();
        metadata.insert(keys::SOURCE.to_string(), source.to_string());
        records.push(VectorRecord { id: format!("r{}", i), vector: embedder.embed_text(text), text: text.to_string(), metadata });
    }
    store.upsert(&records).await.unwrap();
    let r = Retriever::new(embedder, store, &RetrievalConfig::default());

    let all = r.retrieve("fire", None, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));

    let mut filter = Meta::new();
    filter.insert(keys::SOURCE.to_string(), "water.txt".to_string());
    let only_water = r.retrieve("fire", None, Some(&filter)).await.unwrap();
    assert_eq!(only_water.len(), 1);
    assert_eq!(only_water[0].chunk.text, "boil water");
}

#[tokio::test]
async fn retrieve_surfaces_embedder_failure() {
    let r = Retriever::new(Arc::new(FailingEmbedder), canned(Vec::new()), &RetrievalConfig::default());
    let err = r.retrieve("q", None, None).await.unwrap_err();
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::Auth));
}

#[tokio::test]
async fn chat_builds_prompt_and_lists_sources() {
    let store = canned(vec![stored("a", "docs/a.txt", 1, 0.8766, "Alpha text."), stored("b", "docs/b.txt", 0, 0.5, "Beta text.")]);
    let completer = Arc::new(RecordingCompleter::default());
    let bot = RagChatbot::new(retriever(store), completer.clone(), &ChatConfig::default());

    let resp = bot.chat("What is alpha?").await.unwrap();

    assert_eq!(resp.answer, "The answer.");
    assert_eq!(resp.sources.len(), 2);
    assert_eq!(resp.sources[0].source, "docs/a.txt");
    assert_eq!(resp.sources[0].chunk_index, 1);
    assert_eq!(
        resp.context_used,
        "Document 1 (Score: 0.877, Source: docs/a.txt):\nAlpha text.\n\n---\n\nDocument 2 (Score: 0.500, Source: docs/b.txt):\nBeta text."
    );

    let calls = completer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0].role, "system");
    assert_eq!(calls[0][1].role, "user");
    assert!(calls[0][1].content.starts_with("Context documents:\nDocument 1"));
    assert!(calls[0][1].content.ends_with("Question: What is alpha?\n\nPlease answer based on the context provided above."));
}

#[tokio::test]
async fn chat_without_results_does_not_call_the_completer() {
    let completer = Arc::new(RecordingCompleter::default());
    let bot = RagChatbot::new(retriever(canned(Vec::new())), completer.clone(), &ChatConfig::default());

    let resp = bot.chat("anything").await.unwrap();

    assert_eq!(resp.answer, NO_RESULTS_ANSWER);
    assert!(resp.sources.is_empty());
    assert!(completer.calls.lock().unwrap().is_empty());
}

#[test]
fn build_context_of_nothing_is_empty() {
    assert_eq!(build_context(&[]), "");
}

#[tokio::test]
async fn openai_completer_posts_chat_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "max_tokens": 500, "messages": [{ "role": "system" }, { "role": "user", "content": "hi" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Hello there.  " } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new("sk-test", server.uri(), Duration::from_secs(5)).unwrap();
    let completer = OpenAiCompleter::new(client, &ChatConfig::default());
    let out = completer.complete(&[ChatMessage::system("be brief"), ChatMessage::user("hi")]).await.unwrap();
    assert_eq!(out, "Hello there.");
}

#[tokio::test]
async fn openai_completer_maps_rate_limit_and_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new("sk-test", server.uri(), Duration::from_secs(5)).unwrap();
    let completer = OpenAiCompleter::new(client, &ChatConfig::default());
    let msgs = [ChatMessage::user("hi")];

    let err = completer.complete(&msgs).await.unwrap_err();
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::RateLimited));
    let err = completer.complete(&msgs).await.unwrap_err();
    assert_eq!(err.upstream_kind(), Some(UpstreamKind::InvalidResponse));
}
