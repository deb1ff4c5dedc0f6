use std::path::Path;

use figment::providers::{Format, Toml};
use figment::Figment;
use ragbot_core::chunker::ChunkUnit;
use ragbot_core::config::{expand_path, resolve_with_base, Config, EmbeddingProvider, StoreBackend};
use ragbot_core::Error;

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let settings = Config::from_figment(Figment::new()).settings().expect("defaults");
    assert_eq!(settings.chunking.max_size, 1000);
    assert_eq!(settings.chunking.overlap, 200);
    assert_eq!(settings.chunking.unit, ChunkUnit::Chars);
    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.pinecone.index_name, "chatbot-docs");
    assert_eq!(settings.store.backend, StoreBackend::Pinecone);
    assert_eq!(settings.embedding.dimension, 1536);
    assert_eq!(settings.chat.model, "gpt-3.5-turbo");
}

#[test]
fn toml_sections_override_defaults() {
    let toml = r#"
        [chunking]
        max_size = 300
        overlap = 50
        unit = "words"

        [store]
        backend = "lancedb"

        [embedding]
        provider = "fake"
        dimension = 64
    "#;
    let config = Config::from_figment(Figment::new().merge(Toml::string(toml)));
    let settings = config.settings().unwrap();
    assert_eq!(settings.chunking.max_size, 300);
    assert_eq!(settings.chunking.unit, ChunkUnit::Words);
    assert_eq!(settings.store.backend, StoreBackend::LanceDb);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Fake);
    assert_eq!(config.get::<usize>("embedding.dimension").unwrap(), 64);
    assert!(config.get::<usize>("embedding.missing").is_err());
}

#[test]
fn invalid_chunking_is_a_configuration_error() {
    let toml = "[chunking]\nmax_size = 100\noverlap = 100\n";
    let err = Config::from_figment(Figment::new().merge(Toml::string(toml))).settings().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
}

#[test]
fn load_in_reads_config_toml_from_base_dir() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "[retrieval]\ntop_k = 9\n").unwrap();
    let settings = Config::load_in(tmp.path()).unwrap().settings().unwrap();
    assert_eq!(settings.retrieval.top_k, 9);
}

#[test]
fn paths_resolve_against_base() {
    let base = Path::new("/srv/app");
    assert_eq!(resolve_with_base(base, "data/docs"), Path::new("/srv/app/data/docs"));
    assert_eq!(resolve_with_base(base, "/abs/docs"), Path::new("/abs/docs"));
    assert_eq!(expand_path("plain/dir"), Path::new("plain/dir"));
}
