//! Encrypted config store tests over real on-disk storage

use parsegate::{CONFIG_VERSION, Config, ConfigStore, HealthStatus};
use serde_json::json;
use tempfile::tempdir;

#[tokio::test]
async fn test_file_round_trip_keeps_plaintext_off_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let store = ConfigStore::with_file(&path);

    let mut config = Config::default();
    config.provider = "openai".to_string();
    config.models.get_mut("openai").unwrap().api_key = "sk-super-secret".to_string();
    config.models.get_mut("google").unwrap().api_key = "g-super-secret".to_string();
    store.save(&config).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("sk-super-secret"));
    assert!(!raw.contains("g-super-secret"));

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.models["openai"].api_key, "sk-super-secret");
    assert_eq!(loaded.models["google"].api_key, "g-super-secret");
}

#[tokio::test]
async fn test_ciphertext_is_not_portable_across_providers() {
    // The per-provider salt means google's ciphertext cannot decrypt as
    // openai's key; the load degrades it to an empty credential.
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let store = ConfigStore::with_file(&path);

    let mut config = Config::default();
    config.models.get_mut("google").unwrap().api_key = "g-secret".to_string();
    store.save(&config).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let mut blob: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let google_ciphertext = blob["models"]["google"]["apiKey"].clone();
    blob["models"]["openai"]["apiKey"] = google_ciphertext;
    std::fs::write(&path, serde_json::to_string(&blob).unwrap()).unwrap();

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.models["google"].api_key, "g-secret");
    assert_eq!(loaded.models["openai"].api_key, "");
}

#[tokio::test]
async fn test_legacy_blob_migrates_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let legacy = json!({
        "version": 1,
        "provider": "gemini",
        "models": {
            "gemini": {"apiKey": "", "modelName": "gemini-pro", "status": "healthy"},
            "claude": {"apiKey": "", "status": "nonsense"}
        },
        "fallbackOrder": ["claude", "gemini", "claude"],
        "templates": {"default": "translate {{text}}"}
    });
    std::fs::write(&path, serde_json::to_string(&legacy).unwrap()).unwrap();

    let store = ConfigStore::with_file(&path);
    let config = store.load().await.unwrap();

    assert_eq!(config.version, CONFIG_VERSION);
    assert_eq!(config.provider, "google");
    assert_eq!(config.models["google"].model.as_deref(), Some("gemini-pro"));
    assert_eq!(config.models["google"].status, HealthStatus::Healthy);
    // Invalid stored status coerces to unknown
    assert_eq!(config.models["anthropic"].status, HealthStatus::Unknown);
    // Aliased, deduplicated, missing ids appended in registry order
    assert_eq!(config.fallback_order, vec!["anthropic", "google", "openai"]);
    // Collaborator sections ride along
    assert_eq!(config.extra["templates"]["default"], "translate {{text}}");
}

#[tokio::test]
async fn test_migrated_blob_is_stable_across_saves() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let legacy = json!({
        "version": 2,
        "provider": "openai",
        "models": {"openai": {"apiKey": "", "status": "error", "lastError": "old failure"}}
    });
    std::fs::write(&path, serde_json::to_string(&legacy).unwrap()).unwrap();

    let store = ConfigStore::with_file(&path);
    let first = store.load().await.unwrap();
    store.save(&first).await.unwrap();
    let second = store.load().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_file_yields_defaults_and_save_creates_dirs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("config.json");
    let store = ConfigStore::with_file(&path);

    let config = store.load().await.unwrap();
    assert_eq!(config, Config::default());

    store.save(&config).await.unwrap();
    assert!(path.exists());
}
