use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use studydash::config::BackendConfig;

#[allow(dead_code)]
pub const ANON_KEY: &str = "test-anon-key";

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Backend settings pointing at a mock server
#[allow(dead_code)]
pub fn backend_config(base_url: &str) -> BackendConfig {
    BackendConfig {
        url: base_url.to_string(),
        anon_key: ANON_KEY.to_string(),
        request_timeout_seconds: 5,
        ..BackendConfig::default()
    }
}

/// JSON for one session row with an embedded participant aggregate
#[allow(dead_code)]
pub fn session_row(id: &str, title: &str, participants: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "duration": "1 hour",
        "created_by": "5f0c6a2e-8a55-4c61-9d4f-0d7a1b9e2c31",
        "created_at": "2024-03-01T10:00:00+00:00",
        "session_participants": [{ "count": participants }]
    })
}
