//! Test utilities for studydash
//!
//! This module provides common test utilities: temporary config files,
//! sample users, and assertion helpers.

use crate::auth::User;
use crate::config::Config;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Write `content` to `name` inside `dir`
///
/// # Panics
///
/// Panics if writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T, E: std::fmt::Display>(result: Result<T, E>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Default configuration pointing at `url` with a test anon key
pub fn test_config(url: &str) -> Config {
    let mut config = Config::default();
    config.backend.url = url.to_string();
    config.backend.anon_key = "test-anon-key".to_string();
    config.auth.persist_session = false;
    config
}

/// A complete configuration file
pub fn test_config_yaml() -> String {
    r#"
backend:
  url: https://demo.example.com
  anon_key: demo-anon
  sessions_table: study_sessions
  participants_table: session_participants
  realtime_path: /realtime/v1/sse
  request_timeout_seconds: 10

auth:
  persist_session: false
  keyring_service: studydash-test

logging:
  level: debug
  json_format: true
"#
    .to_string()
}

/// A signed-in user with a fresh id
pub fn sample_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: Some("student@example.com".to_string()),
    }
}
