//! Error types for studydash
//!
//! This module defines the crate error taxonomy using `thiserror`, plus the
//! lower-level [`BackendError`] reported by store and auth adapters before it
//! is classified into a [`StudyError`].

use thiserror::Error;

/// Main error type for studydash operations
///
/// Covers configuration, backend reads and writes, authentication and the
/// conversions from the underlying IO, serialization and HTTP libraries.
#[derive(Error, Debug)]
pub enum StudyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading the session list from the backend failed
    #[error("Failed to load study sessions: {0}")]
    Fetch(String),

    /// Joining a session failed for a reason other than a duplicate join
    #[error("Failed to join session: {0}")]
    Join(String),

    /// The user already has a participation row for this session
    #[error("Already joined session {session_id}")]
    DuplicateJoin {
        /// Session the user tried to join again
        session_id: uuid::Uuid,
    },

    /// Creating a study session failed
    #[error("Failed to create session: {0}")]
    Create(String),

    /// No authenticated session is available
    #[error("Not signed in")]
    Unauthenticated,

    /// Authentication errors (bad credentials, expired refresh token, etc.)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Change subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Failure reported by a backend adapter (store or auth)
///
/// Adapters classify transport and HTTP failures into these variants so the
/// synchronizer can tell a uniqueness violation apart from everything else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The insert was rejected by a uniqueness constraint
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The caller is not authenticated or not allowed to perform the request
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with a non-success status
    #[error("backend returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// The request never produced a response (connect, timeout, TLS)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Returns `true` when this error is a uniqueness violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

/// Result type alias for studydash operations
///
/// Uses `anyhow::Error` so command handlers can attach context while library
/// APIs that need a typed failure return `std::result::Result<T, StudyError>`.
pub type Result<T> = anyhow::Result<T>;
