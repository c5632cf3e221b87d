//! Backend store abstraction and implementations
//!
//! This module defines the [`Backend`] trait the session synchronizer talks
//! to. Concrete implementations live in submodules:
//!
//! - [`rest::RestBackend`] -- PostgREST-style HTTP tables plus a server-sent
//!   change feed.
//! - [`memory::InMemoryBackend`] -- in-process store with the same
//!   uniqueness rules, used by tests and demos.
//!
//! Backends are passed around explicitly as `Arc<dyn Backend>`; nothing in
//! the crate reaches for a global client.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::sessions::models::{NewStudySession, Participation, SessionRow};

pub mod memory;
pub mod realtime;
pub mod rest;

pub use memory::InMemoryBackend;
pub use rest::RestBackend;

/// Kind of row mutation reported by the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Which mutation kinds a subscription is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeEventFilter {
    /// `*`: every insert, update and delete
    #[default]
    All,
    Only(ChangeKind),
}

impl ChangeEventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == kind,
        }
    }
}

impl fmt::Display for ChangeEventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Only(kind) => write!(f, "{}", kind),
        }
    }
}

/// One row mutation on a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// New row for inserts/updates, old row for deletes, when the feed sends it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            kind,
            record: None,
        }
    }
}

/// Receiving end of a backend change subscription
///
/// Dropping or [closing](ChangeFeed::close) the feed detaches it from the
/// backend.
#[derive(Debug)]
pub struct ChangeFeed {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    release: Option<CancellationToken>,
}

impl ChangeFeed {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            events,
            release: None,
        }
    }

    /// Attach a token cancelled when the feed is closed, for backends that
    /// run a producer task per subscription
    pub fn with_release(mut self, release: CancellationToken) -> Self {
        self.release = Some(release);
        self
    }

    /// Wait for the next change. `None` once the feed is closed or the
    /// producer has gone away.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn close(&mut self) {
        if let Some(release) = self.release.take() {
            release.cancel();
        }
        self.events.close();
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.close();
    }
}

/// Table store operations used by the session synchronizer
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Fetch every study session with its participant aggregate in a single
    /// request, in the order the store returns them.
    async fn fetch_sessions(&self) -> Result<Vec<SessionRow>, BackendError>;

    /// Insert a study session and return the stored row
    async fn insert_session(&self, session: &NewStudySession) -> Result<SessionRow, BackendError>;

    /// Insert a participation row.
    ///
    /// Returns [`BackendError::UniqueViolation`] when the pair already exists.
    async fn insert_participation(&self, participation: &Participation)
        -> Result<(), BackendError>;

    /// Subscribe to mutations of `table` matching `events`
    async fn subscribe(
        &self,
        table: &str,
        events: ChangeEventFilter,
    ) -> Result<ChangeFeed, BackendError>;

    /// Name of the table holding study sessions
    fn sessions_table(&self) -> &str;
}
