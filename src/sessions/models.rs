//! Study session and participation records
//!
//! [`SessionRow`] is the wire shape returned by the store when sessions are
//! selected together with the embedded participant aggregate
//! (`session_participants(count)`); [`StudySession`] is the flattened value
//! the rest of the crate works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A collaborative study session with its live participant count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    pub title: String,
    /// Free-text planned length, e.g. "2 hours"
    pub duration: String,
    pub created_by: Uuid,
    /// Derived from the participation aggregate of the same fetch
    pub participant_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Aggregate entry embedded in a session row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountAggregate {
    pub count: u64,
}

/// Session row as returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub duration: String,
    pub created_by: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Embedded aggregate; absent when the row was returned by an insert
    #[serde(default)]
    pub session_participants: Vec<CountAggregate>,
}

impl SessionRow {
    /// Participant count from the embedded aggregate, zero when missing
    pub fn participant_count(&self) -> u64 {
        self.session_participants
            .first()
            .map(|aggregate| aggregate.count)
            .unwrap_or(0)
    }
}

impl From<SessionRow> for StudySession {
    fn from(row: SessionRow) -> Self {
        let participant_count = row.participant_count();
        Self {
            id: row.id,
            title: row.title,
            duration: row.duration,
            created_by: row.created_by,
            participant_count,
            created_at: row.created_at,
        }
    }
}

/// Insert payload for a new study session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudySession {
    pub title: String,
    pub duration: String,
    pub created_by: Uuid,
}

/// A user's membership in a session
///
/// The store enforces at most one row per `(session_id, user_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participation {
    pub session_id: Uuid,
    pub user_id: Uuid,
}
