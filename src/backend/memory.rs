//! In-process store for tests and offline demos
//!
//! [`InMemoryBackend`] keeps sessions and participations in memory, enforces
//! the `(session_id, user_id)` uniqueness rule, broadcasts change events to
//! subscribers, and exposes counters so tests can assert how many requests a
//! caller made.
//!
//! # Example
//!
//! ```
//! use studydash::backend::{Backend, InMemoryBackend};
//!
//! # tokio_test::block_on(async {
//! let backend = InMemoryBackend::new();
//! let id = backend.seed_session("Calculus", "1 hour", 3);
//! let rows = backend.fetch_sessions().await.unwrap();
//! assert_eq!(rows[0].id, id);
//! assert_eq!(rows[0].participant_count(), 3);
//! assert_eq!(backend.fetch_calls(), 1);
//! # });
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::{Backend, ChangeEvent, ChangeEventFilter, ChangeFeed, ChangeKind};
use crate::error::BackendError;
use crate::sessions::models::{CountAggregate, NewStudySession, Participation, SessionRow};

const SESSIONS_TABLE: &str = "study_sessions";
const PARTICIPANTS_TABLE: &str = "session_participants";

#[derive(Debug)]
struct StoredSession {
    row: SessionRow,
    /// Participants that exist without a participation row (seeded counts)
    seeded_participants: u64,
}

#[derive(Debug)]
struct Subscriber {
    table: String,
    events: ChangeEventFilter,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Debug, Default)]
struct State {
    sessions: Vec<StoredSession>,
    participations: HashSet<Participation>,
    subscribers: Vec<Subscriber>,
    fail_fetch: Option<BackendError>,
    fail_insert: Option<BackendError>,
}

/// In-memory [`Backend`]
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    fetch_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a session that already has `participants` anonymous members.
    ///
    /// Seeding does not emit a change event.
    pub fn seed_session(&self, title: &str, duration: &str, participants: u64) -> Uuid {
        let id = Uuid::new_v4();
        self.state().sessions.push(StoredSession {
            row: SessionRow {
                id,
                title: title.to_string(),
                duration: duration.to_string(),
                created_by: Uuid::new_v4(),
                created_at: Some(Utc::now()),
                session_participants: Vec::new(),
            },
            seeded_participants: participants,
        });
        id
    }

    /// Make every following fetch fail with `error` (`None` to recover)
    pub fn fail_fetches(&self, error: Option<BackendError>) {
        self.state().fail_fetch = error;
    }

    /// Make every following insert fail with `error` (`None` to recover)
    pub fn fail_inserts(&self, error: Option<BackendError>) {
        self.state().fail_insert = error;
    }

    /// Emit a change event as if another client had mutated `table`
    pub fn emit(&self, event: ChangeEvent) {
        let mut state = self.state();
        Self::broadcast(&mut state, event);
    }

    fn broadcast(state: &mut State, event: ChangeEvent) {
        state.subscribers.retain(|s| !s.tx.is_closed());
        for subscriber in &state.subscribers {
            if subscriber.table == event.table && subscriber.events.matches(event.kind) {
                let _ = subscriber.tx.send(event.clone());
            }
        }
    }

    /// Number of `fetch_sessions` requests served
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of insert requests served (sessions and participations)
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Subscriptions whose feed is still open
    pub fn active_subscriptions(&self) -> usize {
        self.state()
            .subscribers
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }

    pub fn participations(&self) -> Vec<Participation> {
        self.state().participations.iter().copied().collect()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn fetch_sessions(&self) -> Result<Vec<SessionRow>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(error) = &state.fail_fetch {
            return Err(error.clone());
        }

        Ok(state
            .sessions
            .iter()
            .map(|stored| {
                let joined = state
                    .participations
                    .iter()
                    .filter(|p| p.session_id == stored.row.id)
                    .count() as u64;
                SessionRow {
                    session_participants: vec![CountAggregate {
                        count: stored.seeded_participants + joined,
                    }],
                    ..stored.row.clone()
                }
            })
            .collect())
    }

    async fn insert_session(&self, session: &NewStudySession) -> Result<SessionRow, BackendError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(error) = &state.fail_insert {
            return Err(error.clone());
        }

        let row = SessionRow {
            id: Uuid::new_v4(),
            title: session.title.clone(),
            duration: session.duration.clone(),
            created_by: session.created_by,
            created_at: Some(Utc::now()),
            session_participants: Vec::new(),
        };
        state.sessions.push(StoredSession {
            row: row.clone(),
            seeded_participants: 0,
        });
        Self::broadcast(
            &mut state,
            ChangeEvent {
                record: serde_json::to_value(&row).ok(),
                ..ChangeEvent::new(SESSIONS_TABLE, ChangeKind::Insert)
            },
        );
        Ok(row)
    }

    async fn insert_participation(
        &self,
        participation: &Participation,
    ) -> Result<(), BackendError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(error) = &state.fail_insert {
            return Err(error.clone());
        }

        if !state
            .sessions
            .iter()
            .any(|s| s.row.id == participation.session_id)
        {
            return Err(BackendError::Status {
                status: 409,
                message: format!("session {} does not exist", participation.session_id),
            });
        }

        if !state.participations.insert(*participation) {
            return Err(BackendError::UniqueViolation(
                "duplicate key value violates unique constraint \"session_participants_pkey\""
                    .to_string(),
            ));
        }

        Self::broadcast(
            &mut state,
            ChangeEvent::new(PARTICIPANTS_TABLE, ChangeKind::Insert),
        );
        Ok(())
    }

    async fn subscribe(
        &self,
        table: &str,
        events: ChangeEventFilter,
    ) -> Result<ChangeFeed, BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push(Subscriber {
            table: table.to_string(),
            events,
            tx,
        });
        Ok(ChangeFeed::new(rx))
    }

    fn sessions_table(&self) -> &str {
        SESSIONS_TABLE
    }
}
