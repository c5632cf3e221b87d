//! Session list synchronizer
//!
//! [`SessionSynchronizer`] reads the session list (with participant counts
//! from the same request), keeps it live through a change [`Subscription`],
//! and writes participations and new sessions. It never touches a cached
//! list itself: callers refresh their [`SessionListCache`] through `load()`.
//!
//! Overlapping loads are ordered with a generation counter. Every load takes
//! a [`LoadTicket`] up front; a result is applied only if its ticket is newer
//! than the last applied one, so a slow stale response can never overwrite a
//! newer list.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{Backend, ChangeEvent, ChangeEventFilter};
use crate::error::{BackendError, StudyError};
use crate::sessions::models::{NewStudySession, Participation, StudySession};

/// Reads and writes study sessions through an explicitly passed backend
#[derive(Debug, Clone)]
pub struct SessionSynchronizer {
    backend: Arc<dyn Backend>,
}

impl SessionSynchronizer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Fetch all sessions with participant counts, in backend order.
    ///
    /// Exactly one backend request is made regardless of the number of
    /// sessions.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Fetch`] when the backend read fails
    pub async fn load(&self) -> Result<Vec<StudySession>, StudyError> {
        let rows = self.backend.fetch_sessions().await.map_err(|e| {
            tracing::warn!(error = %e, "Fetching study sessions failed");
            StudyError::Fetch(e.to_string())
        })?;
        tracing::debug!(count = rows.len(), "Loaded study sessions");
        Ok(rows.into_iter().map(StudySession::from).collect())
    }

    /// Call `on_change` for every insert, update or delete on the sessions
    /// table until the returned [`Subscription`] is released.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Subscription`] if the backend refuses the
    /// subscription
    pub async fn subscribe<F>(&self, on_change: F) -> Result<Subscription, StudyError>
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let table = self.backend.sessions_table().to_string();
        let mut feed = self
            .backend
            .subscribe(&table, ChangeEventFilter::All)
            .await
            .map_err(|e| StudyError::Subscription(e.to_string()))?;

        let cancel = CancellationToken::new();
        let listener = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = listener.cancelled() => break,
                    event = feed.next() => event,
                };
                match event {
                    // a release racing with delivery wins
                    Some(event) if !listener.is_cancelled() => on_change(event),
                    Some(_) => break,
                    None => {
                        tracing::debug!("Change feed closed by backend");
                        break;
                    }
                }
            }
            feed.close();
        });

        tracing::debug!(%table, "Subscribed to session changes");
        Ok(Subscription {
            table,
            cancel,
            handle: Some(handle),
        })
    }

    /// Record that `user_id` joined `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::DuplicateJoin`] when the pair already exists and
    /// [`StudyError::Join`] for every other failure
    pub async fn join(&self, session_id: Uuid, user_id: Uuid) -> Result<(), StudyError> {
        let participation = Participation {
            session_id,
            user_id,
        };
        match self.backend.insert_participation(&participation).await {
            Ok(()) => {
                tracing::info!(%session_id, %user_id, "Joined study session");
                Ok(())
            }
            Err(BackendError::UniqueViolation(message)) => {
                tracing::debug!(%session_id, %user_id, %message, "Duplicate join rejected");
                Err(StudyError::DuplicateJoin { session_id })
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Joining study session failed");
                Err(StudyError::Join(e.to_string()))
            }
        }
    }

    /// Create a study session owned by `new_session.created_by`
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Create`] when the insert fails
    pub async fn create(&self, new_session: &NewStudySession) -> Result<StudySession, StudyError> {
        let row = self
            .backend
            .insert_session(new_session)
            .await
            .map_err(|e| StudyError::Create(e.to_string()))?;
        tracing::info!(session_id = %row.id, title = %row.title, "Created study session");
        Ok(row.into())
    }
}

/// Live change subscription
///
/// Released exactly once: explicitly through [`Subscription::unsubscribe`],
/// or on drop for every other exit path.
#[derive(Debug)]
pub struct Subscription {
    table: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Detach the listener and wait until it has stopped.
    ///
    /// No change callback runs after this returns.
    pub async fn unsubscribe(mut self) {
        if let Some(handle) = self.release() {
            let _ = handle.await;
        }
    }

    fn release(&mut self) -> Option<JoinHandle<()>> {
        let handle = self.handle.take()?;
        self.cancel.cancel();
        tracing::debug!(table = %self.table, "Released session change subscription");
        Some(handle)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.release() {
            handle.abort();
        }
    }
}

/// Ticket identifying one load in issue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Client-side copy of the session list with latest-wins ordering
#[derive(Debug, Default, Clone)]
pub struct SessionListCache {
    sessions: Vec<StudySession>,
    issued: u64,
    applied: u64,
}

impl SessionListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a load about to start
    pub fn begin(&mut self) -> LoadTicket {
        self.issued += 1;
        LoadTicket(self.issued)
    }

    /// Apply a finished load. Returns `false` (and keeps the current list)
    /// when a newer load has already been applied.
    pub fn complete(&mut self, ticket: LoadTicket, sessions: Vec<StudySession>) -> bool {
        if ticket.0 <= self.applied {
            tracing::debug!(
                generation = ticket.0,
                applied = self.applied,
                "Discarding stale session list"
            );
            return false;
        }
        self.applied = ticket.0;
        self.sessions = sessions;
        true
    }

    pub fn sessions(&self) -> &[StudySession] {
        &self.sessions
    }

    /// Whether any load has been applied yet
    pub fn is_loaded(&self) -> bool {
        self.applied > 0
    }

    /// Whether loads are in flight that are newer than the applied one
    pub fn is_loading(&self) -> bool {
        self.issued > self.applied
    }

    pub fn applied_generation(&self) -> u64 {
        self.applied
    }
}
