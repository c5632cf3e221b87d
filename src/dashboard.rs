//! Dashboard controller
//!
//! Mounting a dashboard checks the auth session, subscribes to session
//! changes and performs the initial load. The mounted dashboard owns the
//! subscription and the cached list; every user-visible outcome (load
//! failure, join result, creation result) is reported through the
//! [`Notifier`] exactly once.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use studydash::auth::{StaticAuth, User};
//! use studydash::backend::InMemoryBackend;
//! use studydash::dashboard::{Dashboard, MountOutcome};
//! use studydash::notify::RecordingNotifier;
//!
//! # #[tokio::main]
//! # async fn main() -> studydash::error::Result<()> {
//! let backend = Arc::new(InMemoryBackend::new());
//! backend.seed_session("Calculus", "1 hour", 2);
//! let auth = Arc::new(StaticAuth::signed_in(User { id: uuid::Uuid::new_v4(), email: None }));
//!
//! let MountOutcome::Mounted(dashboard) =
//!     Dashboard::mount(backend, auth, Arc::new(RecordingNotifier::default())).await?
//! else {
//!     unreachable!("signed in");
//! };
//! assert_eq!(dashboard.stats().total_sessions, 1);
//! dashboard.teardown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{AuthProvider, User};
use crate::backend::{Backend, ChangeEvent};
use crate::error::{Result, StudyError};
use crate::notify::{Notification, Notifier};
use crate::sessions::{
    NewStudySession, SessionListCache, SessionSynchronizer, StudySession, Subscription,
};

/// Result of [`Dashboard::mount`]
#[derive(Debug)]
pub enum MountOutcome {
    /// No auth session; the caller should send the user to sign in
    Unauthenticated,
    Mounted(MountedDashboard),
}

/// Result of [`MountedDashboard::join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    Failed,
    /// No signed-in user; nothing was sent to the backend
    Unauthenticated,
}

/// Result of [`MountedDashboard::create_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(StudySession),
    /// Title missing or blank; nothing was sent to the backend
    Invalid,
    Failed,
    Unauthenticated,
}

/// Summary figures shown next to the session list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub total_sessions: usize,
}

/// Entry point for mounting a dashboard
pub struct Dashboard;

impl Dashboard {
    /// Mount a dashboard for the current auth session.
    ///
    /// Without an auth session no backend request is made and
    /// [`MountOutcome::Unauthenticated`] is returned. The change feed is
    /// opened before the initial load so no change committed during the load
    /// is missed. A failed initial load is reported through `notifier` and
    /// leaves the list empty.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Subscription`] if the change feed cannot be
    /// opened
    pub async fn mount(
        backend: Arc<dyn Backend>,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<MountOutcome> {
        if !has_session(auth.as_ref()).await {
            return Ok(MountOutcome::Unauthenticated);
        }

        let mut dashboard = MountedDashboard::new(backend, auth, notifier);
        dashboard.subscribe().await?;
        dashboard.refresh().await;
        tracing::info!(
            sessions = dashboard.stats().total_sessions,
            "Dashboard mounted"
        );
        Ok(MountOutcome::Mounted(dashboard))
    }

    /// Like [`Dashboard::mount`] but without a change subscription, for
    /// one-shot commands. [`MountedDashboard::next_change`] returns `None`
    /// right away.
    pub async fn open(
        backend: Arc<dyn Backend>,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> MountOutcome {
        if !has_session(auth.as_ref()).await {
            return MountOutcome::Unauthenticated;
        }

        let dashboard = MountedDashboard::new(backend, auth, notifier);
        dashboard.refresh().await;
        MountOutcome::Mounted(dashboard)
    }
}

/// Read the auth session, refreshing it when expired. Errors count as no session.
async fn has_session(auth: &dyn AuthProvider) -> bool {
    match auth.get_session().await {
        Ok(Some(_)) => true,
        Ok(None) => {
            tracing::info!("No auth session, dashboard not mounted");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not read auth session");
            false
        }
    }
}

/// A dashboard with a live subscription
#[derive(Debug)]
pub struct MountedDashboard {
    sync: SessionSynchronizer,
    auth: Arc<dyn AuthProvider>,
    notifier: Arc<dyn Notifier>,
    cache: Mutex<SessionListCache>,
    in_flight: AtomicUsize,
    subscription: Option<Subscription>,
    changes: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl MountedDashboard {
    fn new(
        backend: Arc<dyn Backend>,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (_, changes) = mpsc::unbounded_channel();
        Self {
            sync: SessionSynchronizer::new(backend),
            auth,
            notifier,
            cache: Mutex::new(SessionListCache::new()),
            in_flight: AtomicUsize::new(0),
            subscription: None,
            changes,
        }
    }

    fn cache(&self) -> MutexGuard<'_, SessionListCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reload the list. Returns whether this load's result was applied.
    ///
    /// The auth session is read first so an expired access token is renewed
    /// before the request; without a session nothing is loaded. A result
    /// older than the newest applied one is discarded. On failure the
    /// previous list is kept and the load error is notified.
    pub async fn refresh(&self) -> bool {
        match self.auth.get_session().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!("Auth session ended, skipping session list load");
                return false;
            }
            // the load reports its own failure if the old token is rejected
            Err(e) => tracing::warn!(error = %e, "Could not renew auth session"),
        }

        let ticket = self.cache().begin();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.sync.load().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(sessions) => {
                let applied = self.cache().complete(ticket, sessions);
                tracing::debug!(
                    generation = ticket.generation(),
                    applied,
                    "Session list load finished"
                );
                applied
            }
            Err(e) => {
                tracing::warn!(
                    generation = ticket.generation(),
                    error = %e,
                    "Session list load failed"
                );
                self.notifier.notify(Notification::load_failed());
                false
            }
        }
    }

    async fn subscribe(&mut self) -> Result<()> {
        let (change_tx, changes) = mpsc::unbounded_channel();
        let subscription = self
            .sync
            .subscribe(move |event| {
                // receiver gone means the dashboard is being torn down
                let _ = change_tx.send(event);
            })
            .await?;
        self.changes = changes;
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Whether any load has succeeded since mounting
    pub fn is_loaded(&self) -> bool {
        self.cache().is_loaded()
    }

    /// Whether a load is currently in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Wait for the next change on the sessions table.
    ///
    /// Returns `None` once the change feed has ended.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        self.changes.recv().await
    }

    pub fn sessions(&self) -> Vec<StudySession> {
        self.cache().sessions().to_vec()
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            total_sessions: self.cache().sessions().len(),
        }
    }

    async fn current_user(&self) -> Option<User> {
        match self.auth.get_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve current user");
                None
            }
        }
    }

    /// Join `session_id` as the signed-in user.
    ///
    /// Emits exactly one notification unless there is no signed-in user. The
    /// cached list is not touched.
    pub async fn join(&self, session_id: Uuid) -> JoinOutcome {
        let Some(user) = self.current_user().await else {
            return JoinOutcome::Unauthenticated;
        };

        match self.sync.join(session_id, user.id).await {
            Ok(()) => {
                self.notifier.notify(Notification::joined());
                JoinOutcome::Joined
            }
            Err(StudyError::DuplicateJoin { .. }) => {
                self.notifier.notify(Notification::already_joined());
                JoinOutcome::AlreadyJoined
            }
            Err(_) => {
                self.notifier.notify(Notification::join_failed());
                JoinOutcome::Failed
            }
        }
    }

    /// Create a session owned by the signed-in user
    pub async fn create_session(&self, title: &str, duration: &str) -> CreateOutcome {
        let title = title.trim();
        if title.is_empty() {
            tracing::debug!("Rejected session without title");
            self.notifier
                .notify(Notification::error("Error", "A session title is required"));
            return CreateOutcome::Invalid;
        }

        let Some(user) = self.current_user().await else {
            return CreateOutcome::Unauthenticated;
        };

        let new_session = NewStudySession {
            title: title.to_string(),
            duration: duration.trim().to_string(),
            created_by: user.id,
        };
        match self.sync.create(&new_session).await {
            Ok(session) => {
                self.notifier.notify(Notification::created());
                CreateOutcome::Created(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Creating study session failed");
                self.notifier.notify(Notification::create_failed());
                CreateOutcome::Failed
            }
        }
    }

    /// Release the change subscription and wait for its listener to stop
    pub async fn teardown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
        self.changes.close();
        tracing::debug!("Dashboard torn down");
    }
}
