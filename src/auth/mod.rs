//! Authentication provider abstraction
//!
//! The dashboard only needs to know whether someone is signed in and who
//! they are. [`AuthProvider`] exposes exactly that plus sign-in/out and an
//! auth-state change stream. Implementations:
//!
//! - [`rest::RestAuth`] -- GoTrue-style password and refresh-token grants.
//! - [`StaticAuth`] -- a fixed user (or nobody), for tests and offline use.
//!
//! [`Credentials`] is the shared slot through which the auth provider hands
//! the current access token to the store client.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::BackendError;

pub mod rest;
pub mod session_store;

pub use rest::RestAuth;
pub use session_store::SessionStore;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub token_type: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub user: User,
}

impl AuthSession {
    /// Expired, or expiring within the next 60 seconds
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => Utc::now() >= expires_at - chrono::Duration::seconds(60),
        }
    }
}

/// Auth state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(User),
    TokenRefreshed,
    SignedOut,
}

/// Source of the current auth session and user
#[async_trait]
pub trait AuthProvider: Send + Sync + std::fmt::Debug {
    /// Current session, `None` when signed out or no longer refreshable
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError>;

    /// Current user as confirmed by the auth service
    async fn get_user(&self) -> Result<Option<User>, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Stream of auth state changes after this call
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Shared slot holding the access token used for store requests
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    access_token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    pub fn set(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Auth provider with a fixed user
///
/// # Examples
///
/// ```
/// use studydash::auth::{AuthProvider, StaticAuth};
///
/// # tokio_test::block_on(async {
/// let auth = StaticAuth::signed_out();
/// assert!(auth.get_session().await.unwrap().is_none());
/// # });
/// ```
#[derive(Debug)]
pub struct StaticAuth {
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl StaticAuth {
    pub fn signed_in(user: User) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: RwLock::new(Some(AuthSession {
                access_token: format!("static-{}", user.id),
                token_type: "bearer".to_string(),
                expires_at: None,
                refresh_token: None,
                user,
            })),
            events,
        }
    }

    pub fn signed_out() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: RwLock::new(None),
            events,
        }
    }

    fn current(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError> {
        Ok(self.current())
    }

    async fn get_user(&self) -> Result<Option<User>, BackendError> {
        Ok(self.current().map(|s| s.user))
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthSession, BackendError> {
        self.current()
            .ok_or_else(|| BackendError::Unauthorized("invalid login credentials".to_string()))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
