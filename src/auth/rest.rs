//! GoTrue-style auth over HTTP
//!
//! - `POST /auth/v1/token?grant_type=password` signs in
//! - `POST /auth/v1/token?grant_type=refresh_token` renews an expired session
//! - `GET /auth/v1/user` confirms the current user
//! - `POST /auth/v1/logout` revokes the session
//!
//! Every change of the current session is mirrored into the shared
//! [`Credentials`] and, when a [`SessionStore`] is configured, the keyring.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, RwLock};

use crate::auth::{AuthEvent, AuthProvider, AuthSession, Credentials, SessionStore, User};
use crate::backend::rest::{error_from_response, transport_error};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result, StudyError};

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| {
                token
                    .expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_at,
            refresh_token: token.refresh_token,
            user: token.user,
        }
    }
}

/// HTTP [`AuthProvider`]
#[derive(Debug)]
pub struct RestAuth {
    client: Client,
    config: BackendConfig,
    credentials: Credentials,
    store: Option<SessionStore>,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl RestAuth {
    /// Create an auth client sharing `credentials` with the store client
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Config` if the HTTP client cannot be built
    pub fn new(
        config: &BackendConfig,
        credentials: Credentials,
        store: Option<SessionStore>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("studydash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StudyError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            client,
            config: config.clone(),
            credentials,
            store,
            session: RwLock::new(None),
            events,
        })
    }

    /// Load a previously persisted session from the keyring.
    ///
    /// Returns whether a session was restored. Keyring failures are logged
    /// and treated as "nothing stored".
    pub async fn restore(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.load() {
            Ok(Some(session)) => {
                tracing::debug!(user_id = %session.user.id, "Restored persisted auth session");
                self.credentials.set(Some(session.access_token.clone()));
                *self.session.write().await = Some(session);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted auth session");
                false
            }
        }
    }

    fn endpoint(&self, path: &str) -> std::result::Result<url::Url, BackendError> {
        self.config
            .endpoint(path)
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    async fn install(&self, session: Option<AuthSession>) {
        self.credentials
            .set(session.as_ref().map(|s| s.access_token.clone()));

        if let Some(store) = &self.store {
            let result = match &session {
                Some(s) => store.save(s),
                None => store.delete(),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "Could not persist auth session");
            }
        }

        *self.session.write().await = session;
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> std::result::Result<AuthSession, BackendError> {
        let url = self.endpoint("/auth/v1/token")?;
        let response = self
            .client
            .post(url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // invalid_grant comes back as 400
            return Err(match error_from_response(response).await {
                BackendError::Status { status: 400, message } => {
                    BackendError::Unauthorized(message)
                }
                other => other,
            });
        }

        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        Ok(token.into())
    }

    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<AuthSession, BackendError> {
        let session = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        tracing::debug!(user_id = %session.user.id, "Refreshed auth session");
        self.install(Some(session.clone())).await;
        let _ = self.events.send(AuthEvent::TokenRefreshed);
        Ok(session)
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    async fn get_session(&self) -> std::result::Result<Option<AuthSession>, BackendError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::debug!("Auth session expired without refresh token");
            self.install(None).await;
            let _ = self.events.send(AuthEvent::SignedOut);
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(BackendError::Unauthorized(message)) => {
                tracing::info!(%message, "Refresh token rejected, signing out");
                self.install(None).await;
                let _ = self.events.send(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self) -> std::result::Result<Option<User>, BackendError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let url = self.endpoint("/auth/v1/user")?;
        let response = self
            .client
            .get(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => {
                Ok(Some(response.json().await.map_err(transport_error)?))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<AuthSession, BackendError> {
        let session = self
            .token_grant(
                "password",
                json!({ "email": email, "password": password }),
            )
            .await?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.install(Some(session.clone())).await;
        let _ = self.events.send(AuthEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> std::result::Result<(), BackendError> {
        let current = self.session.read().await.clone();
        if let Some(session) = current {
            let url = self.endpoint("/auth/v1/logout")?;
            let result = self
                .client
                .post(url)
                .header("apikey", &self.config.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            // the local session is dropped regardless of what the server says
            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Logout not acknowledged");
                }
                Err(e) => tracing::debug!(error = %e, "Logout request failed"),
                Ok(_) => {}
            }
        }

        self.install(None).await;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
