//! PostgREST-style HTTP store
//!
//! Tables are exposed under `/rest/v1/<table>`. Every request carries the
//! project's `apikey` header and a bearer token: the signed-in user's access
//! token when one is available, the anon key otherwise. Uniqueness violations
//! surface as HTTP 409 with SQLSTATE `23505` in the error body.
//!
//! The change feed is a long-lived `text/event-stream` GET against the
//! configured realtime path, decoded by [`crate::backend::realtime`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::Credentials;
use crate::backend::realtime::{pump_change_stream, FeedScope};
use crate::backend::{Backend, ChangeEventFilter, ChangeFeed};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result, StudyError};
use crate::sessions::models::{NewStudySession, Participation, SessionRow};

/// SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Error body returned by the REST layer
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    /// auth endpoints use `msg` / `error_description`
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl RestErrorBody {
    fn text(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .map(|m| match &self.details {
                Some(details) => format!("{} ({})", m, details),
                None => m,
            })
    }
}

/// Turn a non-success response into a [`BackendError`]
pub(crate) async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let raw = response.text().await.unwrap_or_default();
    let body: RestErrorBody = serde_json::from_str(&raw).unwrap_or_default();
    let message = body.text().unwrap_or_else(|| {
        if raw.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            raw.clone()
        }
    });

    if body.code.as_deref() == Some(UNIQUE_VIOLATION) {
        return BackendError::UniqueViolation(message);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        _ => BackendError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Decode(e.to_string())
    } else {
        BackendError::Transport(e.to_string())
    }
}

/// HTTP [`Backend`] for a hosted PostgREST API
///
/// # Examples
///
/// ```no_run
/// use studydash::auth::Credentials;
/// use studydash::backend::{Backend, RestBackend};
/// use studydash::config::BackendConfig;
///
/// # async fn example() -> studydash::error::Result<()> {
/// let config = BackendConfig {
///     url: "https://project.example.com".to_string(),
///     anon_key: "public-anon-key".to_string(),
///     ..BackendConfig::default()
/// };
/// let backend = RestBackend::new(&config, Credentials::default())?;
/// let rows = backend.fetch_sessions().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RestBackend {
    client: Client,
    /// No total timeout: the change feed stays open indefinitely
    stream_client: Client,
    config: BackendConfig,
    credentials: Credentials,
}

impl RestBackend {
    /// Create a REST backend
    ///
    /// # Errors
    ///
    /// Returns `StudyError::Config` if the anon key is missing or the HTTP
    /// clients cannot be built
    pub fn new(config: &BackendConfig, credentials: Credentials) -> Result<Self> {
        if config.anon_key.trim().is_empty() {
            return Err(StudyError::Config(
                "backend.anon_key is required (set it in the config file or STUDYDASH_ANON_KEY)"
                    .to_string(),
            )
            .into());
        }

        let timeout = Duration::from_secs(config.request_timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("studydash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StudyError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let stream_client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("studydash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StudyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(url = %config.url, "Initialized REST backend");

        Ok(Self {
            client,
            stream_client,
            config: config.clone(),
            credentials,
        })
    }

    fn table_url(&self, table: &str) -> std::result::Result<url::Url, BackendError> {
        self.config
            .endpoint(&format!("/rest/v1/{}", table))
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .credentials
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    /// `select` expression embedding the participant aggregate under the
    /// `session_participants` key regardless of the join table's name
    pub fn sessions_select(&self) -> String {
        format!(
            "*,session_participants:{}(count)",
            self.config.participants_table
        )
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, BackendError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn fetch_sessions(&self) -> std::result::Result<Vec<SessionRow>, BackendError> {
        let url = self.table_url(&self.config.sessions_table)?;
        let select = self.sessions_select();
        tracing::debug!(%url, %select, "Fetching study sessions");

        let response = self
            .send(
                self.client
                    .get(url)
                    .query(&[("select", select.as_str())])
                    .header("Accept", "application/json"),
            )
            .await?;

        response.json().await.map_err(transport_error)
    }

    async fn insert_session(
        &self,
        session: &NewStudySession,
    ) -> std::result::Result<SessionRow, BackendError> {
        let url = self.table_url(&self.config.sessions_table)?;
        let response = self
            .send(
                self.client
                    .post(url)
                    .header("Prefer", "return=representation")
                    .json(&[session]),
            )
            .await?;

        let rows: Vec<SessionRow> = response.json().await.map_err(transport_error)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("insert returned no rows".to_string()))
    }

    async fn insert_participation(
        &self,
        participation: &Participation,
    ) -> std::result::Result<(), BackendError> {
        let url = self.table_url(&self.config.participants_table)?;
        tracing::debug!(
            session_id = %participation.session_id,
            user_id = %participation.user_id,
            "Inserting participation"
        );
        self.send(
            self.client
                .post(url)
                .header("Prefer", "return=minimal")
                .json(&[participation]),
        )
        .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        table: &str,
        events: ChangeEventFilter,
    ) -> std::result::Result<ChangeFeed, BackendError> {
        let url = self
            .config
            .endpoint(&self.config.realtime_path)
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let event_param = events.to_string();

        let response = self
            .send(
                self.stream_client
                    .get(url)
                    .query(&[("table", table), ("event", event_param.as_str())])
                    .header("Accept", "text/event-stream"),
            )
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let scope = FeedScope {
            table: table.to_string(),
            events,
        };

        tokio::spawn(pump_change_stream(
            response.bytes_stream(),
            tx,
            scope,
            cancel.clone(),
        ));

        tracing::debug!(table, events = %event_param, "Change feed opened");
        Ok(ChangeFeed::new(rx).with_release(cancel))
    }

    fn sessions_table(&self) -> &str {
        &self.config.sessions_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        crate::test_utils::test_config("http://localhost:54321").backend
    }

    #[test]
    fn test_new_requires_anon_key() {
        let err = RestBackend::new(&BackendConfig::default(), Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("anon_key"));
    }

    #[test]
    fn test_sessions_select_aliases_aggregate() {
        let mut config = config();
        config.participants_table = "members".to_string();
        let backend = RestBackend::new(&config, Credentials::default()).unwrap();
        assert_eq!(backend.sessions_select(), "*,session_participants:members(count)");
    }

    #[test]
    fn test_error_body_text_prefers_message_with_details() {
        let body: RestErrorBody = serde_json::from_str(
            r#"{"code":"23505","message":"duplicate key","details":"Key exists"}"#,
        )
        .unwrap();
        assert_eq!(body.text().unwrap(), "duplicate key (Key exists)");
    }
}
