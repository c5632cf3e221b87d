/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `sessions`: list, create and join study sessions
- `watch`: live dashboard
- `timer`: interactive stopwatch and elapsed-time formatting
- `auth`: sign in, sign out, status

Handlers that talk to the backend go through [`connect`], which wires the
REST store and auth clients to one shared access token and restores a
persisted session first.
*/

use std::sync::Arc;

use colored::Colorize;

use crate::auth::{Credentials, RestAuth, SessionStore};
use crate::backend::RestBackend;
use crate::config::Config;
use crate::error::Result;

pub mod auth;
pub mod sessions;
pub mod timer;
pub mod watch;

/// Backend and auth clients sharing one access token
pub struct Connection {
    pub backend: Arc<RestBackend>,
    pub auth: Arc<RestAuth>,
}

/// Build the REST clients for `config` and restore a persisted session.
///
/// # Errors
///
/// Returns `StudyError::Config` when the anon key is missing or an HTTP
/// client cannot be built
pub async fn connect(config: &Config) -> Result<Connection> {
    let credentials = Credentials::default();
    let store = config
        .auth
        .persist_session
        .then(|| SessionStore::new(config.auth.keyring_service.clone()));

    let auth = RestAuth::new(&config.backend, credentials.clone(), store)?;
    if auth.restore().await {
        tracing::debug!("Using persisted auth session");
    }
    let backend = RestBackend::new(&config.backend, credentials)?;

    Ok(Connection {
        backend: Arc::new(backend),
        auth: Arc::new(auth),
    })
}

pub(crate) fn print_sign_in_hint() {
    eprintln!(
        "{} run `{}` first",
        "Not signed in:".yellow().bold(),
        "studydash auth login".bold()
    );
}
