//! Auth session persistence via OS keyring
//!
//! The signed-in [`AuthSession`] is serialized to JSON and kept in the
//! operating system's credential store (Keychain, Secret Service, Windows
//! Credential Manager) so the CLI stays signed in between runs.

use crate::auth::AuthSession;
use crate::error::{Result, StudyError};

/// Account name under which the session is stored
const ACCOUNT: &str = "auth-session";

/// Keyring accessor for the persisted auth session
///
/// # Examples
///
/// ```no_run
/// use studydash::auth::SessionStore;
///
/// # fn example() -> studydash::error::Result<()> {
/// let store = SessionStore::new("studydash");
/// if let Some(session) = store.load()? {
///     println!("signed in as {}", session.user.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionStore {
    service: String,
}

impl SessionStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, ACCOUNT).map_err(|e| StudyError::Keyring(e).into())
    }

    /// Persist `session`, replacing any stored one
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Serialization`] or [`StudyError::Keyring`]
    pub fn save(&self, session: &AuthSession) -> Result<()> {
        let json = serde_json::to_string(session).map_err(StudyError::Serialization)?;
        self.entry()?
            .set_password(&json)
            .map_err(StudyError::Keyring)?;
        Ok(())
    }

    /// Load the stored session; `Ok(None)` when nothing was saved
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Keyring`] for credential store failures and
    /// [`StudyError::Serialization`] when the stored JSON is malformed
    pub fn load(&self) -> Result<Option<AuthSession>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let session =
                    serde_json::from_str(&json).map_err(StudyError::Serialization)?;
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StudyError::Keyring(e).into()),
        }
    }

    /// Remove the stored session. No-op when nothing was saved.
    pub fn delete(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StudyError::Keyring(e).into()),
        }
    }
}
