//! Session store: the single authenticated identity for this client.
//!
//! Login checks a fixed administrator credential pair. The session is
//! persisted locally and is the only record of authentication; there is
//! no server-side session.

use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::local_store::{LocalStore, StorageKey, StoreError};
use crate::models::{Credentials, Role, Session};
use crate::outcome::OpOutcome;

pub const ADMIN_EMAIL: &str = "admin@medlinkx.com";
const ADMIN_PASSWORD: &str = "admin123";
const ADMIN_DISPLAY_NAME: &str = "System Administrator";
const ADMIN_DEPARTMENT: &str = "Administration";

/// Message returned for any rejected credential pair.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("Session encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Internal lock error")]
    LockPoisoned,
}

pub struct SessionStore {
    store: Arc<dyn LocalStore>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Check credentials and open a session.
    ///
    /// Rejected credentials are a failed outcome, not an error; `Err` is
    /// reserved for storage failures. A rejection leaves any existing
    /// persisted state untouched.
    pub fn login(&self, credentials: &Credentials) -> Result<OpOutcome<Session>, SessionError> {
        if !credentials_match(credentials) {
            tracing::info!("Login rejected");
            return Ok(OpOutcome::failed(INVALID_CREDENTIALS));
        }

        let session = Session {
            id: Uuid::new_v4(),
            email: ADMIN_EMAIL.to_string(),
            display_name: ADMIN_DISPLAY_NAME.to_string(),
            role: Role::Administrator,
            department: ADMIN_DEPARTMENT.to_string(),
            logged_in_at: chrono::Utc::now(),
        };
        self.store
            .set(StorageKey::Session, &serde_json::to_string(&session)?)?;

        let mut current = self.current.write().map_err(|_| SessionError::LockPoisoned)?;
        *current = Some(session.clone());
        tracing::info!(session_id = %session.id, role = %session.role, "Login succeeded");
        Ok(OpOutcome::ok(session))
    }

    /// Clear the persisted and in-memory session. Idempotent.
    pub fn logout(&self) -> Result<(), SessionError> {
        let mut current = self.current.write().map_err(|_| SessionError::LockPoisoned)?;
        let had_session = current.take().is_some();
        self.store.remove(StorageKey::Session)?;
        if had_session {
            tracing::info!("Logged out");
        }
        Ok(())
    }

    /// Restore a persisted session.
    ///
    /// A value that does not parse is removed and the store proceeds as
    /// logged out; corruption is never surfaced to the user.
    pub fn restore_on_startup(&self) -> Result<Option<Session>, SessionError> {
        let restored = match self.store.get(StorageKey::Session)? {
            None => None,
            Some(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Discarding corrupted persisted session: {e}");
                    self.store.remove(StorageKey::Session)?;
                    None
                }
            },
        };

        let mut current = self.current.write().map_err(|_| SessionError::LockPoisoned)?;
        *current = restored.clone();
        if let Some(session) = &restored {
            tracing::info!(session_id = %session.id, "Session restored");
        }
        Ok(restored)
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

/// Compare against the fixed pair. Emails are case-insensitive; passwords
/// are compared as SHA-256 digests in constant time.
fn credentials_match(credentials: &Credentials) -> bool {
    let email_ok = credentials.email.trim().eq_ignore_ascii_case(ADMIN_EMAIL);
    let supplied = Sha256::digest(credentials.password().as_bytes());
    let expected = Sha256::digest(ADMIN_PASSWORD.as_bytes());
    let password_ok: bool = supplied.as_slice().ct_eq(expected.as_slice()).into();
    email_ok & password_ok
}
