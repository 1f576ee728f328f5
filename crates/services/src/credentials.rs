//! Durable persistence for the session token and cached user, so a page
//! reload can rehydrate optimistically before server validation completes.
//!
//! The persisted record carries explicit cookie-style attributes (expiry,
//! path, `SameSite`, `Secure`); expired records are treated as absent.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use cert_core::model::{AuthToken, User};

use crate::error::CredentialStoreError;

//
// ─── PERSISTED SHAPE ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Cookie attributes attached to the persisted credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieAttributes {
    pub expires_at: DateTime<Utc>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
}

impl CookieAttributes {
    /// The standard attribute set: 7-day expiry, `path=/`, `SameSite=Lax`,
    /// `Secure`.
    #[must_use]
    pub fn standard(now: DateTime<Utc>) -> Self {
        Self {
            expires_at: now + Duration::days(7),
            path: "/".to_string(),
            same_site: SameSite::Lax,
            secure: true,
        }
    }
}

/// Serialized session credentials, cookie-equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCredentials {
    pub token: AuthToken,
    pub user: User,
    pub attributes: CookieAttributes,
}

impl PersistedCredentials {
    #[must_use]
    pub fn new(token: AuthToken, user: User, attributes: CookieAttributes) -> Self {
        Self {
            token,
            user,
            attributes,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.attributes.expires_at
    }
}

//
// ─── STORE CONTRACT ────────────────────────────────────────────────────────────
//

/// Durable per-client store for session credentials.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted credentials, `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `CredentialStoreError` if the backing store cannot be read
    /// or the stored bytes do not decode.
    fn load(&self) -> Result<Option<PersistedCredentials>, CredentialStoreError>;

    /// Persist credentials, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns `CredentialStoreError` if the record cannot be written.
    fn save(&self, credentials: &PersistedCredentials) -> Result<(), CredentialStoreError>;

    /// Remove any persisted credentials. Clearing an empty store is fine.
    ///
    /// # Errors
    ///
    /// Returns `CredentialStoreError` if the backing store cannot be
    /// modified.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

//
// ─── IN-MEMORY STORE ───────────────────────────────────────────────────────────
//

/// Volatile store for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    slot: Mutex<Option<PersistedCredentials>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<Option<PersistedCredentials>, CredentialStoreError> {
        Ok(self.slot.lock().expect("credential slot poisoned").clone())
    }

    fn save(&self, credentials: &PersistedCredentials) -> Result<(), CredentialStoreError> {
        *self.slot.lock().expect("credential slot poisoned") = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        *self.slot.lock().expect("credential slot poisoned") = None;
        Ok(())
    }
}

//
// ─── FILE STORE ────────────────────────────────────────────────────────────────
//

/// JSON-file-backed store, the durable cookie equivalent for a native
/// client.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<PersistedCredentials>, CredentialStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, credentials: &PersistedCredentials) -> Result<(), CredentialStoreError> {
        let bytes = serde_json::to_vec_pretty(credentials)?;
        // write-then-rename so a crash never leaves a truncated record
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use cert_core::model::UserId;
    use cert_core::time::fixed_now;

    fn build_credentials() -> PersistedCredentials {
        PersistedCredentials::new(
            AuthToken::new("tok-1"),
            User {
                id: UserId::new("u-1"),
                email: "dev@example.com".into(),
                name: None,
                image: None,
            },
            CookieAttributes::standard(fixed_now()),
        )
    }

    #[test]
    fn standard_attributes_expire_after_seven_days() {
        let creds = build_credentials();
        assert!(!creds.is_expired(fixed_now()));
        assert!(!creds.is_expired(fixed_now() + Duration::days(7) - Duration::seconds(1)));
        assert!(creds.is_expired(fixed_now() + Duration::days(7)));
        assert_eq!(creds.attributes.path, "/");
        assert_eq!(creds.attributes.same_site, SameSite::Lax);
        assert!(creds.attributes.secure);
    }

    #[test]
    fn in_memory_store_round_trips_and_clears() {
        let store = InMemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());

        let creds = build_credentials();
        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), Some(creds));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let path = std::env::temp_dir().join(format!(
            "certquiz-credentials-test-{}.json",
            std::process::id()
        ));
        let store = FileCredentialStore::new(&path);
        let _ = store.clear();

        assert!(store.load().unwrap().is_none());
        let creds = build_credentials();
        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), Some(creds));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
