//! Driven port for the medium that holds the signed-in session.
//!
//! The domain [`CredentialStore`](crate::domain::CredentialStore) is the only
//! caller; everything else reads credentials through it.

use std::sync::RwLock;

use super::define_port_error;
use crate::domain::StoredSession;

define_port_error! {
    /// Errors surfaced by credential storage adapters.
    pub enum CredentialStorageError {
        /// The medium could not be read or written.
        Unavailable { message: String } => "credential storage unavailable: {message}",
        /// Stored content could not be decoded.
        Corrupt { message: String } => "credential storage corrupt: {message}",
    }
}

/// Raw persistence for one [`StoredSession`].
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStorage: Send + Sync {
    /// Read the stored session, if any.
    fn read(&self) -> Result<Option<StoredSession>, CredentialStorageError>;

    /// Replace the stored session wholesale.
    fn write(&self, session: &StoredSession) -> Result<(), CredentialStorageError>;

    /// Remove the stored session. Erasing an empty medium succeeds.
    fn erase(&self) -> Result<(), CredentialStorageError>;
}

/// Process-local storage used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStorage {
    slot: RwLock<Option<StoredSession>>,
}

impl InMemoryCredentialStorage {
    /// Storage pre-populated with `session`.
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            slot: RwLock::new(Some(session)),
        }
    }
}

fn poisoned<T>(_: T) -> CredentialStorageError {
    CredentialStorageError::unavailable("in-memory slot poisoned")
}

impl CredentialStorage for InMemoryCredentialStorage {
    fn read(&self) -> Result<Option<StoredSession>, CredentialStorageError> {
        Ok(self.slot.read().map_err(poisoned)?.clone())
    }

    fn write(&self, session: &StoredSession) -> Result<(), CredentialStorageError> {
        *self.slot.write().map_err(poisoned)? = Some(session.clone());
        Ok(())
    }

    fn erase(&self) -> Result<(), CredentialStorageError> {
        self.slot.write().map_err(poisoned)?.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{CredentialPair, CredentialPolicy, Identity};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn session() -> StoredSession {
        let now = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("valid time");
        CredentialPolicy::default().stamp(
            CredentialPair::try_new("a", "r").expect("valid pair"),
            Identity {
                id: 1,
                username: "ada".to_owned(),
                email: None,
            },
            now,
        )
    }

    #[rstest]
    fn in_memory_storage_round_trips_and_erases() {
        let storage = InMemoryCredentialStorage::default();
        assert_eq!(storage.read().expect("read"), None);

        storage.write(&session()).expect("write");
        assert_eq!(storage.read().expect("read"), Some(session()));

        storage.erase().expect("erase");
        storage.erase().expect("erasing twice is fine");
        assert_eq!(storage.read().expect("read"), None);
    }
}
