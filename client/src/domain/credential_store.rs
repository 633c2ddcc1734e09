//! Single owner of the signed-in session.
//!
//! Every other component reads and writes credentials through
//! [`CredentialStore`]; nothing caches a token beyond one outbound call.
//!
//! ## Invariants
//! - Writes go through to storage and the in-memory copy under one write
//!   lock, so readers never see a value older than the last completed write.
//! - `load` never fails: unreadable or corrupt storage reads as "signed out".
//! - A session whose refresh credential has lapsed is pruned on first read.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::ports::{CredentialStorage, CredentialStorageError};
use crate::domain::{CredentialPair, CredentialPolicy, Error, Identity, StoredSession};

#[derive(Debug, Clone)]
enum Cached {
    Unloaded,
    Loaded(Option<StoredSession>),
}

/// Coherent, policy-aware access to the stored credentials.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use client::domain::ports::InMemoryCredentialStorage;
/// use client::domain::{CredentialPair, CredentialPolicy, CredentialStore, Identity};
/// use mockable::DefaultClock;
///
/// let store = CredentialStore::new(
///     Arc::new(InMemoryCredentialStorage::default()),
///     Arc::new(DefaultClock),
///     CredentialPolicy::default(),
/// );
/// let identity = Identity { id: 1, username: "ada".into(), email: None };
/// store.save(CredentialPair::try_new("a", "r").unwrap(), identity).unwrap();
/// assert!(store.is_authenticated());
/// assert!(store.clear());
/// assert!(store.load().is_none());
/// ```
pub struct CredentialStore {
    storage: Arc<dyn CredentialStorage>,
    clock: Arc<dyn Clock>,
    policy: CredentialPolicy,
    cache: RwLock<Cached>,
}

impl CredentialStore {
    /// Create a store over `storage`, stamping expiries with `policy`.
    pub fn new(
        storage: Arc<dyn CredentialStorage>,
        clock: Arc<dyn Clock>,
        policy: CredentialPolicy,
    ) -> Self {
        Self {
            storage,
            clock,
            policy,
            cache: RwLock::new(Cached::Unloaded),
        }
    }

    /// Persist a freshly issued pair together with the identity it belongs to.
    pub fn save(
        &self,
        credentials: CredentialPair,
        identity: Identity,
    ) -> Result<StoredSession, Error> {
        let session = self.policy.stamp(credentials, identity, self.clock.utc());
        let mut cache = self.write_cache();
        self.storage.write(&session).map_err(storage_error)?;
        *cache = Cached::Loaded(Some(session.clone()));
        debug!(user_id = session.identity.id, "credentials saved");
        Ok(session)
    }

    /// Overwrite the token pair, keeping the cached identity.
    ///
    /// Fails with [`ErrorCode::Unauthorized`](crate::domain::ErrorCode) when
    /// no session exists, e.g. because a logout raced the refresh.
    pub fn replace_credentials(&self, credentials: CredentialPair) -> Result<StoredSession, Error> {
        let now = self.clock.utc();
        let mut cache = self.write_cache();
        let identity = self
            .resolve(&mut cache, now)
            .map(|session| session.identity)
            .ok_or_else(|| Error::unauthorized("no active session to refresh"))?;
        let session = self.policy.stamp(credentials, identity, now);
        self.storage.write(&session).map_err(storage_error)?;
        *cache = Cached::Loaded(Some(session.clone()));
        debug!(user_id = session.identity.id, "credentials replaced");
        Ok(session)
    }

    /// Current token pair, if signed in.
    pub fn load(&self) -> Option<CredentialPair> {
        self.session().map(|session| session.credentials)
    }

    /// Cached identity, if signed in.
    pub fn identity(&self) -> Option<Identity> {
        self.session().map(|session| session.identity)
    }

    /// Full stored record, if signed in.
    pub fn session(&self) -> Option<StoredSession> {
        let now = self.clock.utc();
        {
            let cache = self.read_cache();
            if let Cached::Loaded(session) = &*cache {
                match session {
                    None => return None,
                    Some(session) if !session.is_refresh_expired(now) => {
                        return Some(session.clone());
                    }
                    Some(_) => {}
                }
            }
        }
        let mut cache = self.write_cache();
        self.resolve(&mut cache, now)
    }

    /// Whether an access credential is present.
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Remove the pair and the identity.
    ///
    /// Returns `true` when a session was present. The in-memory copy is
    /// dropped even if the medium cannot be erased.
    pub fn clear(&self) -> bool {
        let now = self.clock.utc();
        let mut cache = self.write_cache();
        let existed = self.resolve(&mut cache, now).is_some();
        if let Err(err) = self.storage.erase() {
            warn!(error = %err, "failed to erase stored credentials");
        }
        *cache = Cached::Loaded(None);
        if existed {
            info!("credentials cleared");
        }
        existed
    }

    fn resolve(&self, cache: &mut Cached, now: chrono::DateTime<chrono::Utc>) -> Option<StoredSession> {
        let session = match cache {
            Cached::Loaded(session) => session.clone(),
            Cached::Unloaded => self.read_storage(),
        };
        let session = match session {
            Some(session) if session.is_refresh_expired(now) => {
                info!(user_id = session.identity.id, "refresh credential expired; pruning session");
                if let Err(err) = self.storage.erase() {
                    warn!(error = %err, "failed to prune expired credentials");
                }
                None
            }
            other => other,
        };
        *cache = Cached::Loaded(session.clone());
        session
    }

    fn read_storage(&self) -> Option<StoredSession> {
        match self.storage.read() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "credential storage unreadable; treating as signed out");
                None
            }
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Cached> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Cached> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn storage_error(err: CredentialStorageError) -> Error {
    Error::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{InMemoryCredentialStorage, MockCredentialStorage};
    use crate::test_support::MutableClock;
    use chrono::{TimeDelta, TimeZone, Utc};
    use rstest::{fixture, rstest};

    fn identity() -> Identity {
        Identity {
            id: 7,
            username: "ada".to_owned(),
            email: Some("ada@example.com".to_owned()),
        }
    }

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair::try_new(access, refresh).expect("valid pair")
    }

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0)
                .single()
                .expect("valid time"),
        ))
    }

    fn store_over(storage: Arc<dyn CredentialStorage>, clock: Arc<MutableClock>) -> CredentialStore {
        CredentialStore::new(storage, clock, CredentialPolicy::default())
    }

    #[rstest]
    fn save_then_load_returns_the_pair(clock: Arc<MutableClock>) {
        let store = store_over(Arc::new(InMemoryCredentialStorage::default()), clock);
        store.save(pair("a1", "r1"), identity()).expect("save");

        let loaded = store.load().expect("pair present");
        assert_eq!(loaded.access_token(), "a1");
        assert_eq!(loaded.refresh_token(), "r1");
        assert_eq!(store.identity(), Some(identity()));
    }

    #[rstest]
    fn clear_removes_all_fields_and_reports_presence(clock: Arc<MutableClock>) {
        let storage = Arc::new(InMemoryCredentialStorage::default());
        let store = store_over(storage.clone(), clock);
        store.save(pair("a1", "r1"), identity()).expect("save");

        assert!(store.clear());
        assert!(!store.clear());
        assert!(store.load().is_none());
        assert!(store.identity().is_none());
        assert!(!store.is_authenticated());
        assert_eq!(storage.read().expect("read"), None);
    }

    #[rstest]
    fn replace_keeps_identity(clock: Arc<MutableClock>) {
        let store = store_over(Arc::new(InMemoryCredentialStorage::default()), clock);
        store.save(pair("a1", "r1"), identity()).expect("save");

        let session = store.replace_credentials(pair("a2", "r2")).expect("replace");
        assert_eq!(session.identity, identity());
        assert_eq!(store.load().expect("pair").access_token(), "a2");
    }

    #[rstest]
    fn replace_without_session_is_unauthorized(clock: Arc<MutableClock>) {
        let store = store_over(Arc::new(InMemoryCredentialStorage::default()), clock);
        let err = store
            .replace_credentials(pair("a2", "r2"))
            .expect_err("nothing to replace");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[rstest]
    fn expired_refresh_credential_is_pruned(clock: Arc<MutableClock>) {
        let storage = Arc::new(InMemoryCredentialStorage::default());
        let store = store_over(storage.clone(), clock.clone());
        store.save(pair("a1", "r1"), identity()).expect("save");

        clock.advance_seconds(TimeDelta::days(29).num_seconds());
        assert!(store.is_authenticated(), "access expiry alone keeps the session");

        clock.advance_seconds(TimeDelta::days(1).num_seconds());
        assert!(store.load().is_none());
        assert_eq!(storage.read().expect("read"), None);
    }

    #[rstest]
    fn corrupt_storage_reads_as_signed_out(clock: Arc<MutableClock>) {
        let mut storage = MockCredentialStorage::new();
        storage
            .expect_read()
            .times(1)
            .returning(|| Err(CredentialStorageError::corrupt("not json")));
        let store = store_over(Arc::new(storage), clock);

        assert!(store.load().is_none());
        assert!(store.load().is_none(), "cached after the first read");
    }

    #[rstest]
    fn save_surfaces_write_failures(clock: Arc<MutableClock>) {
        let mut storage = MockCredentialStorage::new();
        storage
            .expect_write()
            .returning(|_| Err(CredentialStorageError::unavailable("read-only")));
        storage.expect_read().returning(|| Ok(None));
        let store = store_over(Arc::new(storage), clock);

        let err = store
            .save(pair("a1", "r1"), identity())
            .expect_err("write fails");
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(store.load().is_none(), "failed write leaves no cached pair");
    }

    #[rstest]
    fn clear_drops_cache_even_when_erase_fails(clock: Arc<MutableClock>) {
        let mut storage = MockCredentialStorage::new();
        storage.expect_write().returning(|_| Ok(()));
        storage
            .expect_erase()
            .returning(|| Err(CredentialStorageError::unavailable("locked")));
        let store = store_over(Arc::new(storage), clock);
        store.save(pair("a1", "r1"), identity()).expect("save");

        assert!(store.clear());
        assert!(!store.is_authenticated());
    }
}
