//! Credential pair, cached identity, and the storage expiry policy.
//!
//! ## Invariants
//! - Access and refresh tokens are written together: a [`CredentialPair`] can
//!   only be built with both values present.
//! - Token strings live in [`Zeroizing`] buffers and never appear in `Debug`
//!   output.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Validation errors raised while building a [`CredentialPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialValidationError {
    /// The access token was blank.
    EmptyAccessToken,
    /// The refresh token was blank.
    EmptyRefreshToken,
}

impl fmt::Display for CredentialValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAccessToken => write!(f, "access token must not be empty"),
            Self::EmptyRefreshToken => write!(f, "refresh token must not be empty"),
        }
    }
}

impl std::error::Error for CredentialValidationError {}

/// Access/refresh token pair issued by the service.
///
/// # Examples
/// ```
/// use client::domain::CredentialPair;
///
/// let pair = CredentialPair::try_new("tok-a", "tok-r").unwrap();
/// assert_eq!(pair.access_token(), "tok-a");
/// assert!(!format!("{pair:?}").contains("tok-r"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    access: Zeroizing<String>,
    refresh: Zeroizing<String>,
}

impl CredentialPair {
    /// Build a pair, rejecting blank tokens.
    pub fn try_new(
        access: impl Into<String>,
        refresh: impl Into<String>,
    ) -> Result<Self, CredentialValidationError> {
        let access = Zeroizing::new(access.into());
        let refresh = Zeroizing::new(refresh.into());
        if access.trim().is_empty() {
            return Err(CredentialValidationError::EmptyAccessToken);
        }
        if refresh.trim().is_empty() {
            return Err(CredentialValidationError::EmptyRefreshToken);
        }
        Ok(Self { access, refresh })
    }

    /// Bearer value attached to outbound calls.
    pub fn access_token(&self) -> &str {
        self.access.as_str()
    }

    /// Value exchanged for a fresh pair.
    pub fn refresh_token(&self) -> &str {
        self.refresh.as_str()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Minimal user projection cached alongside the credentials for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Service-side user identifier.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Contact email, when the service returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Everything the credential store persists for one signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Current token pair.
    pub credentials: CredentialPair,
    /// Cached identity for display purposes.
    pub identity: Identity,
    /// When the current pair was written.
    pub issued_at: DateTime<Utc>,
    /// When the access credential is expected to lapse.
    pub access_expires_at: DateTime<Utc>,
    /// When the refresh credential lapses; the session is unusable afterwards.
    pub refresh_expires_at: DateTime<Utc>,
}

impl StoredSession {
    /// Whether the refresh credential has lapsed at `now`.
    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    /// Whether the access credential has lapsed at `now`.
    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expires_at
    }
}

/// Lifetime policy applied whenever credentials are written.
///
/// Defaults mirror the service's cookie policy: a one-day access credential
/// and a thirty-day refresh credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    /// Lifetime stamped onto the access credential.
    pub access_ttl: TimeDelta,
    /// Lifetime stamped onto the refresh credential.
    pub refresh_ttl: TimeDelta,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            access_ttl: TimeDelta::days(1),
            refresh_ttl: TimeDelta::days(30),
        }
    }
}

impl CredentialPolicy {
    /// Stamp a freshly issued pair with expiry times relative to `now`.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeDelta, TimeZone, Utc};
    /// use client::domain::{CredentialPair, CredentialPolicy, Identity};
    ///
    /// let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap();
    /// let pair = CredentialPair::try_new("a", "r").unwrap();
    /// let identity = Identity { id: 7, username: "ada".into(), email: None };
    /// let session = CredentialPolicy::default().stamp(pair, identity, now);
    /// assert_eq!(session.refresh_expires_at - now, TimeDelta::days(30));
    /// ```
    pub fn stamp(
        &self,
        credentials: CredentialPair,
        identity: Identity,
        now: DateTime<Utc>,
    ) -> StoredSession {
        StoredSession {
            credentials,
            identity,
            issued_at: now,
            access_expires_at: now + self.access_ttl,
            refresh_expires_at: now + self.refresh_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("", "r", CredentialValidationError::EmptyAccessToken)]
    #[case("a", "  ", CredentialValidationError::EmptyRefreshToken)]
    fn blank_tokens_are_rejected(
        #[case] access: &str,
        #[case] refresh: &str,
        #[case] expected: CredentialValidationError,
    ) {
        let err = CredentialPair::try_new(access, refresh).expect_err("blank token");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn debug_output_never_contains_tokens() {
        let pair = CredentialPair::try_new("secret-access", "secret-refresh").expect("valid");
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[rstest]
    fn stamped_session_expires_on_policy_boundaries() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid time");
        let policy = CredentialPolicy {
            access_ttl: TimeDelta::hours(1),
            refresh_ttl: TimeDelta::days(2),
        };
        let session = policy.stamp(
            CredentialPair::try_new("a", "r").expect("valid"),
            Identity {
                id: 1,
                username: "ada".to_owned(),
                email: None,
            },
            now,
        );

        assert!(!session.is_access_expired(now + TimeDelta::minutes(59)));
        assert!(session.is_access_expired(now + TimeDelta::hours(1)));
        assert!(!session.is_refresh_expired(now + TimeDelta::days(1)));
        assert!(session.is_refresh_expired(now + TimeDelta::days(2)));
    }
}
