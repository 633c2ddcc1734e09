//! On-disk representation of the stored session.
//!
//! The file layout is owned by this adapter; the domain record never derives
//! serde traits so token handling stays in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::domain::{CredentialPair, Identity, StoredSession};

pub(super) const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
pub(super) struct StoredSessionDto {
    pub(super) version: u32,
    pub(super) access_token: Zeroizing<String>,
    pub(super) refresh_token: Zeroizing<String>,
    pub(super) identity: Identity,
    pub(super) issued_at: DateTime<Utc>,
    pub(super) access_expires_at: DateTime<Utc>,
    pub(super) refresh_expires_at: DateTime<Utc>,
}

impl From<&StoredSession> for StoredSessionDto {
    fn from(session: &StoredSession) -> Self {
        Self {
            version: FORMAT_VERSION,
            access_token: Zeroizing::new(session.credentials.access_token().to_owned()),
            refresh_token: Zeroizing::new(session.credentials.refresh_token().to_owned()),
            identity: session.identity.clone(),
            issued_at: session.issued_at,
            access_expires_at: session.access_expires_at,
            refresh_expires_at: session.refresh_expires_at,
        }
    }
}

impl StoredSessionDto {
    pub(super) fn into_domain(self) -> Result<StoredSession, String> {
        if self.version != FORMAT_VERSION {
            return Err(format!("unsupported format version {}", self.version));
        }
        let credentials =
            CredentialPair::try_new(self.access_token.as_str(), self.refresh_token.as_str())
                .map_err(|error| error.to_string())?;
        Ok(StoredSession {
            credentials,
            identity: self.identity,
            issued_at: self.issued_at,
            access_expires_at: self.access_expires_at,
            refresh_expires_at: self.refresh_expires_at,
        })
    }
}
