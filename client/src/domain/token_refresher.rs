//! Exchanges a refresh credential for a new token pair.
//!
//! One network round trip per call and no internal retries; retry policy
//! belongs to the [`RequestAuthenticator`](crate::domain::RequestAuthenticator).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::ports::{ApiRequest, Endpoint, HttpTransport};
use crate::domain::{CredentialPair, CredentialStore, Error};

/// Why a refresh attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefreshFailed {
    /// No refresh credential is stored.
    #[error("no refresh credential available")]
    MissingRefreshToken,
    /// The service rejected the refresh credential.
    #[error("refresh rejected: {0}")]
    Rejected(Error),
    /// The exchange did not complete or returned an unusable body.
    #[error("refresh unavailable: {0}")]
    Unavailable(Error),
    /// The new pair could not be persisted.
    #[error("refreshed credentials could not be stored: {0}")]
    Storage(Error),
}

impl RefreshFailed {
    /// Underlying domain error, when there is one.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::MissingRefreshToken => None,
            Self::Rejected(err) | Self::Unavailable(err) | Self::Storage(err) => Some(err),
        }
    }
}

/// Token pair as issued by the authenticate, signup and refresh endpoints.
///
/// Authenticate and signup call the access credential `id_token`; refresh
/// calls it `access_token`.
#[derive(Deserialize)]
pub(crate) struct IssuedTokens {
    #[serde(alias = "id_token")]
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
}

impl IssuedTokens {
    pub(crate) fn into_pair(self) -> Result<CredentialPair, Error> {
        CredentialPair::try_new(self.access_token, self.refresh_token)
            .map_err(|err| Error::internal(format!("service issued unusable credentials: {err}")))
    }
}

/// Calls `refresh/` and persists the result.
pub struct TokenRefresher {
    transport: Arc<dyn HttpTransport>,
    store: Arc<CredentialStore>,
}

impl TokenRefresher {
    /// Create a refresher writing through `store`.
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<CredentialStore>) -> Self {
        Self { transport, store }
    }

    /// Exchange `current`'s refresh credential for a new pair.
    ///
    /// The new pair is stored before it is returned. The refresh request is
    /// sent without a bearer credential.
    pub async fn refresh(&self, current: &CredentialPair) -> Result<CredentialPair, RefreshFailed> {
        let request = ApiRequest::post_json(
            Endpoint::Refresh,
            json!({ "refresh_token": current.refresh_token() }),
        );
        info!("refreshing credentials");
        let response = self
            .transport
            .send(&request, None)
            .await
            .map_err(|err| RefreshFailed::Unavailable(err.into()))?;

        if !response.is_success() {
            let err = response.to_error();
            warn!(status = response.status, error = %err, "refresh rejected");
            return Err(if response.is_authorization_failure() {
                RefreshFailed::Rejected(err)
            } else {
                RefreshFailed::Unavailable(err)
            });
        }

        let pair = response
            .decode::<IssuedTokens>()
            .and_then(IssuedTokens::into_pair)
            .map_err(RefreshFailed::Unavailable)?;
        self.store
            .replace_credentials(pair.clone())
            .map_err(RefreshFailed::Storage)?;
        info!("credentials refreshed");
        Ok(pair)
    }
}
