//! Self-healing outbound calls.
//!
//! Every request is sent with the current access credential. When the
//! service rejects it (401/403) and a refresh credential is stored, the
//! authenticator refreshes once and replays the request once. Concurrent
//! rejections share one refresh: callers queue on a gate and, once inside,
//! reuse whatever pair the previous holder stored instead of refreshing
//! again.
//!
//! When the refresh or the replay fails, the credentials are cleared and the
//! caller receives the error from its *original* attempt.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::domain::ports::{ApiRequest, ApiResponse, HttpTransport};
use crate::domain::{
    CredentialPair, CredentialStore, Error, LogoutReason, RefreshFailed, SessionEvent,
    TokenRefresher,
};

const SESSION_EVENT_CAPACITY: usize = 16;

/// An in-flight call and whether its single refresh-retry has been spent.
struct PendingRequest<'a> {
    request: &'a ApiRequest,
    retried: bool,
}

impl<'a> PendingRequest<'a> {
    fn new(request: &'a ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// Flip the retry flag; only the first call succeeds.
    fn claim_retry(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }
}

/// Wraps the transport with bearer attachment and refresh-and-retry.
pub struct RequestAuthenticator {
    transport: Arc<dyn HttpTransport>,
    store: Arc<CredentialStore>,
    refresher: TokenRefresher,
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl RequestAuthenticator {
    /// Build an authenticator sharing `store` with the rest of the client.
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            refresher: TokenRefresher::new(transport.clone(), store.clone()),
            transport,
            store,
            refresh_gate: Mutex::new(()),
            events,
        }
    }

    /// The credential store requests are authenticated from.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Receive session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // Sending only fails when nobody is subscribed.
        self.events.send(event).ok();
    }

    /// Send `request`, returning the response only when it succeeded.
    ///
    /// Non-2xx responses become [`Error`]s built from the response body.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let mut pending = PendingRequest::new(request);
        let credentials = self.store.load();
        let response = self.dispatch(&pending, credentials.as_ref()).await?;
        if response.is_success() {
            return Ok(response);
        }

        let original = response.to_error();
        if !self.claim_refresh(&mut pending, &response) {
            return Err(original);
        }
        info!(
            path = %request.endpoint,
            status = response.status,
            "authorization rejected; refreshing credentials"
        );

        let rejected = credentials.as_ref().map(CredentialPair::access_token);
        let renewed = match self.refresh_after_rejection(rejected).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(path = %request.endpoint, error = %err, "credential refresh failed");
                self.logout(LogoutReason::AuthFailure);
                return Err(original);
            }
        };

        match self.dispatch(&pending, Some(&renewed)).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => {
                warn!(
                    path = %request.endpoint,
                    status = response.status,
                    "request failed again after refresh"
                );
                self.logout(LogoutReason::RefreshExhausted);
                Err(original)
            }
            Err(err) => {
                warn!(path = %request.endpoint, error = %err, "retry after refresh failed");
                self.logout(LogoutReason::RefreshExhausted);
                Err(original)
            }
        }
    }

    /// Clear the stored credentials.
    ///
    /// Publishes [`SessionEvent::LoggedOut`] only when something was cleared,
    /// so concurrent failures produce a single notification.
    pub fn logout(&self, reason: LogoutReason) -> bool {
        let cleared = self.store.clear();
        if cleared {
            warn!(%reason, "session ended");
            self.publish(SessionEvent::LoggedOut { reason });
        }
        cleared
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest<'_>,
        credentials: Option<&CredentialPair>,
    ) -> Result<ApiResponse, Error> {
        let bearer = credentials.map(CredentialPair::access_token);
        let attempt: u8 = if pending.retried { 2 } else { 1 };
        debug!(
            path = %pending.request.endpoint,
            attempt,
            bearer = bearer.is_some(),
            "sending request"
        );
        self.transport
            .send(pending.request, bearer)
            .await
            .map_err(Error::from)
    }

    /// Whether `response` earns `pending` its one refresh-and-replay. A
    /// `true` answer spends the retry.
    fn claim_refresh(&self, pending: &mut PendingRequest<'_>, response: &ApiResponse) -> bool {
        response.is_authorization_failure()
            && !pending.request.endpoint.is_refresh()
            && self.store.load().is_some()
            && pending.claim_retry()
    }

    /// Single-flight refresh.
    ///
    /// `rejected` is the access credential the caller's request carried. If
    /// the store holds a different one by the time the gate is acquired,
    /// another caller already refreshed and its pair is reused.
    async fn refresh_after_rejection(
        &self,
        rejected: Option<&str>,
    ) -> Result<CredentialPair, RefreshFailed> {
        let _gate = self.refresh_gate.lock().await;
        let Some(current) = self.store.load() else {
            return Err(RefreshFailed::MissingRefreshToken);
        };
        if rejected != Some(current.access_token()) {
            debug!("reusing credentials refreshed by a concurrent request");
            return Ok(current);
        }
        match self.refresher.refresh(&current).await {
            Ok(pair) => {
                self.publish(SessionEvent::Refreshed);
                Ok(pair)
            }
            Err(err) => {
                // Cleared under the gate so queued callers see the logout.
                self.logout(LogoutReason::AuthFailure);
                Err(err)
            }
        }
    }
}
