//! Test utilities for the client crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for `cfg(test)` and behind the `test-support` feature.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};
use serde_json::Value;

use crate::domain::ports::{
    ApiRequest, ApiResponse, Endpoint, HttpTransport, HttpTransportError,
    InMemoryCredentialStorage, TaskStatusSource,
};
use crate::domain::{
    CredentialPair, CredentialPolicy, CredentialStore, Error, Identity, TaskId, TaskStatusReport,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test double mutex poisoned"),
    }
}

/// Clock whose time only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `seconds`.
    pub fn advance_seconds(&self, seconds: i64) {
        *lock(&self.0) += TimeDelta::seconds(seconds);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Identity used by the canned sessions.
pub fn test_identity() -> Identity {
    Identity {
        id: 42,
        username: "ada".to_owned(),
        email: Some("ada@example.com".to_owned()),
    }
}

/// In-memory store with no session.
pub fn signed_out_store() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(
        Arc::new(InMemoryCredentialStorage::default()),
        Arc::new(DefaultClock),
        CredentialPolicy::default(),
    ))
}

/// In-memory store holding `access`/`refresh` for [`test_identity`].
pub fn signed_in_store(access: &str, refresh: &str) -> Arc<CredentialStore> {
    let store = signed_out_store();
    let pair = match CredentialPair::try_new(access, refresh) {
        Ok(pair) => pair,
        Err(err) => panic!("invalid test credentials: {err}"),
    };
    if let Err(err) = store.save(pair, test_identity()) {
        panic!("failed to seed test credentials: {err}");
    }
    store
}

/// One request observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// The request as sent.
    pub request: ApiRequest,
    /// Bearer credential attached to it.
    pub bearer: Option<String>,
}

type Responder =
    dyn Fn(&ApiRequest, Option<&str>) -> Result<ApiResponse, HttpTransportError> + Send + Sync;

/// Transport double answering from a queue, then from an optional responder.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Result<ApiResponse, HttpTransportError>>>,
    responder: Option<Box<Responder>>,
    latency: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Empty script; every call fails once the queue runs dry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls not covered by the queue with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest, Option<&str>) -> Result<ApiResponse, HttpTransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Delay every answer by `latency` (use with paused tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: Value) {
        lock(&self.queue).push_back(Ok(ApiResponse::json(status, &body)));
    }

    /// Queue a connection failure.
    pub fn push_connect_error(&self, message: &str) {
        lock(&self.queue).push_back(Err(HttpTransportError::connect(message)));
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests sent to `endpoint`.
    pub fn count_for(&self, endpoint: &Endpoint) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|recorded| &recorded.request.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, HttpTransportError> {
        lock(&self.requests).push(RecordedRequest {
            request: request.clone(),
            bearer: bearer.map(str::to_owned),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let queued = lock(&self.queue).pop_front();
        match (queued, &self.responder) {
            (Some(result), _) => result,
            (None, Some(responder)) => responder(request, bearer),
            (None, None) => Err(HttpTransportError::connect(format!(
                "no scripted response for {}",
                request.endpoint
            ))),
        }
    }
}

/// Status source replaying a script; the last entry repeats forever.
#[derive(Default)]
pub struct ScriptedStatusSource {
    script: Mutex<VecDeque<Result<TaskStatusReport, Error>>>,
    last: Mutex<Option<Result<TaskStatusReport, Error>>>,
    queries: Mutex<Vec<TaskId>>,
}

impl ScriptedStatusSource {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result.
    pub fn push(&self, result: Result<TaskStatusReport, Error>) {
        lock(&self.script).push_back(result);
    }

    /// Queue a report decoded from JSON.
    pub fn push_json(&self, body: Value) {
        match serde_json::from_value(body) {
            Ok(report) => self.push(Ok(report)),
            Err(err) => panic!("invalid scripted status report: {err}"),
        }
    }

    /// Number of status queries issued.
    pub fn query_count(&self) -> usize {
        lock(&self.queries).len()
    }
}

#[async_trait]
impl TaskStatusSource for ScriptedStatusSource {
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, Error> {
        lock(&self.queries).push(task_id.clone());
        let next = lock(&self.script).pop_front();
        let mut last = lock(&self.last);
        match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(Error::service_unavailable("no scripted status"))),
        }
    }
}

/// Scratch directory holding a credentials file path for file-backed stores.
///
/// The directory is removed when the value drops.
pub struct TempCredentials {
    dir: tempfile::TempDir,
}

impl TempCredentials {
    /// Create a fresh scratch directory.
    pub fn new() -> Self {
        match tempfile::tempdir() {
            Ok(dir) => Self { dir },
            Err(err) => panic!("failed to create temp dir: {err}"),
        }
    }

    /// Path of the (not yet existing) credentials file.
    pub fn path(&self) -> std::path::PathBuf {
        self.dir.path().join("vidsum").join("credentials.json")
    }
}

impl Default for TempCredentials {
    fn default() -> Self {
        Self::new()
    }
}
