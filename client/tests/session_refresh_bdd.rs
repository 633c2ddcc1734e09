//! Behaviour tests for refresh-and-retry on rejected credentials.
//!
//! These scenarios drive the service client against a scripted transport and
//! check how many refresh calls were issued and what the caller observed.

use std::cell::RefCell;
use std::sync::Arc;

use client::domain::ports::Endpoint;
use client::domain::{
    ApiResult, CredentialStore, LogoutReason, ServiceClient, SessionEvent, VideoList,
};
use client::test_support::{ScriptedTransport, signed_in_store};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

const REJECTION: &str = "Token is invalid or expired";

struct SessionWorld {
    runtime: Runtime,
    transport: Arc<ScriptedTransport>,
    store: RefCell<Option<Arc<CredentialStore>>>,
    client: RefCell<Option<ServiceClient>>,
    events: RefCell<Option<broadcast::Receiver<SessionEvent>>>,
    outcome: RefCell<Option<ApiResult<VideoList>>>,
}

impl SessionWorld {
    fn new() -> Self {
        Self {
            runtime: Runtime::new().expect("create runtime"),
            transport: Arc::new(ScriptedTransport::new()),
            store: RefCell::new(None),
            client: RefCell::new(None),
            events: RefCell::new(None),
            outcome: RefCell::new(None),
        }
    }

    fn client(&self) -> ServiceClient {
        self.client
            .borrow()
            .clone()
            .expect("a session should be set up first")
    }

    fn store(&self) -> Arc<CredentialStore> {
        self.store
            .borrow()
            .clone()
            .expect("a session should be set up first")
    }

    fn with_outcome<F>(&self, f: F)
    where
        F: FnOnce(&ApiResult<VideoList>),
    {
        let outcome = self.outcome.borrow();
        f(outcome.as_ref().expect("the request should have been made"));
    }
}

#[fixture]
fn world() -> SessionWorld {
    SessionWorld::new()
}

#[given("a signed-in session holding access token {token}")]
fn a_signed_in_session(world: &SessionWorld, token: String) {
    let store = signed_in_store(&token, "r1");
    let client = ServiceClient::new(world.transport.clone(), store.clone());
    *world.events.borrow_mut() = Some(client.subscribe_session());
    *world.store.borrow_mut() = Some(store);
    *world.client.borrow_mut() = Some(client);
}

#[given("the service rejects the next call as unauthorised")]
fn the_service_rejects_the_next_call(world: &SessionWorld) {
    world.transport.push_json(401, json!({ "detail": REJECTION }));
}

#[given("the service issues access token {token} on refresh")]
fn the_service_issues_a_token(world: &SessionWorld, token: String) {
    world
        .transport
        .push_json(200, json!({ "id_token": token, "refresh_token": "r2" }));
}

#[given("the service rejects the refresh call")]
fn the_service_rejects_the_refresh(world: &SessionWorld) {
    world
        .transport
        .push_json(401, json!({ "detail": "Refresh token expired" }));
}

#[given("the service then lists {count} video")]
fn the_service_lists_videos(world: &SessionWorld, count: usize) {
    let videos: Vec<_> = (1..=count)
        .map(|id| json!({ "id": id, "title": format!("video {id}") }))
        .collect();
    world
        .transport
        .push_json(200, json!({ "videos": videos, "count": count }));
}

#[given("the user has logged out")]
fn the_user_has_logged_out(world: &SessionWorld) {
    assert!(world.client().logout(), "a session should have been cleared");
}

#[when("the video list is requested")]
fn the_video_list_is_requested(world: &SessionWorld) {
    let client = world.client();
    let outcome = world.runtime.block_on(client.list_videos());
    *world.outcome.borrow_mut() = Some(outcome);
}

#[then("the request succeeds with {count} video")]
fn the_request_succeeds(world: &SessionWorld, count: usize) {
    world.with_outcome(|outcome| {
        let list = outcome.as_ref().expect("request should succeed");
        assert_eq!(list.videos.len(), count);
    });
}

#[then("the request fails with status {status}")]
fn the_request_fails(world: &SessionWorld, status: u16) {
    world.with_outcome(|outcome| {
        let error = outcome.as_ref().expect_err("request should fail");
        assert_eq!(error.status(), Some(status));
    });
}

#[then("the failure is the service's original message")]
fn the_failure_is_original(world: &SessionWorld) {
    world.with_outcome(|outcome| {
        let error = outcome.as_ref().expect_err("request should fail");
        assert_eq!(error.message(), REJECTION);
    });
}

#[then("exactly {count} refresh call was made")]
fn refresh_calls_were_made(world: &SessionWorld, count: usize) {
    assert_eq!(world.transport.count_for(&Endpoint::Refresh), count);
}

#[then("no refresh call was made")]
fn no_refresh_call_was_made(world: &SessionWorld) {
    assert_eq!(world.transport.count_for(&Endpoint::Refresh), 0);
}

#[then("the stored access token is {token}")]
fn the_stored_access_token_is(world: &SessionWorld, token: String) {
    let stored = world.store().load().expect("credentials should be stored");
    assert_eq!(stored.access_token(), token);
}

#[then("the session is cleared")]
fn the_session_is_cleared(world: &SessionWorld) {
    let store = world.store();
    assert!(store.load().is_none());
    assert!(store.identity().is_none());
    assert!(!world.client().is_authenticated());
}

#[then("a logout for an authentication failure was published")]
fn a_logout_was_published(world: &SessionWorld) {
    let mut events = world.events.borrow_mut();
    let events = events.as_mut().expect("session events should be subscribed");
    let mut saw_logout = false;
    while let Ok(event) = events.try_recv() {
        if event
            == (SessionEvent::LoggedOut {
                reason: LogoutReason::AuthFailure,
            })
        {
            saw_logout = true;
        }
    }
    assert!(saw_logout, "expected a LoggedOut(AuthFailure) event");
}

#[scenario(
    path = "tests/features/session_refresh.feature",
    name = "Expired access credential is refreshed once and the call retried"
)]
fn expired_access_credential_is_refreshed_once(world: SessionWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/session_refresh.feature",
    name = "Rejected refresh clears the session and surfaces the original failure"
)]
fn rejected_refresh_clears_the_session(world: SessionWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/session_refresh.feature",
    name = "A replay that is still unauthorised does not refresh again"
)]
fn unauthorised_replay_does_not_refresh_again(world: SessionWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/session_refresh.feature",
    name = "Logging out stops automatic refresh"
)]
fn logging_out_stops_automatic_refresh(world: SessionWorld) {
    drop(world);
}
