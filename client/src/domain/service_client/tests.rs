//! Endpoint wiring and response decoding for the service client.

use rstest::rstest;
use serde_json::json;

use super::*;
use crate::domain::{ErrorCode, SignupFields, TaskStatus};
use crate::test_support::{ScriptedTransport, signed_in_store, signed_out_store};

fn client_with(transport: &Arc<ScriptedTransport>, store: Arc<CredentialStore>) -> ServiceClient {
    ServiceClient::new(transport.clone(), store)
}

#[rstest]
#[tokio::test]
async fn authenticate_stores_credentials_and_identity() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(
        200,
        json!({"id": 5, "username": "grace", "id_token": "a1", "refresh_token": "r1"}),
    );
    let store = signed_out_store();
    let client = client_with(&transport, store.clone());
    let mut events = client.subscribe_session();

    let credentials = LoginCredentials::try_from_parts("grace", "pw").expect("valid");
    let identity = client.authenticate(&credentials).await.expect("sign in");

    assert_eq!(identity.username, "grace");
    assert!(client.is_authenticated());
    assert_eq!(store.load().expect("stored").access_token(), "a1");
    assert_eq!(client.identity(), Some(identity.clone()));
    assert_eq!(events.try_recv().ok(), Some(SessionEvent::SignedIn(identity)));

    let sent = transport.requests();
    assert_eq!(sent[0].request.endpoint, Endpoint::Authenticate);
    assert_eq!(
        sent[0].request.body,
        RequestBody::Json(json!({"username": "grace", "password": "pw"}))
    );
}

#[rstest]
#[tokio::test]
async fn rejected_login_reports_service_message() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(400, json!({"non_field_errors": ["Invalid username or password"]}));
    let client = client_with(&transport, signed_out_store());

    let credentials = LoginCredentials::try_from_parts("grace", "nope").expect("valid");
    let err = client
        .authenticate(&credentials)
        .await
        .expect_err("login fails");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.message(), "Invalid username or password");
    assert!(!client.is_authenticated());
}

#[rstest]
#[tokio::test]
async fn signup_keeps_email_from_response() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(
        201,
        json!({
            "id": 8,
            "username": "grace",
            "email": "grace@example.com",
            "first_name": "Grace",
            "last_name": "Hopper",
            "id_token": "a1",
            "refresh_token": "r1"
        }),
    );
    let client = client_with(&transport, signed_out_store());
    let signup = SignupRequest::try_from_fields(SignupFields {
        username: "grace",
        email: "grace@example.com",
        first_name: "Grace",
        last_name: "Hopper",
        password: "pw",
    })
    .expect("valid signup");

    let identity = client.signup(&signup).await.expect("signup");
    assert_eq!(identity.email.as_deref(), Some("grace@example.com"));
    assert_eq!(transport.count_for(&Endpoint::Signup), 1);
}

#[rstest]
#[tokio::test]
async fn logout_publishes_user_requested_once() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(&transport, signed_in_store("a1", "r1"));
    let mut events = client.subscribe_session();

    assert!(client.logout());
    assert!(!client.logout());

    assert!(!client.is_authenticated());
    assert_eq!(
        events.try_recv().ok(),
        Some(SessionEvent::LoggedOut {
            reason: LogoutReason::UserRequested
        })
    );
    assert!(events.try_recv().is_err());
    assert!(transport.requests().is_empty(), "logout is local");
}

#[rstest]
#[tokio::test]
async fn list_videos_decodes_catalogue() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(
        200,
        json!({"videos": [{"id": 1, "title": "Talk", "processed": true, "duration": 60.0}], "count": 1}),
    );
    let client = client_with(&transport, signed_in_store("a1", "r1"));

    let list = client.list_videos().await.expect("list");
    assert_eq!(list.count, 1);
    assert_eq!(list.videos[0].title, "Talk");
    assert_eq!(transport.requests()[0].bearer.as_deref(), Some("a1"));
}

#[rstest]
#[tokio::test]
async fn upload_sends_multipart_and_yields_task() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(
        201,
        json!({
            "id": 4,
            "title": "Keynote",
            "processed": false,
            "task_id": "abc123",
            "status": "PENDING",
            "message": "Video uploaded successfully. Processing started in background."
        }),
    );
    let client = client_with(&transport, signed_in_store("a1", "r1"));
    let upload = UploadRequest::try_new(" Keynote ", "keynote.mp4", vec![1, 2, 3]).expect("valid");

    let receipt = client.upload_video(&upload).await.expect("upload");

    let task = receipt.task_descriptor().expect("task queued");
    assert_eq!(task.subject_id, VideoId::new(4));
    assert_eq!(task.status, TaskStatus::Pending);
    match &transport.requests()[0].request.body {
        RequestBody::Multipart { fields, file } => {
            assert_eq!(fields, &vec![("title".to_owned(), "Keynote".to_owned())]);
            assert_eq!(file.field, "file");
            assert_eq!(file.file_name, "keynote.mp4");
            assert_eq!(file.bytes, vec![1, 2, 3]);
        }
        other => panic!("expected multipart body, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn detail_delete_and_status_hit_their_paths() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(200, json!({"id": 4, "title": "Keynote", "transcript": [], "summary": []}));
    transport.push_json(204, json!(null));
    transport.push_json(
        200,
        json!({"task_id": "abc123", "status": "STARTED", "ready": false}),
    );
    let client = client_with(&transport, signed_in_store("a1", "r1"));
    let task_id = TaskId::new("abc123").expect("valid id");

    client.video_detail(VideoId::new(4)).await.expect("detail");
    client.delete_video(VideoId::new(4)).await.expect("delete");
    let report = client.task_status(&task_id).await.expect("status");

    assert_eq!(report.status, TaskStatus::Started);
    let paths: Vec<String> = transport
        .requests()
        .iter()
        .map(|recorded| recorded.request.endpoint.path())
        .collect();
    assert_eq!(paths, vec!["video/4/", "video/4/", "task/abc123/status/"]);
    assert_eq!(transport.requests()[1].request.method, HttpMethod::Delete);
}

#[rstest]
#[tokio::test]
async fn missing_video_is_not_found() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(404, json!({"error": "Video not found"}));
    let client = client_with(&transport, signed_in_store("a1", "r1"));

    let err = client
        .video_detail(VideoId::new(99))
        .await
        .expect_err("missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "Video not found");
}

#[rstest]
#[tokio::test]
async fn password_reset_returns_detail_or_default() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(200, json!({"detail": "Check your inbox."}));
    transport.push_json(200, json!({}));
    let client = client_with(&transport, signed_out_store());

    assert_eq!(
        client
            .request_password_reset(" grace@example.com ")
            .await
            .expect("reset"),
        "Check your inbox."
    );
    assert_eq!(
        client
            .request_password_reset("grace@example.com")
            .await
            .expect("reset"),
        DEFAULT_RESET_MESSAGE
    );
    assert_eq!(
        transport.requests()[0].request.body,
        RequestBody::Json(json!({"email": "grace@example.com"}))
    );
}

#[rstest]
#[tokio::test]
async fn invalid_reset_email_never_reaches_the_network() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(&transport, signed_out_store());

    let err = client
        .request_password_reset("not-an-email")
        .await
        .expect_err("invalid email");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(transport.requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn confirm_reset_posts_link_parts() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(200, json!(null));
    let client = client_with(&transport, signed_out_store());
    let confirmation =
        PasswordResetConfirmation::try_from_parts("MQ", "tok", "new-pw").expect("valid");

    client
        .confirm_password_reset(&confirmation)
        .await
        .expect("confirm");
    assert_eq!(
        transport.requests()[0].request.body,
        RequestBody::Json(json!({"uid": "MQ", "token": "tok", "new_password": "new-pw"}))
    );
}

#[rstest]
#[tokio::test]
async fn status_source_impl_delegates_to_client() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(200, json!({"task_id": "t1", "status": "SUCCESS", "ready": true}));
    let client = client_with(&transport, signed_in_store("a1", "r1"));
    let source: Arc<dyn TaskStatusSource> = Arc::new(client);

    let report = source
        .task_status(&TaskId::new("t1").expect("valid id"))
        .await
        .expect("status");
    assert!(report.is_success());
}
