//! Typed operations against the summarisation service.
//!
//! Every call goes through the [`RequestAuthenticator`], so credential expiry
//! is handled identically for catalogue reads, uploads and task polling.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::info;

use crate::domain::ports::{
    ApiRequest, Endpoint, FilePart, HttpMethod, HttpTransport, RequestBody, TaskStatusSource,
};
use crate::domain::token_refresher::IssuedTokens;
use crate::domain::{
    ApiResult, CredentialStore, Error, Identity, LoginCredentials, LogoutReason,
    PasswordResetConfirmation, RequestAuthenticator, SessionEvent, SignupRequest, TaskId,
    TaskStatusReport, UploadReceipt, UploadRequest, VideoDetail, VideoId, VideoList,
    normalize_email,
};

/// Body returned by authenticate and signup.
#[derive(Deserialize)]
struct SessionGrant {
    id: u64,
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(flatten)]
    tokens: IssuedTokens,
}

#[derive(Deserialize)]
struct Detail {
    #[serde(default)]
    detail: Option<String>,
}

const DEFAULT_RESET_MESSAGE: &str = "Password reset email sent.";

/// Authenticated client for the service's REST surface.
///
/// Cloning yields another handle sharing the same authenticator.
#[derive(Clone)]
pub struct ServiceClient {
    auth: Arc<RequestAuthenticator>,
}

impl ServiceClient {
    /// Client sending through `transport` with credentials from `store`.
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<CredentialStore>) -> Self {
        Self {
            auth: Arc::new(RequestAuthenticator::new(transport, store)),
        }
    }

    /// The authenticator every request goes through.
    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.auth
    }

    /// Whether an access credential is stored.
    pub fn is_authenticated(&self) -> bool {
        self.auth.store().is_authenticated()
    }

    /// Identity cached at sign-in.
    pub fn identity(&self) -> Option<Identity> {
        self.auth.store().identity()
    }

    /// Receive session lifecycle events.
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.auth.subscribe()
    }

    /// Sign in and store the issued credentials.
    pub async fn authenticate(&self, credentials: &LoginCredentials) -> ApiResult<Identity> {
        let request = ApiRequest::post_json(
            Endpoint::Authenticate,
            json!({
                "username": credentials.username(),
                "password": credentials.password(),
            }),
        );
        self.start_session(&request).await
    }

    /// Register an account and store the issued credentials.
    pub async fn signup(&self, signup: &SignupRequest) -> ApiResult<Identity> {
        let body = serde_json::to_value(signup)
            .map_err(|err| Error::internal(format!("failed to encode signup: {err}")))?;
        let request = ApiRequest::post_json(Endpoint::Signup, body);
        self.start_session(&request).await
    }

    /// Sign out locally. Returns `false` when nobody was signed in.
    pub fn logout(&self) -> bool {
        self.auth.logout(LogoutReason::UserRequested)
    }

    /// Ask the service to email a reset link; returns its acknowledgement.
    pub async fn request_password_reset(&self, email: &str) -> ApiResult<String> {
        let email = normalize_email(email)?;
        let request = ApiRequest::post_json(Endpoint::PasswordReset, json!({ "email": email }));
        let response = self.auth.execute(&request).await?;
        let detail = response
            .decode::<Option<Detail>>()?
            .and_then(|body| body.detail)
            .unwrap_or_else(|| DEFAULT_RESET_MESSAGE.to_owned());
        Ok(detail)
    }

    /// Set a new password using the parts of a reset link.
    pub async fn confirm_password_reset(
        &self,
        confirmation: &PasswordResetConfirmation,
    ) -> ApiResult<()> {
        let body = serde_json::to_value(confirmation)
            .map_err(|err| Error::internal(format!("failed to encode reset: {err}")))?;
        let request = ApiRequest::post_json(Endpoint::PasswordResetConfirm, body);
        self.auth.execute(&request).await?.ensure_success()
    }

    /// Videos owned by the signed-in user.
    pub async fn list_videos(&self) -> ApiResult<VideoList> {
        self.auth
            .execute(&ApiRequest::get(Endpoint::Videos))
            .await?
            .decode()
    }

    /// Upload a video; the receipt carries the processing task, if queued.
    pub async fn upload_video(&self, upload: &UploadRequest) -> ApiResult<UploadReceipt> {
        let request = ApiRequest {
            method: HttpMethod::Post,
            endpoint: Endpoint::VideoUpload,
            body: RequestBody::Multipart {
                fields: vec![("title".to_owned(), upload.title().to_owned())],
                file: FilePart {
                    field: "file".to_owned(),
                    file_name: upload.file_name().to_owned(),
                    bytes: upload.bytes().to_vec(),
                },
            },
        };
        let receipt: UploadReceipt = self.auth.execute(&request).await?.decode()?;
        info!(
            video_id = %receipt.video.id,
            task_id = ?receipt.task_id,
            "video uploaded"
        );
        Ok(receipt)
    }

    /// Full record including transcript and summary payloads.
    pub async fn video_detail(&self, id: VideoId) -> ApiResult<VideoDetail> {
        self.auth
            .execute(&ApiRequest::get(Endpoint::Video(id)))
            .await?
            .decode()
    }

    /// Delete a video.
    pub async fn delete_video(&self, id: VideoId) -> ApiResult<()> {
        self.auth
            .execute(&ApiRequest::delete(Endpoint::Video(id)))
            .await?
            .ensure_success()
    }

    /// Current status of a background task.
    pub async fn task_status(&self, task_id: &TaskId) -> ApiResult<TaskStatusReport> {
        self.auth
            .execute(&ApiRequest::get(Endpoint::TaskStatus(task_id.clone())))
            .await?
            .decode()
    }

    async fn start_session(&self, request: &ApiRequest) -> ApiResult<Identity> {
        let grant: SessionGrant = self.auth.execute(request).await?.decode()?;
        let credentials = grant.tokens.into_pair()?;
        let identity = Identity {
            id: grant.id,
            username: grant.username,
            email: grant.email,
        };
        self.auth.store().save(credentials, identity.clone())?;
        info!(user_id = identity.id, "signed in");
        self.auth.publish(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl TaskStatusSource for ServiceClient {
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, Error> {
        Self::task_status(self, task_id).await
    }
}

#[cfg(test)]
mod tests;
